//! site::content
//!
//! Turns a node's primary content into renderable blocks.
//!
//! # Fallback Chain
//!
//! 1. `README.md`, parsed with pulldown-cmark into heading, text and media blocks
//! 2. The node's `dreamTalk` file as a single media block
//! 3. The title as a single text block
//!
//! Every local media reference is inlined as a base64 `data:` URI so the
//! deployed page is self-contained. Missing media files stay plain links.

use std::fs;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use pulldown_cmark::{html, CowStr, Event, HeadingLevel, Parser, Tag, TagEnd};
use serde::Serialize;
use tracing::{debug, warn};

use super::SiteError;
use crate::core::node::Node;

/// Primary document of a node.
pub const README_FILE: &str = "README.md";

/// One renderable unit of node content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ContentBlock {
    Heading { level: u8, text: String },
    /// Rendered HTML fragment.
    Text { html: String },
    Media { name: String, mime: String, src: String },
}

/// Source of a node's content blocks.
pub trait ContentResolver: Send + Sync {
    fn resolve(&self, node: &Node) -> Result<Vec<ContentBlock>, SiteError>;
}

/// Reads content from the node's working directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileContentResolver;

impl ContentResolver for FileContentResolver {
    fn resolve(&self, node: &Node) -> Result<Vec<ContentBlock>, SiteError> {
        let dir = &node.local_path;

        let readme = dir.join(README_FILE);
        if readme.is_file() {
            let text = fs::read_to_string(&readme).map_err(|e| SiteError::Io {
                path: readme.clone(),
                source: e,
            })?;
            let blocks = parse_markdown(&text, dir);
            if !blocks.is_empty() {
                debug!(node = %node.id(), blocks = blocks.len(), "content from readme");
                return Ok(blocks);
            }
        }

        if let Some(talk) = node.metadata.dream_talk.as_deref().filter(|t| !t.is_empty()) {
            if let Some(block) = media_block(dir, talk) {
                debug!(node = %node.id(), media = talk, "content from dreamTalk");
                return Ok(vec![block]);
            }
            warn!(node = %node.id(), media = talk, "dreamTalk media missing");
        }

        Ok(vec![ContentBlock::Text {
            html: format!("<p>{}</p>", tera::escape_html(node.title())),
        }])
    }
}

/// Parse markdown into blocks, inlining local images relative to `base`.
///
/// A paragraph holding nothing but one image becomes a media block; images
/// inside running text are inlined in place.
pub fn parse_markdown(text: &str, base: &Path) -> Vec<ContentBlock> {
    let mut blocks = Vec::new();
    let mut pending: Vec<Event> = Vec::new();
    let mut events = Parser::new(text);

    while let Some(event) = events.next() {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                flush_text(&mut pending, &mut blocks);
                let mut heading = String::new();
                for inner in events.by_ref() {
                    match inner {
                        Event::End(TagEnd::Heading(_)) => break,
                        Event::Text(t) | Event::Code(t) => heading.push_str(&t),
                        _ => {}
                    }
                }
                blocks.push(ContentBlock::Heading {
                    level: heading_level(level),
                    text: heading,
                });
            }
            Event::Start(Tag::Paragraph) => {
                let mut paragraph = vec![Event::Start(Tag::Paragraph)];
                for inner in events.by_ref() {
                    let end = matches!(inner, Event::End(TagEnd::Paragraph));
                    paragraph.push(inner);
                    if end {
                        break;
                    }
                }

                if let Some(block) = lone_image(&paragraph, base) {
                    flush_text(&mut pending, &mut blocks);
                    blocks.push(block);
                } else {
                    pending.extend(paragraph.into_iter().map(|e| inline_image(e, base)));
                }
            }
            other => pending.push(inline_image(other, base)),
        }
    }
    flush_text(&mut pending, &mut blocks);

    blocks
}

fn flush_text(pending: &mut Vec<Event>, blocks: &mut Vec<ContentBlock>) {
    if pending.is_empty() {
        return;
    }
    let mut out = String::new();
    html::push_html(&mut out, pending.drain(..));
    if !out.trim().is_empty() {
        blocks.push(ContentBlock::Text { html: out });
    }
}

fn heading_level(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

/// `[Start(P), Start(Image), ..alt.., End(Image), End(P)]`
fn lone_image(paragraph: &[Event], base: &Path) -> Option<ContentBlock> {
    let (first, last) = (paragraph.get(1)?, paragraph.get(paragraph.len().checked_sub(2)?)?);
    let Event::Start(Tag::Image { dest_url, .. }) = first else {
        return None;
    };
    if !matches!(last, Event::End(TagEnd::Image)) {
        return None;
    }
    let inner = &paragraph[2..paragraph.len() - 2];
    if inner
        .iter()
        .any(|e| !matches!(e, Event::Text(_) | Event::SoftBreak))
    {
        return None;
    }
    media_block(base, dest_url)
}

fn inline_image<'a>(event: Event<'a>, base: &Path) -> Event<'a> {
    match event {
        Event::Start(Tag::Image {
            link_type,
            dest_url,
            title,
            id,
        }) => {
            let dest_url = match data_uri(base, &dest_url) {
                Some(uri) => CowStr::from(uri),
                None => dest_url,
            };
            Event::Start(Tag::Image {
                link_type,
                dest_url,
                title,
                id,
            })
        }
        other => other,
    }
}

/// A media block for a local file, `None` when it cannot be read.
fn media_block(base: &Path, reference: &str) -> Option<ContentBlock> {
    let src = data_uri(base, reference)?;
    let name = Path::new(reference)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| reference.to_string());
    Some(ContentBlock::Media {
        mime: mime_for(reference).to_string(),
        name,
        src,
    })
}

/// Inline a local file as a `data:` URI.
///
/// Remote and already-inlined references return `None` untouched, as do
/// files that resolve outside the node directory.
fn data_uri(base: &Path, reference: &str) -> Option<String> {
    if reference.contains("://") || reference.starts_with("data:") {
        return None;
    }
    let joined = base.join(reference.trim_start_matches("./"));
    let path = match fs::canonicalize(&joined) {
        Ok(path) => path,
        Err(_) => {
            warn!(path = %joined.display(), "media not found, keeping link");
            return None;
        }
    };
    let inside = fs::canonicalize(base)
        .map(|root| path.starts_with(root))
        .unwrap_or(false);
    if !inside {
        warn!(path = %path.display(), "media outside node directory, keeping link");
        return None;
    }
    match fs::read(&path) {
        Ok(bytes) => Some(format!(
            "data:{};base64,{}",
            mime_for(reference),
            STANDARD.encode(bytes)
        )),
        Err(_) => {
            warn!(path = %path.display(), "media not readable, keeping link");
            None
        }
    }
}

/// MIME type by file extension.
pub fn mime_for(reference: &str) -> &'static str {
    let ext = Path::new(reference)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("mov") => "video/quicktime",
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("ogg") => "audio/ogg",
        Some("pdf") => "application/pdf",
        Some("md") | Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metadata::NodeMetadata;
    use tempfile::TempDir;

    fn node_at(dir: &Path, title: &str) -> Node {
        Node {
            metadata: NodeMetadata::new(title),
            local_path: dir.to_path_buf(),
            dependencies: vec![],
        }
    }

    #[test]
    fn readme_headings_and_text() {
        let temp = TempDir::new().unwrap();
        let blocks = parse_markdown("# Title\n\nSome *text*.\n\n## Part\n\nMore.", temp.path());

        assert_eq!(
            blocks[0],
            ContentBlock::Heading {
                level: 1,
                text: "Title".into()
            }
        );
        assert!(matches!(&blocks[1], ContentBlock::Text { html } if html.contains("<em>text</em>")));
        assert!(matches!(&blocks[2], ContentBlock::Heading { level: 2, .. }));
        assert_eq!(blocks.len(), 4);
    }

    #[test]
    fn lone_image_becomes_inline_media() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("pic.png"), [0x89, b'P', b'N', b'G']).unwrap();

        let blocks = parse_markdown("![a picture](pic.png)", temp.path());
        match &blocks[..] {
            [ContentBlock::Media { name, mime, src }] => {
                assert_eq!(name, "pic.png");
                assert_eq!(mime, "image/png");
                assert!(src.starts_with("data:image/png;base64,"));
            }
            other => panic!("unexpected blocks: {:?}", other),
        }
    }

    #[test]
    fn missing_image_stays_link() {
        let temp = TempDir::new().unwrap();
        let blocks = parse_markdown("See ![gone](gone.png) here", temp.path());
        assert!(matches!(&blocks[0], ContentBlock::Text { html } if html.contains("src=\"gone.png\"")));
    }

    #[test]
    fn parent_reference_stays_link() {
        let temp = TempDir::new().unwrap();
        let node = temp.path().join("node");
        fs::create_dir(&node).unwrap();
        fs::write(temp.path().join("secret.png"), b"private bytes").unwrap();

        let blocks = parse_markdown("![x](../secret.png)", &node);
        let encoded = STANDARD.encode(b"private bytes");
        match &blocks[..] {
            [ContentBlock::Text { html }] => {
                assert!(html.contains("src=\"../secret.png\""));
                assert!(!html.contains(&encoded));
            }
            other => panic!("unexpected blocks: {:?}", other),
        }
    }

    #[test]
    fn absolute_reference_stays_link() {
        let temp = TempDir::new().unwrap();
        let node = temp.path().join("node");
        fs::create_dir(&node).unwrap();
        let secret = temp.path().join("secret.png");
        fs::write(&secret, b"private bytes").unwrap();
        let reference = secret.to_string_lossy().into_owned();

        let blocks = parse_markdown(&format!("See ![x]({}) here", reference), &node);
        let encoded = STANDARD.encode(b"private bytes");
        assert!(blocks.iter().all(|block| match block {
            ContentBlock::Text { html } => !html.contains(&encoded),
            ContentBlock::Media { .. } => false,
            ContentBlock::Heading { .. } => true,
        }));
    }

    #[test]
    fn dream_talk_outside_node_is_ignored() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("node");
        fs::create_dir(&dir).unwrap();
        fs::write(temp.path().join("talk.mp4"), b"video").unwrap();
        let mut node = node_at(&dir, "Idea");
        node.metadata.dream_talk = Some("../talk.mp4".into());

        let blocks = FileContentResolver.resolve(&node).unwrap();
        assert!(matches!(&blocks[..], [ContentBlock::Text { html }] if html == "<p>Idea</p>"));
    }

    #[test]
    fn fallback_to_dream_talk() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("talk.mp4"), b"video").unwrap();
        let mut node = node_at(temp.path(), "Idea");
        node.metadata.dream_talk = Some("talk.mp4".into());

        let blocks = FileContentResolver.resolve(&node).unwrap();
        assert!(matches!(&blocks[..], [ContentBlock::Media { mime, .. }] if mime == "video/mp4"));
    }

    #[test]
    fn fallback_to_title() {
        let temp = TempDir::new().unwrap();
        let node = node_at(temp.path(), "Fish & Chips");

        let blocks = FileContentResolver.resolve(&node).unwrap();
        assert_eq!(
            blocks,
            vec![ContentBlock::Text {
                html: "<p>Fish &amp; Chips</p>".into()
            }]
        );
    }

    #[test]
    fn mime_table() {
        assert_eq!(mime_for("a.JPG"), "image/jpeg");
        assert_eq!(mime_for("noext"), "application/octet-stream");
    }
}
