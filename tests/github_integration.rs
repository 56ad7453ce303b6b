//! Integration tests for the GitHub forge.
//!
//! Requests go to a local wiremock server standing in for the REST API, so
//! status-code mapping and request shapes are checked without network access.

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use interbrain_publish::forge::github::GitHubForge;
use interbrain_publish::forge::{create_forge, CreateRepoRequest, Forge, ForgeError};

async fn server_with_user(login: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "login": login })))
        .mount(&server)
        .await;
    server
}

fn forge(server: &MockServer) -> GitHubForge {
    GitHubForge::new(Some("test-token".into()), server.uri())
}

fn request(name: &str) -> CreateRepoRequest {
    CreateRepoRequest {
        name: name.into(),
        description: Some("An idea".into()),
        private: false,
    }
}

// =============================================================================
// Authentication
// =============================================================================

mod auth {
    use super::*;

    #[tokio::test]
    async fn login_is_fetched_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "login": "octo" })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/idea"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "message": "Not Found" })))
            .mount(&server)
            .await;

        let forge = forge(&server);
        assert_eq!(forge.check_available().await.unwrap(), "octo");
        assert_eq!(forge.check_available().await.unwrap(), "octo");
        assert!(!forge.repo_exists("idea").await.unwrap());
    }

    #[tokio::test]
    async fn missing_token_is_auth_required() {
        let forge = GitHubForge::new(None, "http://127.0.0.1:9");
        let err = forge.check_available().await.unwrap_err();
        assert!(matches!(err, ForgeError::AuthRequired));
        assert!(err.is_unavailable());
    }

    #[tokio::test]
    async fn bad_token_is_auth_failed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({ "message": "Bad credentials" })),
            )
            .mount(&server)
            .await;

        let err = forge(&server).check_available().await.unwrap_err();
        assert!(matches!(err, ForgeError::AuthFailed(_)));
        assert!(err.is_unavailable());
    }

    #[tokio::test]
    async fn unreachable_host_is_network_error() {
        let forge = GitHubForge::new(Some("t".into()), "http://127.0.0.1:9");
        let err = forge.check_available().await.unwrap_err();
        assert!(matches!(err, ForgeError::NetworkError(_)));
    }
}

// =============================================================================
// Repositories
// =============================================================================

mod repositories {
    use super::*;

    #[tokio::test]
    async fn repo_exists_on_success() {
        let server = server_with_user("octo").await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/idea"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": "idea" })))
            .mount(&server)
            .await;

        assert!(forge(&server).repo_exists("idea").await.unwrap());
    }

    #[tokio::test]
    async fn create_repo_maps_response() {
        let server = server_with_user("octo").await;
        Mock::given(method("POST"))
            .and(path("/user/repos"))
            .and(body_partial_json(json!({ "name": "idea", "private": false })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "name": "idea",
                "html_url": "https://github.com/octo/idea",
                "clone_url": "https://github.com/octo/idea.git",
                "owner": { "login": "octo" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let repo = forge(&server).create_repo(request("idea")).await.unwrap();

        assert_eq!(repo.owner, "octo");
        assert_eq!(repo.name, "idea");
        assert_eq!(repo.url, "https://github.com/octo/idea");
        assert_eq!(repo.push_url, "https://github.com/octo/idea.git");
    }

    #[tokio::test]
    async fn create_repo_conflict_is_already_exists() {
        let server = server_with_user("octo").await;
        Mock::given(method("POST"))
            .and(path("/user/repos"))
            .respond_with(ResponseTemplate::new(422).set_body_json(json!({
                "message": "Repository creation failed."
            })))
            .mount(&server)
            .await;

        let err = forge(&server).create_repo(request("idea")).await.unwrap_err();
        assert!(matches!(err, ForgeError::AlreadyExists(name) if name == "idea"));
    }

    #[tokio::test]
    async fn delete_repo_without_scope_is_permission_denied() {
        let server = server_with_user("octo").await;
        Mock::given(method("DELETE"))
            .and(path("/repos/octo/idea"))
            .respond_with(
                ResponseTemplate::new(403)
                    .insert_header("X-Accepted-OAuth-Scopes", "delete_repo")
                    .insert_header("X-OAuth-Scopes", "repo")
                    .set_body_json(json!({ "message": "Must have admin rights to Repository." })),
            )
            .mount(&server)
            .await;

        let err = forge(&server).delete_repo("octo", "idea").await.unwrap_err();
        match err {
            ForgeError::PermissionDenied(message) => {
                assert!(message.contains("required scopes: delete_repo"));
                assert!(message.contains("granted: repo"));
            }
            other => panic!("expected PermissionDenied, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn delete_missing_repo_is_not_found() {
        let server = server_with_user("octo").await;
        Mock::given(method("DELETE"))
            .and(path("/repos/octo/idea"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "message": "Not Found" })))
            .mount(&server)
            .await;

        let err = forge(&server).delete_repo("octo", "idea").await.unwrap_err();
        assert!(matches!(err, ForgeError::NotFound(_)));
    }

    #[tokio::test]
    async fn rate_limit_message_is_rate_limited() {
        let server = server_with_user("octo").await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/idea"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "message": "API rate limit exceeded for user ID 1."
            })))
            .mount(&server)
            .await;

        let err = forge(&server).repo_exists("idea").await.unwrap_err();
        assert!(matches!(err, ForgeError::RateLimited));
    }

    #[tokio::test]
    async fn server_error_is_api_error() {
        let server = server_with_user("octo").await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/idea"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let err = forge(&server).repo_exists("idea").await.unwrap_err();
        assert!(matches!(err, ForgeError::ApiError { status: 502, .. }));
        assert!(!err.is_unavailable());
    }
}

// =============================================================================
// Pages
// =============================================================================

mod pages {
    use super::*;

    #[tokio::test]
    async fn enable_site_returns_html_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/repos/octo/idea/pages"))
            .and(body_partial_json(json!({ "source": { "branch": "gh-pages", "path": "/" } })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "html_url": "https://octo.github.io/idea/"
            })))
            .mount(&server)
            .await;

        let url = forge(&server)
            .enable_site("https://github.com/octo/idea", "gh-pages")
            .await
            .unwrap();
        assert_eq!(url, "https://octo.github.io/idea/");
    }

    #[tokio::test]
    async fn enable_site_already_configured_reads_existing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/repos/octo/idea/pages"))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "message": "GitHub Pages is already enabled."
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/idea/pages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "html_url": "https://octo.github.io/idea/"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let url = forge(&server)
            .enable_site("https://github.com/octo/idea", "gh-pages")
            .await
            .unwrap();
        assert_eq!(url, "https://octo.github.io/idea/");
    }

    #[tokio::test]
    async fn enable_site_without_html_url_uses_default() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/repos/Octo/idea/pages"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({})))
            .mount(&server)
            .await;

        let url = forge(&server)
            .enable_site("https://github.com/Octo/idea", "gh-pages")
            .await
            .unwrap();
        assert_eq!(url, "https://octo.github.io/idea/");
    }

    #[tokio::test]
    async fn delete_site_ref_missing_branch_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/repos/octo/idea/git/refs/heads/gh-pages"))
            .respond_with(ResponseTemplate::new(422).set_body_json(json!({
                "message": "Reference does not exist"
            })))
            .mount(&server)
            .await;

        let err = forge(&server)
            .delete_site_ref("https://github.com/octo/idea", "gh-pages")
            .await
            .unwrap_err();
        assert!(matches!(err, ForgeError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_site_ref_success() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/repos/octo/idea/git/refs/heads/gh-pages"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        forge(&server)
            .delete_site_ref("https://github.com/octo/idea", "gh-pages")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn foreign_url_is_rejected() {
        let server = MockServer::start().await;
        let err = forge(&server)
            .enable_site("not a url", "gh-pages")
            .await
            .unwrap_err();
        assert!(matches!(err, ForgeError::InvalidRepoUrl(_)));
    }
}

// =============================================================================
// Factory
// =============================================================================

mod factory {
    use super::*;

    #[tokio::test]
    async fn factory_builds_working_github_client() {
        let server = server_with_user("octo").await;

        let forge = create_forge("github", Some("test-token".into()), &server.uri()).unwrap();

        assert_eq!(forge.name(), "github");
        assert_eq!(forge.check_available().await.unwrap(), "octo");
    }

    #[test]
    fn unknown_provider_is_rejected() {
        assert!(create_forge("gitea", None, "https://example.com").is_err());
    }
}
