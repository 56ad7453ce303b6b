use std::process::ExitCode;

fn main() -> ExitCode {
    match interbrain_publish::cli::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            interbrain_publish::ui::output::error(format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}
