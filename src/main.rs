use clap::Parser;
use nowcal::cli::Cli;
use std::process::ExitCode;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match nowcal::run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(%error, "command failed");
            eprintln!("error: {error}");
            if error.requires_login() {
                eprintln!("hint: run `nowcal auth-url` and then `nowcal login <code>`");
            }
            ExitCode::FAILURE
        }
    }
}
