use std::process::ExitCode;

use regen_verify::cli::parse_cli;
use regen_verify::{execute, resolve_settings};
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "REGEN_VERIFY_LOG";

#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let (cli, sources) = parse_cli();
    let settings = match resolve_settings(&cli, &sources) {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::from(2);
        }
    };
    if let Some(path) = settings.config_path.as_ref() {
        tracing::debug!(path = %path.display(), "loaded configuration");
    }

    match execute(cli.command, settings).await {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
