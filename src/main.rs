//! Binary entrypoint for the `clank` CLI.

use std::process::ExitCode;

use clap::Parser;
use clank::cli::Cli;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    // A missing .env is fine; GITHUB_TOKEN may come from the environment.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.as_str()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    // Recording and replay are handled in commands::dispatch via
    // CLANK_RECORD=<dir> and CLANK_REPLAY=<file>.
    match clank::commands::dispatch(&cli) {
        Ok(summary) if summary.is_clean() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
