use clap::Parser;
use mediashelf::cli::{Cli, run_cli};
use mediashelf::output::OutputFormatter;
use std::process::ExitCode;

fn main() -> ExitCode {
    // Diagnostics on stderr; user-facing output goes through OutputFormatter.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run_cli(cli.command, cli.config.as_deref()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            OutputFormatter::error(&format!("Error: {e:#}"));
            ExitCode::FAILURE
        }
    }
}
