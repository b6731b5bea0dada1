// src/main.rs

mod cli;

use clap::Parser;
use cli::Args;
use std::process::ExitCode;
use std::time::Instant;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "GIT_STATIC_LOG";

fn init_tracing(verbose: bool) {
    let default = if verbose { "git_static=debug" } else { "git_static=info" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);
    let start_time = Instant::now();

    match git_static::run(&args.config()) {
        Ok(summary) => {
            info!(
                written = summary.written,
                skipped = summary.skipped,
                "build finished in {:.2?}",
                start_time.elapsed()
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}
