mod auth;
mod cli;
mod config;
mod error;
mod output;
mod providers;
mod trigger;

use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use cli::Cli;
use log::{error, info, warn};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();

    output::print_banner();

    let cli = Cli::parse();
    let config = match cli.resolve() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err:#}\n");
            // Usage goes to stdout, like `--help`.
            if let Err(e) = Cli::command().print_help() {
                warn!("Failed to print usage: {e}");
            }
            return ExitCode::from(2);
        }
    };
    info!("Starting gitlab-trigger");

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping");
            on_interrupt.cancel();
        }
    });

    match cli::run(config, &cancel).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
