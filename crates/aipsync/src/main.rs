use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::runtime::{Builder, Runtime};

use crate::cli::app::{App, Commands};
use crate::config::Config;

mod cli;
mod config;
mod logging;
mod utils;

fn main() -> ExitCode {
    let app = App::parse();

    let quiet = matches!(&app.cmd, Commands::Sync(arg) if arg.progress);
    if let Err(e) = logging::init(app.verbose, quiet) {
        eprintln!("{e:#}");
    }

    match run(app) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(app: App) -> Result<ExitCode> {
    match app.cmd {
        Commands::Setup(arg) => cli::setup::setup(arg).map(|()| ExitCode::SUCCESS),
        Commands::Status(arg) => {
            let config = Config::load(&app.config)?;
            cli::status::status(arg, &config)
        }
        Commands::Sync(arg) => {
            let config = Config::load(&app.config)?;
            runtime()?.block_on(cli::sync::sync(arg, config))
        }
        Commands::Verify(arg) => {
            let config = Config::load(&app.config)?;
            runtime()?.block_on(cli::verify::verify(arg, config))
        }
    }
}

fn runtime() -> Result<Runtime> {
    Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")
}
