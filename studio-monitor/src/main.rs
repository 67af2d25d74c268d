//! Headless monitor for the virtual studio client.
//!
//! Drives the sync engine from the terminal: joins a studio and logs the
//! participant directory as it changes, lists the catalog, and exercises the
//! recording pipeline.

mod cli;
mod commands;
mod settings;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Command};

/// Initialize logging.
fn init_logging() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "studio_monitor=debug,studio_engine=debug,studio_transport=debug,studio_api=debug,studio_recording=debug".into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let config = settings::load(cli.config.as_deref())?;
    info!(api_host = %config.api_host, "Studio monitor starting");

    match cli.command {
        Command::Watch { server, token } => commands::watch(config, server, token),
        Command::Join { server } => commands::join(&server),
        Command::Studios { token } => commands::studios(config, token),
        Command::Recordings {
            server,
            token,
            download,
            dir,
        } => commands::recordings(&config, &server, &token, download.as_deref(), dir),
        Command::Segments { dir } => commands::segments(&dir),
    }
}
