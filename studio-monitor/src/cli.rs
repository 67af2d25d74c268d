//! Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "studio-monitor", about = "Watch a virtual studio from the terminal", version)]
pub struct Cli {
    /// TOML configuration file.
    #[arg(long, short, env = "STUDIO_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Join a studio and log every change until Ctrl-C.
    Watch {
        /// Studio (server) id.
        #[arg(long)]
        server: String,

        /// Bearer token.
        #[arg(long, env = "STUDIO_TOKEN", hide_env_values = true)]
        token: String,
    },

    /// Print the link that opens a studio in the desktop client.
    Join {
        #[arg(long)]
        server: String,
    },

    /// List the studios visible to the user.
    Studios {
        #[arg(long, env = "STUDIO_TOKEN", hide_env_values = true)]
        token: String,
    },

    /// List the recordings of a studio, optionally fetching one.
    Recordings {
        #[arg(long)]
        server: String,

        #[arg(long, env = "STUDIO_TOKEN", hide_env_values = true)]
        token: String,

        /// Recording to download into the download directory.
        #[arg(long)]
        download: Option<String>,

        /// Where recordings are stored. Defaults to the system temp dir.
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Feed the segments of an extracted recording through the segment queue.
    Segments {
        /// Directory holding `.flac` segments.
        dir: PathBuf,
    },
}
