use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "warden", about = "cluster-node maintenance orchestrator")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the controller and the observability HTTP surface.
    Serve {
        /// Path to the controller configuration file.
        #[arg(long, env = "WARDEN_CONFIG", default_value = "config/warden.yaml")]
        config: PathBuf,
        /// Bind address of the HTTP surface.
        #[arg(long, default_value = "0.0.0.0:8080")]
        bind: SocketAddr,
        /// Optional node fixture (YAML list) seeding the in-memory cluster;
        /// the production cluster client plugs in behind the same trait.
        #[arg(long)]
        nodes: Option<PathBuf>,
    },
    /// Load the configuration, compile all instances and profiles, and exit.
    Validate {
        #[arg(long, env = "WARDEN_CONFIG", default_value = "config/warden.yaml")]
        config: PathBuf,
    },
}
