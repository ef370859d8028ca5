//! Command-line interface for the `oracle` binary.

use clap::{Parser, Subcommand};

/// Runs a managed OCR oracle node.
#[derive(Debug, Parser)]
#[command(name = "oracle", version, about)]
pub struct OracleCli {
    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Starts the managed oracle supervisor and runs until interrupted.
    Start(StartArgs),
    /// Starts a bootstrap-only node: peer discovery without the inner
    /// protocol.
    Bootstrap(StartArgs),
}

/// Arguments shared by the `start` and `bootstrap` subcommands.
#[derive(Debug, Parser)]
pub struct StartArgs {
    /// Path to the JSON configuration document.
    #[arg(long)]
    pub config: String,
}
