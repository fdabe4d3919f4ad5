//! CLI command definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// linkfix - runtime and maintenance tool for the link-fixing chat bot
#[derive(Parser, Debug)]
#[command(name = "linkfix")]
#[command(about = "Runtime and maintenance tool for the linkfix chat bot", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Read this configuration file instead of the layered defaults
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the store and limiter background tasks and wait for Ctrl-C
    Run,

    /// Pretty-print a persisted document
    Show {
        /// Document key, relative to the data directory
        key: String,
    },

    /// Write a timestamped copy of a document next to it
    Backup {
        /// Document key, relative to the data directory
        key: String,
    },

    /// Load every configured document and print store statistics as JSON
    Stats,
}
