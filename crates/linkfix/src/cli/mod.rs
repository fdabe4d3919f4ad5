//! Command-line interface for the linkfix binary.

mod commands;
mod handlers;

pub use commands::{Cli, Commands};
pub use handlers::{backup_document, print_stats, run_bot, show_document};
