//! linkfix CLI binary.
//!
//! - Run the bot runtime until Ctrl-C
//! - Inspect and back up persisted documents
//! - Report store statistics

use clap::Parser;
use linkfix::{LinkfixConfig, telemetry};

mod cli;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use cli::{Cli, Commands, backup_document, print_stats, run_bot, show_document};

    // Load .env before any LINKFIX_ variables are read
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => LinkfixConfig::from_file(path)?,
        None => LinkfixConfig::load()?,
    };

    let mut logging = config.logging().clone();
    if cli.verbose {
        logging = logging.with_level("debug");
    }
    telemetry::init_tracing(&logging)?;

    match cli.command {
        Commands::Run => run_bot(config).await?,
        Commands::Show { key } => show_document(&config, &key).await?,
        Commands::Backup { key } => backup_document(config, &key).await?,
        Commands::Stats => print_stats(config).await?,
    }

    Ok(())
}
