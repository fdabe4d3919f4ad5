//! Command handlers.

use linkfix::{BotContext, DocumentBackend, FileSystemBackend, LinkfixConfig};
use linkfix_error::{LinkfixResult, StoreError, StoreErrorKind};
use serde_json::{Value, json};
use tracing::{info, instrument};

/// Run until Ctrl-C, then flush and exit.
#[instrument(skip_all)]
pub async fn run_bot(config: LinkfixConfig) -> Result<(), Box<dyn std::error::Error>> {
    let context = BotContext::new(config)?;
    context.start();
    info!(
        data_dir = %context.config().store().data_dir().display(),
        "linkfix running, press Ctrl-C to stop"
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");

    let flushed = context.shutdown().await?;
    info!(flushed, "Stopped");
    Ok(())
}

/// Print a persisted document without caching or creating it.
#[instrument(skip(config))]
pub async fn show_document(config: &LinkfixConfig, key: &str) -> LinkfixResult<()> {
    let backend = FileSystemBackend::new(config.store().data_dir())?;
    let bytes = backend
        .read(key)
        .await?
        .ok_or_else(|| StoreError::new(StoreErrorKind::NotFound(key.to_string())))?;

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(value) => println!("{}", pretty(&value)),
        Err(_) => println!("{}", String::from_utf8_lossy(&bytes)),
    }
    Ok(())
}

/// Write a backup and print its key.
#[instrument(skip(config))]
pub async fn backup_document(config: LinkfixConfig, key: &str) -> LinkfixResult<()> {
    let context = BotContext::new(config)?;
    let backup = context.store().backup(key).await?;
    println!("{}", backup);
    Ok(())
}

/// Load the configured documents that exist and print statistics.
///
/// Read-only: missing documents are listed, never created.
#[instrument(skip_all)]
pub async fn print_stats(config: LinkfixConfig) -> LinkfixResult<()> {
    let context = BotContext::new(config)?;
    let found = context.load_configured_documents().await;

    let report = json!({
        "store": context.store().stats(),
        "rate_limit": context.limiter().stats(),
        "documents": found,
    });
    println!("{}", pretty(&report));
    Ok(())
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
