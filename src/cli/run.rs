//! Run command handler: connect, monitor, wait for Ctrl+C.

use anyhow::{bail, Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use groupwatch::channels::{ChatAdapter, TelegramAdapter};
use groupwatch::monitor::MonitorService;
use groupwatch::providers::{GenerationBackend, OpenAiBackend};

use super::load_config;

pub(crate) async fn cmd_run(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;

    if config.telegram.token.trim().is_empty() {
        bail!(
            "No Telegram bot token configured.\n\
             Set telegram.token in the config file or GROUPWATCH_TELEGRAM_TOKEN."
        );
    }
    for problem in config.validate() {
        warn!(problem = %problem, "Configuration problem");
    }

    let adapter: Arc<dyn ChatAdapter> = Arc::new(TelegramAdapter::new(config.telegram.clone()));
    let backend = OpenAiBackend::from_config(&config.generation)
        .map(|b| Arc::new(b) as Arc<dyn GenerationBackend>);
    if backend.is_none() {
        info!("No generation backend configured; replies will use templates");
    }

    let service = MonitorService::new(&config, Arc::clone(&adapter), backend)
        .await
        .context("Failed to create monitor service")?;

    if config.feed.live_feed {
        service
            .add_feed_callback(Arc::new(|entry: &str| println!("{}\n", entry)))
            .await;
    }

    if config.monitor.auto_start {
        if let Err(e) = service.connect_and_start().await {
            warn!(error = %e, "Monitoring did not start; the adapter may be unavailable");
        }
    } else if let Err(e) = adapter.connect().await {
        warn!(error = %e, "Adapter connect failed");
    }

    let stats = service.stats().await;
    println!();
    println!(
        "GroupWatch is running ({} chat(s), status: {:?}). Press Ctrl+C to stop.",
        stats.total_chats, stats.status
    );
    if !config.monitor.auto_start {
        println!("auto_start is disabled; monitoring stays idle.");
    }
    println!();

    tokio::signal::ctrl_c()
        .await
        .with_context(|| "Failed to listen for Ctrl+C")?;

    println!();
    println!("Shutting down...");

    let stats = service.stats().await;
    service.close().await;

    println!(
        "Processed {} message(s) in {}s.",
        stats.total_messages,
        stats.uptime.as_secs()
    );
    Ok(())
}
