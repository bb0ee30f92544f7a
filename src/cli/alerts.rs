//! Alert log tail command handler.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use groupwatch::monitor::AlertLog;

use super::load_config;

pub(crate) async fn cmd_alerts(limit: usize, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let path = PathBuf::from(&config.triggers.alert_log_path);

    let records = AlertLog::read_recent(&path, limit)
        .await
        .with_context(|| format!("Failed to read alert log {}", path.display()))?;

    if records.is_empty() {
        println!("No trigger alerts recorded in {}", path.display());
        return Ok(());
    }

    println!("Last {} alert(s) from {}:", records.len(), path.display());
    for record in records {
        println!();
        println!("{}", record);
    }
    Ok(())
}
