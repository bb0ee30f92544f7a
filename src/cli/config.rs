//! Config check / show command handlers.

use anyhow::{Context, Result};
use std::path::Path;

use groupwatch::config::validate::{validate_config, DiagnosticLevel};
use groupwatch::config::Config;

use super::{load_config, ConfigAction};

const MASK: &str = "********";

pub(crate) async fn cmd_config(action: ConfigAction, path: Option<&Path>) -> Result<()> {
    match action {
        ConfigAction::Check => check(path),
        ConfigAction::Show => show(path),
    }
}

fn check(path: Option<&Path>) -> Result<()> {
    let config_path = path.map(Path::to_path_buf).unwrap_or_else(Config::path);
    println!("Config file: {}", config_path.display());

    let mut errors = 0;
    let mut warnings = 0;

    if config_path.exists() {
        let content =
            std::fs::read_to_string(&config_path).context("Failed to read config file")?;
        let raw: serde_json::Value = match serde_json::from_str(&content) {
            Ok(v) => v,
            Err(e) => {
                println!("[ERROR] Invalid JSON: {}", e);
                return Ok(());
            }
        };

        for diag in validate_config(&raw) {
            println!("{}", diag);
            match diag.level {
                DiagnosticLevel::Error => errors += 1,
                DiagnosticLevel::Warn => warnings += 1,
                DiagnosticLevel::Ok => {}
            }
        }
    } else {
        println!("[OK] No config file found (using defaults)");
    }

    // Semantic checks run on the effective config, env overrides included
    let config = load_config(path)?;
    for problem in config.validate() {
        println!("[ERROR] {}", problem);
        errors += 1;
    }
    if !config.has_generation_backend() {
        println!("[WARN] No generation API key; replies will use templates only");
        warnings += 1;
    }

    if errors == 0 && warnings == 0 {
        println!("\nConfiguration looks good!");
    } else {
        println!("\nFound {} error(s), {} warning(s)", errors, warnings);
    }
    Ok(())
}

fn show(path: Option<&Path>) -> Result<()> {
    let config = redacted(load_config(path)?);
    let json = serde_json::to_string_pretty(&config).context("Failed to serialize config")?;
    println!("{}", json);
    Ok(())
}

/// Copy of `config` with credentials masked.
fn redacted(mut config: Config) -> Config {
    if !config.telegram.token.is_empty() {
        config.telegram.token = MASK.to_string();
    }
    if config.generation.api_key.is_some() {
        config.generation.api_key = Some(MASK.to_string());
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redacted_masks_secrets() {
        let mut config = Config::default();
        config.telegram.token = "123:abc".into();
        config.generation.api_key = Some("sk-live".into());

        let shown = redacted(config);
        assert_eq!(shown.telegram.token, MASK);
        assert_eq!(shown.generation.api_key.as_deref(), Some(MASK));
    }

    #[test]
    fn test_redacted_leaves_empty_values() {
        let shown = redacted(Config::default());
        assert!(shown.telegram.token.is_empty());
        assert!(shown.generation.api_key.is_none());
    }
}
