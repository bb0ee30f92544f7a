//! CLI module - command parsing and dispatch
//!
//! All CLI logic lives here. `main.rs` calls `cli::run()`.

pub mod alerts;
pub mod config;
pub mod run;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use std::path::{Path, PathBuf};

use groupwatch::config::Config;

#[derive(Parser)]
#[command(name = "groupwatch")]
#[command(version)]
#[command(about = "Real-time chat monitoring with trigger alerts and auto-replies", long_about = None)]
struct Cli {
    /// Config file (defaults to ~/.groupwatch/config.json)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to the chat network and monitor until Ctrl+C
    Run,
    /// Inspect the configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Show the most recent trigger alerts
    Alerts {
        /// Number of alerts to show
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
    /// Show version information
    Version,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Validate the configuration file
    Check,
    /// Print the effective configuration with secrets masked
    Show,
}

/// Load the config from `path` or the default location.
pub(crate) fn load_config(path: Option<&Path>) -> Result<Config> {
    use anyhow::Context;

    match path {
        Some(p) => Config::load_from_path(p)
            .with_context(|| format!("Failed to load config from {}", p.display())),
        None => Config::load().context("Failed to load config"),
    }
}

pub async fn run() -> Result<()> {
    // A missing .env is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Respect the configured logging settings; fall back to defaults if the
    // config file is missing or unreadable.
    let logging_cfg = load_config(cli.config.as_deref())
        .map(|c| c.logging)
        .unwrap_or_default();
    if let Err(e) = groupwatch::utils::logging::init_logging(&logging_cfg) {
        eprintln!("Failed to open log file: {}", e);
    }

    match cli.command {
        None => {
            let mut cmd = Cli::command();
            cmd.print_help()?;
            println!();
        }
        Some(Commands::Version) => {
            cmd_version();
        }
        Some(Commands::Run) => {
            run::cmd_run(cli.config.as_deref()).await?;
        }
        Some(Commands::Config { action }) => {
            config::cmd_config(action, cli.config.as_deref()).await?;
        }
        Some(Commands::Alerts { limit }) => {
            alerts::cmd_alerts(limit, cli.config.as_deref()).await?;
        }
    }

    Ok(())
}

fn cmd_version() {
    println!("groupwatch {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Real-time chat monitoring with trigger alerts and auto-replies");
}
