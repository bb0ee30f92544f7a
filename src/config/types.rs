//! Configuration type definitions for GroupWatch
//!
//! All types implement serde traits for JSON serialization and carry
//! defaults, so a partial (or missing) config file is always usable.

use serde::{Deserialize, Serialize};

use crate::monitor::ChatKind;

/// Main configuration struct for GroupWatch
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Telegram adapter settings
    pub telegram: TelegramConfig,
    /// Monitored chats, allow-list override and pipeline sizing
    pub monitor: MonitorConfig,
    /// Trigger phrases and alert routing
    pub triggers: TriggerConfig,
    /// Auto-reply pipeline
    pub replies: ReplyConfig,
    /// Live feed and auto-forward consumers
    pub feed: FeedConfig,
    /// Generation backend (OpenAI-compatible)
    pub generation: GenerationConfig,
    /// Logging output
    pub logging: LoggingConfig,
}

// ============================================================================
// Telegram
// ============================================================================

/// Telegram Bot API adapter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot token from BotFather
    pub token: String,
    /// How many times `get_me` is retried before connect gives up
    pub max_startup_retries: u32,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            max_startup_retries: 10,
        }
    }
}

// ============================================================================
// Monitoring
// ============================================================================

/// A chat registered for monitoring at startup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatEntry {
    /// Chat identifier as the adapter reports it
    pub id: String,
    /// Optional display title; membership also matches on this
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub kind: ChatKind,
}

/// Monitoring pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Start monitoring right after the adapter connects
    pub auto_start: bool,
    /// When set, only this chat is processed and only this chat may be sent to
    pub allowed_chat_id: Option<String>,
    /// Chats registered at startup
    pub chats: Vec<ChatEntry>,
    /// Number of recent messages kept in memory
    pub history_capacity: usize,
    /// Per-consumer queue depth on the fan-out bus
    pub consumer_queue_size: usize,
    /// Deadline for every outbound send
    pub send_timeout_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            auto_start: true,
            allowed_chat_id: None,
            chats: Vec::new(),
            history_capacity: 100,
            consumer_queue_size: 256,
            send_timeout_secs: 10,
        }
    }
}

// ============================================================================
// Triggers
// ============================================================================

/// Default trigger phrases.
pub const DEFAULT_TRIGGER_PHRASES: &[&str] =
    &["help", "помощь", "пожаловаться", "report", "urgent", "срочно"];

/// Trigger detection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    /// Phrases matched case-insensitively as substrings
    pub phrases: Vec<String>,
    /// Append-only alert log file
    pub alert_log_path: String,
    /// Chat that receives formatted alert notifications
    pub notify_chat_id: Option<String>,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            phrases: DEFAULT_TRIGGER_PHRASES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            alert_log_path: "trigger-alerts.log".to_string(),
            notify_chat_id: None,
        }
    }
}

// ============================================================================
// Replies
// ============================================================================

/// Auto-reply pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplyConfig {
    /// Master switch; can also be flipped at runtime
    pub enabled: bool,
    /// Deadline for one generation call
    pub generation_timeout_secs: u64,
    /// Recent messages from the same chat handed to the backend
    pub context_messages: usize,
    /// Consecutive backend failures before the breaker opens
    pub breaker_threshold: u32,
    /// How long an open breaker skips the backend
    pub breaker_cooldown_secs: u64,
}

impl Default for ReplyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            generation_timeout_secs: 20,
            context_messages: 10,
            breaker_threshold: 3,
            breaker_cooldown_secs: 30,
        }
    }
}

// ============================================================================
// Feed
// ============================================================================

/// Live feed and auto-forward configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Print the live feed to stdout when running from the CLI
    pub live_feed: bool,
    /// Forward every accepted message (formatted) to this chat
    pub forward_chat_id: Option<String>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            live_feed: true,
            forward_chat_id: None,
        }
    }
}

// ============================================================================
// Generation backend
// ============================================================================

/// OpenAI-compatible generation backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// API key; without one the pipeline always uses fallback replies
    pub api_key: Option<String>,
    /// Base URL, e.g. `https://api.openai.com/v1`
    pub api_base: Option<String>,
    pub model: String,
    /// Instruction prepended to every request
    pub system_prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: None,
            model: "gpt-4o-mini".to_string(),
            system_prompt: "You are a friendly member of a group chat. Reply briefly and \
                            naturally, in the language of the message you are answering."
                .to_string(),
            max_tokens: 200,
            temperature: 0.7,
        }
    }
}

// ============================================================================
// Logging
// ============================================================================

/// Log output format
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line human-readable output
    Pretty,
    /// Compact single-line output with a `component` field
    #[default]
    Component,
    /// JSON lines
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
    /// Append JSON logs to this file instead of stdout
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Component,
            level: "info".to_string(),
            file: None,
        }
    }
}
