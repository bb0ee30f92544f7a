//! Configuration management for GroupWatch
//!
//! Configuration is loaded from `~/.groupwatch/config.json` (or an explicit
//! path) and then overridden from the environment.

mod types;
pub mod validate;

pub use types::*;

use crate::error::Result;
use std::path::{Path, PathBuf};

impl Config {
    /// Returns the GroupWatch configuration directory path (~/.groupwatch)
    pub fn dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".groupwatch")
    }

    /// Returns the path to the config file (~/.groupwatch/config.json)
    pub fn path() -> PathBuf {
        Self::dir().join("config.json")
    }

    /// Load configuration from the default path with environment overrides.
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::path())
    }

    /// Load configuration from a specific path with environment overrides.
    ///
    /// A missing file yields the default configuration.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content)?
        } else {
            Config::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Save configuration to a specific path, creating parent directories.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup.
    ///
    /// `GROUPWATCH_*` names win over the legacy unprefixed names.
    fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |keys: &[&str]| keys.iter().find_map(|k| lookup(*k)).filter(|v| !v.is_empty());

        if let Some(val) = first(&["GROUPWATCH_TELEGRAM_TOKEN", "TELEGRAM_BOT_TOKEN"]) {
            self.telegram.token = val;
        }
        if let Some(val) = first(&["GROUPWATCH_ALLOWED_CHAT_ID", "ALLOWED_GROUP_ID"]) {
            self.monitor.allowed_chat_id = Some(val);
        }
        if let Some(val) = first(&[
            "GROUPWATCH_MONITORING_CHANNEL_ID",
            "TELEGRAM_MONITORING_CHANNEL_ID",
        ]) {
            self.triggers.notify_chat_id = Some(val);
        }
        if let Some(val) = first(&["GROUPWATCH_GENERATION_API_KEY"]) {
            self.generation.api_key = Some(val);
        }
        if let Some(val) = first(&["GROUPWATCH_GENERATION_API_BASE"]) {
            self.generation.api_base = Some(val);
        }
        if let Some(val) = first(&["GROUPWATCH_GENERATION_MODEL"]) {
            self.generation.model = val;
        }
        if let Some(val) = first(&["GROUPWATCH_REPLIES_ENABLED"]) {
            if let Ok(enabled) = val.parse() {
                self.replies.enabled = enabled;
            }
        }
        if let Some(val) = first(&["GROUPWATCH_ALERT_LOG_PATH"]) {
            self.triggers.alert_log_path = val;
        }
    }

    /// Semantic checks that serde cannot express.
    ///
    /// Returns one human-readable line per problem; empty means valid.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.telegram.token.trim().is_empty() {
            problems.push("telegram.token is empty".to_string());
        }
        if self.monitor.history_capacity == 0 {
            problems.push("monitor.history_capacity must be at least 1".to_string());
        }
        if self.monitor.consumer_queue_size == 0 {
            problems.push("monitor.consumer_queue_size must be at least 1".to_string());
        }
        if self.monitor.send_timeout_secs == 0 {
            problems.push("monitor.send_timeout_secs must be at least 1".to_string());
        }
        for (i, chat) in self.monitor.chats.iter().enumerate() {
            if chat.id.trim().is_empty() {
                problems.push(format!("monitor.chats[{}].id is empty", i));
            }
        }
        if self.triggers.phrases.iter().any(|p| p.trim().is_empty()) {
            problems.push("triggers.phrases contains an empty phrase".to_string());
        }
        if self.triggers.alert_log_path.trim().is_empty() {
            problems.push("triggers.alert_log_path is empty".to_string());
        }
        if self.replies.generation_timeout_secs == 0 {
            problems.push("replies.generation_timeout_secs must be at least 1".to_string());
        }
        if self.replies.breaker_threshold == 0 {
            problems.push("replies.breaker_threshold must be at least 1".to_string());
        }
        if self.generation.api_base.is_some() && self.generation.api_key.is_none() {
            problems.push(
                "generation.api_base is set but generation.api_key is missing".to_string(),
            );
        }

        problems
    }

    /// Whether a generation backend can be constructed.
    pub fn has_generation_backend(&self) -> bool {
        self.generation
            .api_key
            .as_ref()
            .map(|k| !k.trim().is_empty())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::ChatKind;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.monitor.auto_start);
        assert_eq!(config.monitor.history_capacity, 100);
        assert!(config.monitor.allowed_chat_id.is_none());
        assert_eq!(config.triggers.phrases.len(), 6);
        assert_eq!(config.triggers.alert_log_path, "trigger-alerts.log");
        assert!(config.replies.enabled);
        assert_eq!(config.replies.context_messages, 10);
        assert_eq!(config.replies.breaker_threshold, 3);
        assert_eq!(config.replies.breaker_cooldown_secs, 30);
    }

    #[test]
    fn test_config_partial_json() {
        let json = r#"{
            "monitor": {
                "allowed_chat_id": "-100123",
                "chats": [{"id": "-100123", "title": "Ops", "kind": "group"}]
            },
            "replies": {"enabled": false}
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();

        assert_eq!(config.monitor.allowed_chat_id.as_deref(), Some("-100123"));
        assert_eq!(config.monitor.chats.len(), 1);
        assert_eq!(config.monitor.chats[0].kind, ChatKind::Group);
        assert_eq!(config.monitor.history_capacity, 100);
        assert!(!config.replies.enabled);
        assert_eq!(config.replies.generation_timeout_secs, 20);
    }

    #[test]
    fn test_chat_entry_kind_defaults_to_unknown() {
        let entry: ChatEntry = serde_json::from_str(r#"{"id": "42"}"#).unwrap();
        assert_eq!(entry.kind, ChatKind::Unknown);
        assert!(entry.title.is_none());
    }

    #[test]
    fn test_config_dir() {
        assert!(Config::dir().ends_with(".groupwatch"));
        assert!(Config::path().ends_with("config.json"));
    }

    #[test]
    fn test_env_override_prefixed() {
        let mut config = Config::default();
        config.apply_overrides_from(lookup(&[
            ("GROUPWATCH_TELEGRAM_TOKEN", "123:abc"),
            ("GROUPWATCH_ALLOWED_CHAT_ID", "-100777"),
            ("GROUPWATCH_GENERATION_MODEL", "test-model"),
            ("GROUPWATCH_REPLIES_ENABLED", "false"),
        ]));

        assert_eq!(config.telegram.token, "123:abc");
        assert_eq!(config.monitor.allowed_chat_id.as_deref(), Some("-100777"));
        assert_eq!(config.generation.model, "test-model");
        assert!(!config.replies.enabled);
    }

    #[test]
    fn test_env_override_legacy_names() {
        let mut config = Config::default();
        config.apply_overrides_from(lookup(&[
            ("ALLOWED_GROUP_ID", "-100555"),
            ("TELEGRAM_MONITORING_CHANNEL_ID", "-100999"),
        ]));

        assert_eq!(config.monitor.allowed_chat_id.as_deref(), Some("-100555"));
        assert_eq!(config.triggers.notify_chat_id.as_deref(), Some("-100999"));
    }

    #[test]
    fn test_env_override_prefixed_wins() {
        let mut config = Config::default();
        config.apply_overrides_from(lookup(&[
            ("ALLOWED_GROUP_ID", "legacy"),
            ("GROUPWATCH_ALLOWED_CHAT_ID", "prefixed"),
        ]));
        assert_eq!(config.monitor.allowed_chat_id.as_deref(), Some("prefixed"));
    }

    #[test]
    fn test_env_override_ignores_empty_values() {
        let mut config = Config::default();
        config.apply_overrides_from(lookup(&[("GROUPWATCH_ALLOWED_CHAT_ID", "")]));
        assert!(config.monitor.allowed_chat_id.is_none());
    }

    #[test]
    fn test_validate_default_reports_missing_token() {
        let problems = Config::default().validate();
        assert_eq!(problems, vec!["telegram.token is empty".to_string()]);
    }

    #[test]
    fn test_validate_catches_zero_sizes() {
        let mut config = Config::default();
        config.telegram.token = "t".into();
        config.monitor.history_capacity = 0;
        config.replies.breaker_threshold = 0;
        config.triggers.phrases.push("  ".into());

        let problems = config.validate();
        assert_eq!(problems.len(), 3);
        assert!(problems.iter().any(|p| p.contains("history_capacity")));
        assert!(problems.iter().any(|p| p.contains("breaker_threshold")));
        assert!(problems.iter().any(|p| p.contains("empty phrase")));
    }

    #[test]
    fn test_has_generation_backend() {
        let mut config = Config::default();
        assert!(!config.has_generation_backend());
        config.generation.api_key = Some("   ".into());
        assert!(!config.has_generation_backend());
        config.generation.api_key = Some("sk-test".into());
        assert!(config.has_generation_backend());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::default();
        config.monitor.history_capacity = 42;
        config.triggers.phrases = vec!["fire".into()];
        config.save_to_path(&path).unwrap();

        let loaded = Config::load_from_path(&path).unwrap();
        assert_eq!(loaded.monitor.history_capacity, 42);
        assert_eq!(loaded.triggers.phrases, vec!["fire".to_string()]);
    }

    #[test]
    fn test_load_nonexistent() {
        let path = PathBuf::from("/nonexistent/path/config.json");
        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.monitor.history_capacity, 100);
    }
}
