//! Raw config validation with unknown field detection.
//!
//! Runs against the untyped JSON before serde drops unknown keys, so typos
//! like `"trigers"` are reported instead of silently ignored.

use serde_json::Value;
use std::collections::HashSet;

const KNOWN_TOP_LEVEL: &[&str] = &[
    "telegram",
    "monitor",
    "triggers",
    "replies",
    "feed",
    "generation",
    "logging",
];

const KNOWN_SECTIONS: &[(&str, &[&str])] = &[
    ("telegram", &["token", "max_startup_retries"]),
    (
        "monitor",
        &[
            "auto_start",
            "allowed_chat_id",
            "chats",
            "history_capacity",
            "consumer_queue_size",
            "send_timeout_secs",
        ],
    ),
    ("triggers", &["phrases", "alert_log_path", "notify_chat_id"]),
    (
        "replies",
        &[
            "enabled",
            "generation_timeout_secs",
            "context_messages",
            "breaker_threshold",
            "breaker_cooldown_secs",
        ],
    ),
    ("feed", &["live_feed", "forward_chat_id"]),
    (
        "generation",
        &[
            "api_key",
            "api_base",
            "model",
            "system_prompt",
            "max_tokens",
            "temperature",
        ],
    ),
    ("logging", &["format", "level", "file"]),
];

/// A validation diagnostic.
#[derive(Debug)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub path: String,
    pub message: String,
}

#[derive(Debug, PartialEq)]
pub enum DiagnosticLevel {
    Ok,
    Warn,
    Error,
}

impl Diagnostic {
    fn new(level: DiagnosticLevel, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.level {
            DiagnosticLevel::Ok => "[OK]",
            DiagnosticLevel::Warn => "[WARN]",
            DiagnosticLevel::Error => "[ERROR]",
        };
        if self.path.is_empty() {
            write!(f, "{} {}", prefix, self.message)
        } else {
            write!(f, "{} {}: {}", prefix, self.path, self.message)
        }
    }
}

/// Edit distance over chars, used for "did you mean" hints.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();

    for (i, ca) in a.chars().enumerate() {
        let mut curr = vec![i + 1; b_chars.len() + 1];
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        prev = curr;
    }
    prev[b_chars.len()]
}

/// Suggest the closest known field name (if distance <= 3).
pub fn suggest_field(unknown: &str, known: &[&str]) -> Option<String> {
    known
        .iter()
        .map(|k| (k, levenshtein(unknown, k)))
        .filter(|(_, d)| *d <= 3)
        .min_by_key(|(_, d)| *d)
        .map(|(k, _)| format!("did you mean '{}'?", k))
}

fn unknown_field(path: String, key: &str, known: &[&str]) -> Diagnostic {
    let message = match suggest_field(key, known) {
        Some(hint) => format!("Unknown field '{}', {}", key, hint),
        None => format!("Unknown field '{}'", key),
    };
    Diagnostic::new(DiagnosticLevel::Error, path, message)
}

/// Validate a raw JSON config value against known field names.
pub fn validate_config(raw: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    let Some(obj) = raw.as_object() else {
        diagnostics.push(Diagnostic::new(
            DiagnosticLevel::Error,
            "",
            "Config must be a JSON object",
        ));
        return diagnostics;
    };

    diagnostics.push(Diagnostic::new(DiagnosticLevel::Ok, "", "Valid JSON"));

    let top: HashSet<&str> = KNOWN_TOP_LEVEL.iter().copied().collect();
    let mut has_unknown = false;
    for key in obj.keys() {
        if !top.contains(key.as_str()) {
            has_unknown = true;
            diagnostics.push(unknown_field(key.clone(), key, KNOWN_TOP_LEVEL));
        }
    }

    for (section, known) in KNOWN_SECTIONS {
        let Some(fields) = obj.get(*section).and_then(|v| v.as_object()) else {
            continue;
        };
        for key in fields.keys() {
            if !known.contains(&key.as_str()) {
                has_unknown = true;
                diagnostics.push(unknown_field(format!("{}.{}", section, key), key, known));
            }
        }
    }

    if !has_unknown {
        diagnostics.push(Diagnostic::new(
            DiagnosticLevel::Ok,
            "",
            "All fields recognized",
        ));
    }

    let monitor = obj.get("monitor").and_then(|v| v.as_object());
    let has_allow = monitor
        .and_then(|m| m.get("allowed_chat_id"))
        .map(|v| !v.is_null())
        .unwrap_or(false);
    let chat_count = monitor
        .and_then(|m| m.get("chats"))
        .and_then(|v| v.as_array())
        .map(|a| a.len())
        .unwrap_or(0);
    if !has_allow && chat_count == 0 {
        diagnostics.push(Diagnostic::new(
            DiagnosticLevel::Warn,
            "monitor.chats",
            "No chats registered and no allowed_chat_id; nothing will be processed",
        ));
    }

    diagnostics
}
