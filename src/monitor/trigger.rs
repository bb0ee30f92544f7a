//! Trigger phrase detection.

use aho_corasick::AhoCorasick;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::bus::Message;
use crate::error::{Result, WatchError};
use crate::utils::string::preview;

/// Characters of message text in the chat notification.
pub const NOTIFICATION_PREVIEW_CHARS: usize = 150;
/// Characters of message text written to the alert log.
pub const LOG_PREVIEW_CHARS: usize = 500;

/// A message that matched one or more trigger phrases.
#[derive(Debug, Clone)]
pub struct TriggerAlert {
    pub message: Arc<Message>,
    /// Matched phrases, in configured order, without duplicates
    pub matched_phrases: Vec<String>,
    pub raised_at: DateTime<Utc>,
}

impl TriggerAlert {
    pub fn new(message: Arc<Message>, matched_phrases: Vec<String>) -> Self {
        Self {
            message,
            matched_phrases,
            raised_at: Utc::now(),
        }
    }

    /// Text sent to the notification chat.
    pub fn format_notification(&self) -> String {
        let m = &self.message;
        format!(
            "🚨 TRIGGER DETECTED\n📍 Chat: {}\n👤 From: {} ({})\n🔑 Phrases: {}\n💬 Message: {}\n⏰ Time: {}",
            m.chat_title,
            m.from_display_name,
            m.from_user_id,
            self.matched_phrases.join(", "),
            preview(&m.text, NOTIFICATION_PREVIEW_CHARS),
            self.raised_at.to_rfc3339()
        )
    }

    /// One alert-log record, terminated by a `---` line.
    ///
    /// Multi-line values are indented so no body line can equal the
    /// delimiter.
    pub fn format_log_entry(&self) -> String {
        let m = &self.message;
        format!(
            "[{}] TRIGGER ALERT\nChat: {} ({})\nFrom: {} ({})\nTriggers: {}\nMessage: {}\n---\n",
            self.raised_at.to_rfc3339(),
            indent_continuation(&m.chat_title),
            m.chat_id,
            indent_continuation(&m.from_display_name),
            m.from_user_id,
            self.matched_phrases.join(", "),
            indent_continuation(&preview(&m.text, LOG_PREVIEW_CHARS))
        )
    }
}

fn indent_continuation(value: &str) -> String {
    value.replace('\n', "\n  ")
}

/// Case-insensitive substring matcher over a fixed phrase set.
#[derive(Debug, Clone)]
pub struct TriggerDetector {
    phrases: Vec<String>,
    matcher: Option<AhoCorasick>,
}

impl TriggerDetector {
    /// Build a detector. Blank phrases are ignored; duplicates collapse.
    pub fn new<S: AsRef<str>>(phrases: &[S]) -> Result<Self> {
        let mut normalized: Vec<String> = Vec::with_capacity(phrases.len());
        for phrase in phrases {
            let p = phrase.as_ref().trim().to_lowercase();
            if !p.is_empty() && !normalized.contains(&p) {
                normalized.push(p);
            }
        }

        let matcher = if normalized.is_empty() {
            None
        } else {
            Some(
                AhoCorasick::new(&normalized)
                    .map_err(|e| WatchError::Config(format!("invalid trigger phrases: {}", e)))?,
            )
        };

        Ok(Self {
            phrases: normalized,
            matcher,
        })
    }

    /// The normalized phrase list.
    pub fn phrases(&self) -> &[String] {
        &self.phrases
    }

    /// Every phrase contained in `text`, ignoring case, in configured order.
    pub fn detect(&self, text: &str) -> Vec<String> {
        let Some(matcher) = &self.matcher else {
            return Vec::new();
        };
        if text.is_empty() {
            return Vec::new();
        }

        let lowered = text.to_lowercase();
        let mut hit = vec![false; self.phrases.len()];
        for m in matcher.find_overlapping_iter(&lowered) {
            hit[m.pattern().as_usize()] = true;
        }
        self.phrases
            .iter()
            .zip(hit)
            .filter_map(|(p, h)| h.then(|| p.clone()))
            .collect()
    }

    /// Build an alert when `message` contains any phrase.
    pub fn check(&self, message: &Arc<Message>) -> Option<TriggerAlert> {
        let matched = self.detect(&message.text);
        if matched.is_empty() {
            None
        } else {
            Some(TriggerAlert::new(Arc::clone(message), matched))
        }
    }
}
