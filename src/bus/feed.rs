//! Built-in fan-out consumers: the live feed and the auto-forward distributor.

use async_trait::async_trait;
use futures::future::BoxFuture;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error};

use super::{Consumer, Message};
use crate::error::Result;
use crate::utils::string::preview;

/// Characters of message text shown in the live feed.
pub const LIVE_FEED_PREVIEW_CHARS: usize = 150;
/// Characters of message text carried by auto-forwarded messages.
pub const FORWARD_PREVIEW_CHARS: usize = 200;

/// Receives one formatted live-feed entry.
pub type FeedCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Delivers one formatted forward text somewhere (usually another chat).
pub type Distributor = Arc<dyn Fn(String) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Handle returned by [`LiveFeed::add_callback`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FeedCallbackId(u64);

fn sender_line(message: &Message) -> String {
    match &message.from_handle {
        Some(handle) => format!("{} {}", message.from_display_name, handle),
        None => message.from_display_name.clone(),
    }
}

/// Format a message for the live feed.
///
/// ```text
/// [14:03:27] 📨 Ops Chat
/// 👤 Ada Lovelace @ada
/// 💬 need urgent help
/// ```
pub fn format_live_entry(message: &Message) -> String {
    format!(
        "[{}] 📨 {}\n👤 {}\n💬 {}",
        message.timestamp.format("%H:%M:%S"),
        message.chat_title,
        sender_line(message),
        preview(&message.text, LIVE_FEED_PREVIEW_CHARS)
    )
}

/// Format a message for auto-forwarding.
pub fn format_forward(message: &Message) -> String {
    let body = if message.has_text() {
        preview(&message.text, FORWARD_PREVIEW_CHARS)
    } else if let Some(kind) = message.media {
        format!("[{}]", kind.as_str())
    } else {
        String::new()
    };
    format!(
        "📨 {} ({})\n👤 {}\n🕐 {}\n💬 {}",
        message.chat_title,
        message.chat_id,
        sender_line(message),
        message.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
        body
    )
}

// ============================================================================
// Live feed
// ============================================================================

/// Formats every message and hands it to each registered callback.
///
/// A panicking callback is logged and skipped; the others still run.
#[derive(Default)]
pub struct LiveFeed {
    callbacks: RwLock<Vec<(FeedCallbackId, FeedCallback)>>,
    next_id: AtomicU64,
}

impl LiveFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_callback(&self, callback: FeedCallback) -> FeedCallbackId {
        let id = FeedCallbackId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut callbacks = self.callbacks.write().await;
        callbacks.push((id, callback));
        debug!(total = callbacks.len(), "Live feed callback added");
        id
    }

    pub async fn remove_callback(&self, id: FeedCallbackId) -> bool {
        let mut callbacks = self.callbacks.write().await;
        let before = callbacks.len();
        callbacks.retain(|(cid, _)| *cid != id);
        let removed = callbacks.len() != before;
        if removed {
            debug!(remaining = callbacks.len(), "Live feed callback removed");
        }
        removed
    }

    pub async fn callback_count(&self) -> usize {
        self.callbacks.read().await.len()
    }
}

#[async_trait]
impl Consumer for LiveFeed {
    fn name(&self) -> &str {
        "live_feed"
    }

    async fn consume(&self, message: Arc<Message>) -> Result<()> {
        let callbacks = self.callbacks.read().await;
        if callbacks.is_empty() {
            return Ok(());
        }
        let entry = format_live_entry(&message);
        for (id, callback) in callbacks.iter() {
            if catch_unwind(AssertUnwindSafe(|| callback(entry.as_str()))).is_err() {
                error!(callback = id.0, "Live feed callback panicked");
            }
        }
        Ok(())
    }
}

// ============================================================================
// Auto-forward
// ============================================================================

/// Forwards every message, formatted, through a single optional distributor.
#[derive(Default)]
pub struct AutoForward {
    distributor: RwLock<Option<Distributor>>,
}

impl AutoForward {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install (or replace) the distributor.
    pub async fn set_distributor(&self, distributor: Distributor) {
        *self.distributor.write().await = Some(distributor);
        debug!("Message distributor installed");
    }

    pub async fn clear_distributor(&self) {
        *self.distributor.write().await = None;
    }

    pub async fn has_distributor(&self) -> bool {
        self.distributor.read().await.is_some()
    }
}

#[async_trait]
impl Consumer for AutoForward {
    fn name(&self) -> &str {
        "auto_forward"
    }

    async fn consume(&self, message: Arc<Message>) -> Result<()> {
        let distributor = self.distributor.read().await.clone();
        match distributor {
            Some(distribute) => distribute(format_forward(&message)).await,
            None => Ok(()),
        }
    }
}
