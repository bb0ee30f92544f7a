//! Monitored-chat registry.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// What kind of chat is being monitored.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    Group,
    Channel,
    #[default]
    Unknown,
}

/// A chat eligible for processing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonitoredChat {
    pub id: String,
    pub display_title: String,
    pub kind: ChatKind,
}

/// In-memory set of monitored chats, keyed by id.
///
/// Membership also matches on display title, so a chat registered by title
/// before its id is known is still picked up.
///
/// # Example
///
/// ```rust
/// use groupwatch::monitor::{ChatKind, ChatRegistry, MonitoredChat};
///
/// # tokio_test::block_on(async {
/// let registry = ChatRegistry::new();
/// registry
///     .add(MonitoredChat {
///         id: "-100".into(),
///         display_title: "Ops".into(),
///         kind: ChatKind::Group,
///     })
///     .await;
///
/// assert!(registry.contains("-100", "whatever").await);
/// assert!(registry.contains("-200", "Ops").await);
/// assert!(!registry.contains("-200", "Sales").await);
/// # });
/// ```
#[derive(Debug, Default)]
pub struct ChatRegistry {
    chats: RwLock<HashMap<String, MonitoredChat>>,
}

impl ChatRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a chat. Returns `false` if the id was already present (the
    /// entry is replaced either way).
    pub async fn add(&self, chat: MonitoredChat) -> bool {
        self.chats
            .write()
            .await
            .insert(chat.id.clone(), chat)
            .is_none()
    }

    /// Remove a chat by id. Returns `false` if it was not registered.
    pub async fn remove(&self, id: &str) -> bool {
        self.chats.write().await.remove(id).is_some()
    }

    /// True when `id` is registered or any entry carries `title`.
    pub async fn contains(&self, id: &str, title: &str) -> bool {
        let chats = self.chats.read().await;
        chats.contains_key(id) || chats.values().any(|c| c.display_title == title)
    }

    /// Snapshot of all registered chats, sorted by id.
    pub async fn list(&self) -> Vec<MonitoredChat> {
        let mut list: Vec<MonitoredChat> = self.chats.read().await.values().cloned().collect();
        list.sort_by(|a, b| a.id.cmp(&b.id));
        list
    }

    pub async fn len(&self) -> usize {
        self.chats.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.chats.read().await.is_empty()
    }
}
