//! Chat adapter trait and types for GroupWatch
//!
//! The [`ChatAdapter`] trait is the only thing the monitoring core knows about
//! the chat network. Optional capabilities have default implementations that
//! report [`WatchError::CapabilityUnsupported`], so an adapter only implements
//! what its network offers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::bus::{Message, RawEvent};
use crate::error::{Result, WatchError};
use crate::monitor::ChatKind;

/// Callback the adapter invokes once per inbound event.
pub type EventHandler = Arc<dyn Fn(RawEvent) -> BoxFuture<'static, ()> + Send + Sync>;

/// Confirmation of a delivered message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendReceipt {
    pub message_id: String,
    pub timestamp: DateTime<Utc>,
}

impl SendReceipt {
    /// Receipt stamped with the current time.
    pub fn now(message_id: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            timestamp: Utc::now(),
        }
    }
}

/// A conversation the adapter's account participates in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dialog {
    pub id: String,
    pub name: String,
    pub kind: ChatKind,
}

/// A dialog annotated with whether it is currently monitored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupInfo {
    pub id: String,
    pub name: String,
    pub kind: ChatKind,
    pub is_monitored: bool,
}

/// The `ChatAdapter` trait connects the core to a chat network.
///
/// Adapters are shared as `Arc<dyn ChatAdapter>` and must use interior
/// mutability for their connection state.
///
/// # Example Implementation
///
/// ```ignore
/// use async_trait::async_trait;
/// use groupwatch::channels::{ChatAdapter, SendReceipt};
/// use groupwatch::error::Result;
///
/// struct ConsoleAdapter;
///
/// #[async_trait]
/// impl ChatAdapter for ConsoleAdapter {
///     fn name(&self) -> &str {
///         "console"
///     }
///
///     async fn connect(&self) -> Result<()> {
///         Ok(())
///     }
///
///     async fn disconnect(&self) -> Result<()> {
///         Ok(())
///     }
///
///     async fn send(&self, chat_id: &str, text: &str, _reply_to: Option<&str>) -> Result<SendReceipt> {
///         println!("[{}] {}", chat_id, text);
///         Ok(SendReceipt::now("0"))
///     }
/// }
/// ```
#[async_trait]
pub trait ChatAdapter: Send + Sync {
    /// Name used in logs (e.g. "telegram").
    fn name(&self) -> &str;

    /// Establish the session with the chat network.
    async fn connect(&self) -> Result<()>;

    /// Tear the session down. Bound handlers are dropped.
    async fn disconnect(&self) -> Result<()>;

    /// Send `text` to `chat_id`, optionally as a reply to message `reply_to`.
    async fn send(&self, chat_id: &str, text: &str, reply_to: Option<&str>)
        -> Result<SendReceipt>;

    /// Most recent messages of a chat, newest first.
    async fn fetch_history(&self, _chat_id: &str, _limit: usize) -> Result<Vec<Message>> {
        Err(WatchError::CapabilityUnsupported("fetch_history"))
    }

    /// Conversations visible to the account.
    async fn fetch_dialogs(&self, _limit: usize) -> Result<Vec<Dialog>> {
        Err(WatchError::CapabilityUnsupported("fetch_dialogs"))
    }

    /// Bind the inbound event handler.
    async fn subscribe(&self, _handler: EventHandler) -> Result<()> {
        Err(WatchError::CapabilityUnsupported("subscribe"))
    }
}

/// `adapter.send` bounded by `timeout`. An elapsed deadline is a send error.
pub async fn send_with_timeout(
    adapter: &dyn ChatAdapter,
    timeout: Duration,
    chat_id: &str,
    text: &str,
    reply_to: Option<&str>,
) -> Result<SendReceipt> {
    match tokio::time::timeout(timeout, adapter.send(chat_id, text, reply_to)).await {
        Ok(result) => result,
        Err(_) => Err(WatchError::Send(format!(
            "send to {} timed out after {:?}",
            chat_id, timeout
        ))),
    }
}
