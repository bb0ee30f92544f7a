//! Channels module - Chat network adapters
//!
//! The monitoring core talks to the chat network only through the
//! [`ChatAdapter`] trait. One concrete adapter ships with the crate:
//! [`TelegramAdapter`], built on the Telegram Bot API.
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                MonitorService               │
//! │   subscribe ─┐         ┌─ send / history    │
//! └──────────────┼─────────┼────────────────────┘
//!                ▼         ▼
//!          ┌───────────────────────┐
//!          │ dyn ChatAdapter       │
//!          │  (TelegramAdapter,    │
//!          │   test doubles, ...)  │
//!          └───────────────────────┘
//! ```

pub mod telegram;
pub mod types;

pub use telegram::TelegramAdapter;
pub use types::{send_with_timeout, ChatAdapter, Dialog, EventHandler, GroupInfo, SendReceipt};
