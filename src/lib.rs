//! GroupWatch - Real-time chat monitoring and auto-reply pipeline
//!
//! Inbound chat events arrive from a [`channels::ChatAdapter`], are filtered
//! against the monitored-chat allow-list, recorded in a bounded history,
//! fanned out to independent consumers, scanned for trigger phrases and
//! answered through a generation backend with a templated fallback.

pub mod bus;
pub mod channels;
pub mod config;
pub mod error;
pub mod monitor;
pub mod providers;
pub mod reply;
pub mod utils;

pub use bus::{FanoutBus, Message, RawEvent};
pub use channels::{ChatAdapter, TelegramAdapter};
pub use config::Config;
pub use error::{GenerationError, Result, WatchError};
pub use monitor::{MonitorService, MonitoringStats, ProcessOutcome};
pub use providers::{GenerationBackend, OpenAiBackend};
pub use reply::{ReplyOutcome, ReplyPipeline, ReplySource};
