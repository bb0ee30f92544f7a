//! Monitor module - the chat monitoring core
//!
//! - [`MonitorService`]: orchestrates the pipeline below
//! - [`SubscriptionGuard`]: binds the adapter event handler exactly once
//! - [`MonitoringState`]: idle / monitoring / stopped plus counters
//! - [`ChatRegistry`]: chats eligible for processing
//! - [`HistoryBuffer`]: most recent accepted messages
//! - [`TriggerDetector`] and [`AlertLog`]: phrase alerts

pub mod alert_log;
pub mod guard;
pub mod history;
pub mod registry;
pub mod service;
pub mod state;
pub mod trigger;

pub use alert_log::AlertLog;
pub use guard::{GuardOutcome, SubscriptionGuard};
pub use history::{HistoryBuffer, DEFAULT_HISTORY_CAPACITY};
pub use registry::{ChatKind, ChatRegistry, MonitoredChat};
pub use service::{MonitorService, ProcessOutcome, ALL_GROUPS_DIALOG_LIMIT};
pub use state::{MonitoringState, MonitoringStats, MonitoringStatus, Transition};
pub use trigger::{TriggerAlert, TriggerDetector};
