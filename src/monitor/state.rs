//! Monitoring state machine and counters.
//!
//! ```text
//!   idle ──start──> monitoring ──stop──> stopped
//!                       ^                   │
//!                       └──────start────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

/// Lifecycle status of the monitor.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MonitoringStatus {
    #[default]
    Idle,
    Monitoring,
    Stopped,
}

/// Result of a state transition request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Started,
    AlreadyRunning,
    Stopped,
    /// `stop()` while not monitoring
    AlreadyStopped,
}

/// Status, start time and message counter.
#[derive(Debug, Clone, Default)]
pub struct MonitoringState {
    status: MonitoringStatus,
    started_at: Option<DateTime<Utc>>,
    total_messages_processed: u64,
}

impl MonitoringState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> MonitoringStatus {
        self.status
    }

    pub fn is_monitoring(&self) -> bool {
        self.status == MonitoringStatus::Monitoring
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn total_messages(&self) -> u64 {
        self.total_messages_processed
    }

    /// Enter `monitoring`, resetting counters. No-op when already monitoring.
    pub fn start(&mut self) -> Transition {
        if self.is_monitoring() {
            return Transition::AlreadyRunning;
        }
        self.status = MonitoringStatus::Monitoring;
        self.started_at = Some(Utc::now());
        self.total_messages_processed = 0;
        Transition::Started
    }

    /// Enter `stopped`. No-op unless currently monitoring.
    pub fn stop(&mut self) -> Transition {
        if !self.is_monitoring() {
            return Transition::AlreadyStopped;
        }
        self.status = MonitoringStatus::Stopped;
        Transition::Stopped
    }

    /// Undo a `start()` whose follow-up work failed, restoring the snapshot
    /// taken before it, counters included.
    pub(crate) fn revert_start(&mut self, previous: MonitoringState) {
        *self = previous;
    }

    /// Count one accepted message. Returns the new total.
    pub fn record_message(&mut self) -> u64 {
        self.total_messages_processed += 1;
        self.total_messages_processed
    }

    /// Time since the last transition into `monitoring`; zero otherwise.
    pub fn uptime(&self) -> Duration {
        match (self.is_monitoring(), self.started_at) {
            (true, Some(at)) => (Utc::now() - at).to_std().unwrap_or_default(),
            _ => Duration::ZERO,
        }
    }
}

/// Snapshot exposed to observers.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MonitoringStats {
    pub status: MonitoringStatus,
    pub total_chats: usize,
    /// Equal to `total_chats` while monitoring, zero otherwise
    pub active_chats: usize,
    pub total_messages: u64,
    pub uptime: Duration,
    /// Whether the adapter event handler is bound
    pub subscribed: bool,
}
