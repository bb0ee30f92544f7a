//! Circuit breaker guarding the generation backend.

use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

/// Breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Backend is tried for every reply.
    Closed,
    /// Backend is skipped; replies come from the fallback generator.
    Open,
    /// Cooldown elapsed; the next call is let through as a trial.
    HalfOpen,
}

/// Lock-free consecutive-failure breaker.
///
/// After `failure_threshold` consecutive failures the circuit opens for
/// `cooldown_secs`. Once the cooldown has elapsed one trial call is let through;
/// success closes the circuit, failure reopens it.
pub struct CircuitBreaker {
    failure_count: AtomicU32,
    /// Epoch seconds of the most recent failure
    last_failure_epoch: AtomicU64,
    failure_threshold: u32,
    cooldown_secs: u64,
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, cooldown_secs: u64) -> Self {
        Self {
            failure_count: AtomicU32::new(0),
            last_failure_epoch: AtomicU64::new(0),
            failure_threshold: failure_threshold.max(1),
            cooldown_secs,
        }
    }

    pub fn state(&self) -> CircuitState {
        let failures = self.failure_count.load(Ordering::Relaxed);
        if failures < self.failure_threshold {
            return CircuitState::Closed;
        }

        let last_failure = self.last_failure_epoch.load(Ordering::Relaxed);
        if epoch_secs().saturating_sub(last_failure) >= self.cooldown_secs {
            CircuitState::HalfOpen
        } else {
            CircuitState::Open
        }
    }

    /// Whether the backend should be called right now.
    pub fn allows_request(&self) -> bool {
        self.state() != CircuitState::Open
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.failure_count.load(Ordering::Relaxed)
    }

    pub fn record_success(&self) {
        let prev = self.failure_count.swap(0, Ordering::Relaxed);
        if prev >= self.failure_threshold {
            info!(
                previous_failures = prev,
                "Circuit breaker closed: generation backend recovered"
            );
        }
    }

    pub fn record_failure(&self) {
        let prev = self.failure_count.fetch_add(1, Ordering::Relaxed);
        self.last_failure_epoch.store(epoch_secs(), Ordering::Relaxed);

        if prev + 1 == self.failure_threshold {
            info!(
                threshold = self.failure_threshold,
                cooldown_secs = self.cooldown_secs,
                "Circuit breaker opened: using fallback replies"
            );
        }
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("state", &self.state())
            .field("failure_count", &self.consecutive_failures())
            .field("failure_threshold", &self.failure_threshold)
            .field("cooldown_secs", &self.cooldown_secs)
            .finish()
    }
}
