//! Subscribe-once guard for the adapter event stream.

use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::channels::{ChatAdapter, EventHandler};
use crate::error::Result;

/// What [`SubscriptionGuard::ensure_subscribed`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardOutcome {
    /// The handler was bound by this call
    Bound,
    /// A handler was already bound; nothing happened
    AlreadyBound,
}

/// Ensures the adapter receives at most one handler for the guard's lifetime.
///
/// Check-and-bind runs under an async mutex so concurrent initialization
/// cannot double-subscribe. A failed bind leaves the guard unset.
#[derive(Debug, Default)]
pub struct SubscriptionGuard {
    bind_lock: Mutex<()>,
    bound: AtomicBool,
}

impl SubscriptionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn ensure_subscribed(
        &self,
        adapter: &dyn ChatAdapter,
        handler: EventHandler,
    ) -> Result<GuardOutcome> {
        if self.is_bound() {
            debug!(adapter = adapter.name(), "Handler already bound, skipping duplicate subscribe");
            return Ok(GuardOutcome::AlreadyBound);
        }

        let _lock = self.bind_lock.lock().await;
        if self.is_bound() {
            debug!(adapter = adapter.name(), "Handler already bound, skipping duplicate subscribe");
            return Ok(GuardOutcome::AlreadyBound);
        }

        adapter.subscribe(handler).await?;
        self.bound.store(true, Ordering::Release);
        info!(adapter = adapter.name(), "Event handler bound");
        Ok(GuardOutcome::Bound)
    }

    pub fn is_bound(&self) -> bool {
        self.bound.load(Ordering::Acquire)
    }

    /// Forget the binding, e.g. after the adapter session was torn down.
    pub async fn reset(&self) {
        let _lock = self.bind_lock.lock().await;
        self.bound.store(false, Ordering::Release);
    }
}
