//! Fan-out Bus Module
//!
//! Delivers every accepted [`Message`] to a set of independent consumers.
//!
//! # Architecture
//!
//! ```text
//!                       ┌──── queue ───> worker ───> LiveFeed
//! ┌───────────┐ publish │
//! │ Processor │────────>├──── queue ───> worker ───> AutoForward
//! └───────────┘         │
//!                       └──── queue ───> worker ───> ad-hoc listener
//! ```
//!
//! Each consumer owns a bounded queue drained by its own task. `publish`
//! never awaits a consumer: a full queue drops that one delivery and logs it.
//! Errors and panics inside a consumer are caught by its worker and never
//! reach the publisher or the other consumers.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use groupwatch::bus::{consumer_fn, FanoutBus, Message};
//!
//! # tokio_test::block_on(async {
//! let bus = FanoutBus::new();
//! let id = bus
//!     .add_listener(consumer_fn("printer", |msg| {
//!         println!("{}: {}", msg.chat_title, msg.text);
//!         Ok(())
//!     }))
//!     .await;
//!
//! let delivered = bus.publish(Arc::new(Message::new("1", "chat", "hello"))).await;
//! assert_eq!(delivered, 1);
//! assert!(bus.remove_listener(id).await);
//! # });
//! ```

pub mod feed;
pub mod message;

pub use feed::{AutoForward, Distributor, FeedCallback, FeedCallbackId, LiveFeed};
pub use message::{MediaKind, Message, RawEvent, RawMedia};

use async_trait::async_trait;
use futures::FutureExt;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::error::Result;

/// Default per-consumer queue depth
pub const DEFAULT_QUEUE_SIZE: usize = 256;

/// A sink for accepted messages.
#[async_trait]
pub trait Consumer: Send + Sync {
    /// Name used in logs when this consumer fails.
    fn name(&self) -> &str;

    /// Handle one message. Errors are logged by the bus and otherwise ignored.
    async fn consume(&self, message: Arc<Message>) -> Result<()>;
}

/// Handle returned by [`FanoutBus::add_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// Consumer built from a synchronous closure.
pub struct FnConsumer<F> {
    name: String,
    f: F,
}

#[async_trait]
impl<F> Consumer for FnConsumer<F>
where
    F: Fn(Arc<Message>) -> Result<()> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn consume(&self, message: Arc<Message>) -> Result<()> {
        (self.f)(message)
    }
}

/// Wrap a closure as a named [`Consumer`].
pub fn consumer_fn<F>(name: &str, f: F) -> Arc<dyn Consumer>
where
    F: Fn(Arc<Message>) -> Result<()> + Send + Sync + 'static,
{
    Arc::new(FnConsumer {
        name: name.to_string(),
        f,
    })
}

struct Registration {
    id: ListenerId,
    name: String,
    tx: mpsc::Sender<Arc<Message>>,
    worker: JoinHandle<()>,
}

/// Fan-out bus with one bounded queue and worker per consumer.
pub struct FanoutBus {
    registrations: RwLock<Vec<Registration>>,
    next_id: AtomicU64,
    queue_size: usize,
    dropped: AtomicU64,
}

impl FanoutBus {
    /// Creates a bus with the default queue depth.
    pub fn new() -> Self {
        Self::with_queue_size(DEFAULT_QUEUE_SIZE)
    }

    /// Creates a bus whose consumers each buffer up to `queue_size` messages.
    pub fn with_queue_size(queue_size: usize) -> Self {
        Self {
            registrations: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            queue_size: queue_size.max(1),
            dropped: AtomicU64::new(0),
        }
    }

    /// Register a consumer and spawn its worker.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn add_listener(&self, consumer: Arc<dyn Consumer>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let name = consumer.name().to_string();
        let (tx, rx) = mpsc::channel(self.queue_size);
        let worker = tokio::spawn(run_worker(name.clone(), consumer, rx));

        debug!(consumer = %name, listener = %id, "Consumer registered");
        self.registrations.write().await.push(Registration {
            id,
            name,
            tx,
            worker,
        });
        id
    }

    /// Unregister a consumer. Messages already queued for it are still
    /// delivered. Returns `false` if the id is unknown.
    pub async fn remove_listener(&self, id: ListenerId) -> bool {
        let mut regs = self.registrations.write().await;
        match regs.iter().position(|r| r.id == id) {
            Some(pos) => {
                let reg = regs.remove(pos);
                debug!(consumer = %reg.name, listener = %id, "Consumer removed");
                true
            }
            None => false,
        }
    }

    /// Queue `message` for every consumer without waiting on any of them.
    ///
    /// Returns how many consumers accepted the delivery.
    pub async fn publish(&self, message: Arc<Message>) -> usize {
        let regs = self.registrations.read().await;
        let mut delivered = 0;
        for reg in regs.iter() {
            match reg.tx.try_send(Arc::clone(&message)) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        consumer = %reg.name,
                        message_id = %message.id,
                        "Consumer queue full, dropping delivery"
                    );
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    warn!(consumer = %reg.name, "Consumer worker gone, dropping delivery");
                }
            }
        }
        delivered
    }

    /// Number of registered consumers.
    pub async fn listener_count(&self) -> usize {
        self.registrations.read().await.len()
    }

    /// Total deliveries dropped because a queue was full or closed.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Unregister every consumer and wait until their queues are drained.
    pub async fn close(&self) {
        let regs: Vec<Registration> = self.registrations.write().await.drain(..).collect();
        for reg in regs {
            drop(reg.tx);
            if let Err(e) = reg.worker.await {
                error!(consumer = %reg.name, error = %e, "Consumer worker aborted");
            }
        }
    }
}

impl Default for FanoutBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FanoutBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FanoutBus")
            .field("queue_size", &self.queue_size)
            .field("dropped", &self.dropped_count())
            .finish()
    }
}

async fn run_worker(
    name: String,
    consumer: Arc<dyn Consumer>,
    mut rx: mpsc::Receiver<Arc<Message>>,
) {
    while let Some(message) = rx.recv().await {
        let outcome = AssertUnwindSafe(consumer.consume(Arc::clone(&message)))
            .catch_unwind()
            .await;
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(consumer = %name, message_id = %message.id, error = %e, "Consumer failed");
            }
            Err(_) => {
                error!(consumer = %name, message_id = %message.id, "Consumer panicked");
            }
        }
    }
    debug!(consumer = %name, "Consumer worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WatchError;
    use std::sync::atomic::AtomicUsize;

    fn counting(name: &str, counter: Arc<AtomicUsize>) -> Arc<dyn Consumer> {
        consumer_fn(name, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    fn msg(i: usize) -> Arc<Message> {
        Arc::new(Message::new(&i.to_string(), "chat", "text"))
    }

    #[tokio::test]
    async fn test_publish_reaches_every_consumer() {
        let bus = FanoutBus::new();
        let a = Arc::new(AtomicUsize::new(0));
        let b = Arc::new(AtomicUsize::new(0));
        bus.add_listener(counting("a", a.clone())).await;
        bus.add_listener(counting("b", b.clone())).await;

        assert_eq!(bus.publish(msg(1)).await, 2);
        bus.close().await;

        assert_eq!(a.load(Ordering::SeqCst), 1);
        assert_eq!(b.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_publish_without_consumers() {
        let bus = FanoutBus::new();
        assert_eq!(bus.publish(msg(1)).await, 0);
        assert_eq!(bus.dropped_count(), 0);
    }

    #[tokio::test]
    async fn test_failing_consumer_does_not_affect_others() {
        let bus = FanoutBus::with_queue_size(128);
        let b = Arc::new(AtomicUsize::new(0));
        let c = Arc::new(AtomicUsize::new(0));
        bus.add_listener(consumer_fn("broken", |_| {
            Err(WatchError::Send("always fails".into()))
        }))
        .await;
        bus.add_listener(counting("b", b.clone())).await;
        bus.add_listener(counting("c", c.clone())).await;

        for i in 0..100 {
            bus.publish(msg(i)).await;
        }
        bus.close().await;

        assert_eq!(b.load(Ordering::SeqCst), 100);
        assert_eq!(c.load(Ordering::SeqCst), 100);
    }

    #[tokio::test]
    async fn test_panicking_consumer_is_isolated() {
        let bus = FanoutBus::with_queue_size(16);
        let ok = Arc::new(AtomicUsize::new(0));
        bus.add_listener(consumer_fn("panics", |_| panic!("consumer bug")))
            .await;
        bus.add_listener(counting("ok", ok.clone())).await;

        for i in 0..5 {
            bus.publish(msg(i)).await;
        }
        bus.close().await;

        assert_eq!(ok.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_full_queue_drops_only_for_that_consumer() {
        let bus = FanoutBus::with_queue_size(1);
        let gate = Arc::new(tokio::sync::Notify::new());
        let slow_seen = Arc::new(AtomicUsize::new(0));

        struct Slow {
            gate: Arc<tokio::sync::Notify>,
            seen: Arc<AtomicUsize>,
        }

        #[async_trait]
        impl Consumer for Slow {
            fn name(&self) -> &str {
                "slow"
            }
            async fn consume(&self, _message: Arc<Message>) -> Result<()> {
                self.gate.notified().await;
                self.seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }

        bus.add_listener(Arc::new(Slow {
            gate: gate.clone(),
            seen: slow_seen.clone(),
        }))
        .await;

        // first message is taken by the worker and blocks on the gate,
        // second fills the queue, the rest are dropped
        bus.publish(msg(0)).await;
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        bus.publish(msg(1)).await;
        let delivered = bus.publish(msg(2)).await;

        assert_eq!(delivered, 0);
        assert_eq!(bus.dropped_count(), 1);

        gate.notify_one();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        gate.notify_one();
        bus.close().await;
        assert_eq!(slow_seen.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_remove_listener() {
        let bus = FanoutBus::new();
        let a = Arc::new(AtomicUsize::new(0));
        let id = bus.add_listener(counting("a", a.clone())).await;
        assert_eq!(bus.listener_count().await, 1);

        assert!(bus.remove_listener(id).await);
        assert!(!bus.remove_listener(id).await);
        assert_eq!(bus.listener_count().await, 0);
        assert_eq!(bus.publish(msg(1)).await, 0);
    }

    #[tokio::test]
    async fn test_listener_ids_are_unique() {
        let bus = FanoutBus::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let a = bus.add_listener(counting("a", counter.clone())).await;
        let b = bus.add_listener(counting("b", counter)).await;
        assert_ne!(a, b);
        assert!(a.to_string().starts_with("listener-"));
    }
}
