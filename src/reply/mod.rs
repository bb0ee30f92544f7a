//! Reply pipeline
//!
//! Turns an accepted message into a reply sent back to its chat:
//!
//! 1. If a generation backend is configured and its circuit is not open,
//!    ask it for a reply, bounded by the generation timeout.
//! 2. On timeout, failure, panic, empty output, an open circuit or no backend at
//!    all, build a templated reply with [`FallbackGenerator`].
//! 3. Send the reply through the adapter, tagged as a reply to the inbound
//!    message. A failed send is logged and abandoned.

pub mod circuit;
pub mod templates;

pub use circuit::{CircuitBreaker, CircuitState};
pub use templates::{FallbackGenerator, ReplyCategory};

use futures::FutureExt;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::bus::message::UNKNOWN_ID;
use crate::bus::Message;
use crate::channels::{send_with_timeout, ChatAdapter, SendReceipt};
use crate::config::ReplyConfig;
use crate::error::GenerationError;
use crate::providers::GenerationBackend;

/// Where the reply text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplySource {
    Generated,
    Fallback,
}

/// The reply produced for one inbound message.
#[derive(Debug, Clone)]
pub struct ReplyOutcome {
    pub text: String,
    pub source: ReplySource,
    /// Message the reply answers; `None` when the inbound id was unknown
    pub reply_to: Option<String>,
    /// `None` when sending failed
    pub receipt: Option<SendReceipt>,
}

impl ReplyOutcome {
    pub fn delivered(&self) -> bool {
        self.receipt.is_some()
    }
}

/// Primary generation with circuit breaker, timeout and templated fallback.
pub struct ReplyPipeline {
    backend: Option<Arc<dyn GenerationBackend>>,
    breaker: CircuitBreaker,
    fallback: FallbackGenerator,
    generation_timeout: Duration,
    send_timeout: Duration,
    context_messages: usize,
    enabled: AtomicBool,
}

impl ReplyPipeline {
    pub fn new(
        config: &ReplyConfig,
        send_timeout: Duration,
        backend: Option<Arc<dyn GenerationBackend>>,
    ) -> Self {
        Self {
            backend,
            breaker: CircuitBreaker::new(config.breaker_threshold, config.breaker_cooldown_secs),
            fallback: FallbackGenerator::new(),
            generation_timeout: Duration::from_secs(config.generation_timeout_secs),
            send_timeout,
            context_messages: config.context_messages,
            enabled: AtomicBool::new(config.enabled),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        let prev = self.enabled.swap(enabled, Ordering::Relaxed);
        if prev != enabled {
            info!(enabled, "Auto-reply switched");
        }
    }

    pub fn has_backend(&self) -> bool {
        self.backend.is_some()
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// How many recent messages of the chat are passed to the backend.
    pub fn context_messages(&self) -> usize {
        self.context_messages
    }

    async fn try_backend(
        &self,
        message: &Message,
        history: &[Arc<Message>],
    ) -> Result<String, GenerationError> {
        let backend = self.backend.as_ref().ok_or(GenerationError::Unavailable)?;
        if !self.breaker.allows_request() {
            return Err(GenerationError::Unavailable);
        }

        let call = AssertUnwindSafe(backend.generate(message, history)).catch_unwind();
        let result = match tokio::time::timeout(self.generation_timeout, call).await {
            Ok(Ok(Ok(text))) if text.trim().is_empty() => Err(GenerationError::EmptyResponse),
            Ok(Ok(result)) => result,
            Ok(Err(_)) => {
                error!(backend = backend.name(), "Generation backend panicked");
                Err(GenerationError::Unknown(format!(
                    "{} panicked during generation",
                    backend.name()
                )))
            }
            Err(_) => Err(GenerationError::Timeout(format!(
                "{} did not answer within {:?}",
                backend.name(),
                self.generation_timeout
            ))),
        };

        match &result {
            Ok(_) => self.breaker.record_success(),
            Err(e) if e.counts_as_backend_failure() => self.breaker.record_failure(),
            Err(_) => {}
        }
        result
    }

    /// Produce reply text without sending it. Never empty.
    pub async fn compose(&self, message: &Message, history: &[Arc<Message>]) -> (String, ReplySource) {
        match self.try_backend(message, history).await {
            Ok(text) => (text, ReplySource::Generated),
            Err(e) => {
                if matches!(e, GenerationError::Unavailable) {
                    debug!(message_id = %message.id, "No backend available, using fallback reply");
                } else {
                    warn!(
                        message_id = %message.id,
                        error = %e,
                        "Generation failed, using fallback reply"
                    );
                }
                let text = self
                    .fallback
                    .generate(&message.text, &message.from_display_name);
                (text, ReplySource::Fallback)
            }
        }
    }

    /// Compose a reply to `message` and send it to the message's chat.
    pub async fn respond(
        &self,
        adapter: &dyn ChatAdapter,
        message: &Message,
        history: &[Arc<Message>],
    ) -> ReplyOutcome {
        let (text, source) = self.compose(message, history).await;
        let reply_to = (message.id != UNKNOWN_ID).then(|| message.id.clone());

        let receipt = match send_with_timeout(
            adapter,
            self.send_timeout,
            &message.chat_id,
            &text,
            reply_to.as_deref(),
        )
        .await
        {
            Ok(receipt) => {
                info!(
                    chat_id = %message.chat_id,
                    reply_to = %message.id,
                    source = ?source,
                    "Reply sent"
                );
                Some(receipt)
            }
            Err(e) => {
                warn!(chat_id = %message.chat_id, error = %e, "Failed to send reply");
                None
            }
        };

        ReplyOutcome {
            text,
            source,
            reply_to,
            receipt,
        }
    }
}

impl std::fmt::Debug for ReplyPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplyPipeline")
            .field("backend", &self.backend.as_ref().map(|b| b.name().to_string()))
            .field("breaker", &self.breaker)
            .field("generation_timeout", &self.generation_timeout)
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, WatchError};
    use crate::providers::GenerationResult;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    struct ScriptedBackend {
        reply: std::result::Result<&'static str, fn() -> GenerationError>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl ScriptedBackend {
        fn ok(text: &'static str) -> Self {
            Self {
                reply: Ok(text),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                reply: Err(|| GenerationError::ServerError("boom".into())),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl GenerationBackend for ScriptedBackend {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, _: &Message, _: &[Arc<Message>]) -> GenerationResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            match &self.reply {
                Ok(text) => Ok(text.to_string()),
                Err(make) => Err(make()),
            }
        }
    }

    #[derive(Default)]
    struct RecordingAdapter {
        sent: Mutex<Vec<(String, String, Option<String>)>>,
        fail: bool,
    }

    #[async_trait]
    impl ChatAdapter for RecordingAdapter {
        fn name(&self) -> &str {
            "recording"
        }
        async fn connect(&self) -> Result<()> {
            Ok(())
        }
        async fn disconnect(&self) -> Result<()> {
            Ok(())
        }
        async fn send(&self, chat: &str, text: &str, reply_to: Option<&str>) -> Result<SendReceipt> {
            if self.fail {
                return Err(WatchError::Send("network down".into()));
            }
            self.sent.lock().unwrap().push((
                chat.to_string(),
                text.to_string(),
                reply_to.map(str::to_string),
            ));
            Ok(SendReceipt::now("900"))
        }
    }

    fn pipeline(backend: Option<Arc<dyn GenerationBackend>>) -> ReplyPipeline {
        let mut config = ReplyConfig::default();
        config.generation_timeout_secs = 1;
        ReplyPipeline::new(&config, Duration::from_secs(1), backend)
    }

    fn inbound(text: &str) -> Message {
        let mut m = Message::new("42", "g1", text);
        m.from_display_name = "Ada".into();
        m
    }

    #[tokio::test]
    async fn test_generated_reply_is_sent_as_reply() {
        let backend = Arc::new(ScriptedBackend::ok("Sure thing"));
        let p = pipeline(Some(backend.clone()));
        let adapter = RecordingAdapter::default();

        let outcome = p.respond(&adapter, &inbound("can you help?"), &[]).await;
        assert_eq!(outcome.source, ReplySource::Generated);
        assert_eq!(outcome.text, "Sure thing");
        assert!(outcome.delivered());

        let sent = adapter.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0], ("g1".into(), "Sure thing".into(), Some("42".into())));
    }

    #[tokio::test]
    async fn test_no_backend_uses_fallback() {
        let p = pipeline(None);
        let (text, source) = p.compose(&inbound("спасибо"), &[]).await;
        assert_eq!(source, ReplySource::Fallback);
        assert!(text.contains("Ada"));
        assert_eq!(p.breaker().consecutive_failures(), 0);
    }

    #[tokio::test]
    async fn test_failing_backend_falls_back_and_trips_breaker() {
        let backend = Arc::new(ScriptedBackend::failing());
        let p = pipeline(Some(backend.clone()));

        for _ in 0..5 {
            let (text, source) = p.compose(&inbound("hello"), &[]).await;
            assert_eq!(source, ReplySource::Fallback);
            assert!(!text.is_empty());
        }
        // Three failures open the circuit; later calls skip the backend
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
        assert_eq!(p.breaker().state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn test_slow_backend_times_out() {
        let backend = Arc::new(ScriptedBackend {
            delay: Duration::from_secs(5),
            ..ScriptedBackend::ok("too late")
        });
        let p = pipeline(Some(backend));
        let (text, source) = p.compose(&inbound("hi"), &[]).await;
        assert_eq!(source, ReplySource::Fallback);
        assert_ne!(text, "too late");
        assert_eq!(p.breaker().consecutive_failures(), 1);
    }

    struct PanickingBackend;

    #[async_trait]
    impl GenerationBackend for PanickingBackend {
        fn name(&self) -> &str {
            "panicking"
        }

        async fn generate(&self, _: &Message, _: &[Arc<Message>]) -> GenerationResult<String> {
            panic!("backend exploded");
        }
    }

    #[tokio::test]
    async fn test_panicking_backend_falls_back_and_counts_failure() {
        let p = pipeline(Some(Arc::new(PanickingBackend)));
        let adapter = RecordingAdapter::default();

        let outcome = p.respond(&adapter, &inbound("hello"), &[]).await;
        assert_eq!(outcome.source, ReplySource::Fallback);
        assert!(outcome.delivered());
        assert_eq!(p.breaker().consecutive_failures(), 1);
        assert_eq!(adapter.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_blank_generation_falls_back() {
        let p = pipeline(Some(Arc::new(ScriptedBackend::ok("   "))));
        let (_, source) = p.compose(&inbound("hi"), &[]).await;
        assert_eq!(source, ReplySource::Fallback);
    }

    #[tokio::test]
    async fn test_send_failure_is_not_retried() {
        let p = pipeline(None);
        let adapter = RecordingAdapter {
            fail: true,
            ..Default::default()
        };
        let outcome = p.respond(&adapter, &inbound("hi"), &[]).await;
        assert!(!outcome.delivered());
        assert!(!outcome.text.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_message_id_sends_without_reply_tag() {
        let p = pipeline(None);
        let adapter = RecordingAdapter::default();
        let mut msg = inbound("hi");
        msg.id = UNKNOWN_ID.to_string();
        let outcome = p.respond(&adapter, &msg, &[]).await;
        assert!(outcome.reply_to.is_none());
        assert_eq!(adapter.sent.lock().unwrap()[0].2, None);
    }

    #[test]
    fn test_enable_switch() {
        let p = pipeline(None);
        assert!(p.is_enabled());
        p.set_enabled(false);
        assert!(!p.is_enabled());
    }
}
