//! The monitoring service.
//!
//! Owns every piece of the pipeline and is shared as `Arc<MonitorService>`.
//! The adapter's event handler holds only a weak reference, so dropping the
//! last strong handle lets the service go even while the adapter keeps the
//! handler around.
//!
//! Per accepted message the order is fixed: history push, fan-out publish,
//! trigger detection, reply pipeline.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use super::alert_log::AlertLog;
use super::guard::{GuardOutcome, SubscriptionGuard};
use super::history::HistoryBuffer;
use super::registry::{ChatKind, ChatRegistry, MonitoredChat};
use super::state::{MonitoringState, MonitoringStats, MonitoringStatus, Transition};
use super::trigger::{TriggerAlert, TriggerDetector};
use crate::bus::{
    AutoForward, Consumer, Distributor, FanoutBus, FeedCallback, FeedCallbackId, ListenerId,
    LiveFeed, Message, RawEvent,
};
use crate::channels::{send_with_timeout, ChatAdapter, Dialog, EventHandler, GroupInfo, SendReceipt};
use crate::config::Config;
use crate::error::{Result, WatchError};
use crate::providers::GenerationBackend;
use crate::reply::{ReplyOutcome, ReplyPipeline};

/// Dialogs requested by [`MonitorService::all_groups`].
pub const ALL_GROUPS_DIALOG_LIMIT: usize = 100;

/// Dialog name the adapter reports for chats it cannot resolve.
const UNRESOLVED_DIALOG_NAME: &str = "Unknown";

/// What happened to one inbound event.
#[derive(Debug, Clone)]
pub enum ProcessOutcome {
    /// Monitoring is not active
    Ignored,
    /// The chat is not eligible for processing
    Filtered { chat_id: String },
    Accepted {
        message: Arc<Message>,
        alert: Option<TriggerAlert>,
        /// `None` when auto-reply is switched off
        reply: Option<ReplyOutcome>,
    },
    /// Processing panicked; the panic was caught and logged
    Failed,
}

impl ProcessOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ProcessOutcome::Accepted { .. })
    }
}

/// Real-time chat monitoring pipeline.
pub struct MonitorService {
    adapter: Arc<dyn ChatAdapter>,
    registry: ChatRegistry,
    state: RwLock<MonitoringState>,
    history: RwLock<HistoryBuffer>,
    guard: SubscriptionGuard,
    bus: FanoutBus,
    live_feed: Arc<LiveFeed>,
    auto_forward: Arc<AutoForward>,
    detector: TriggerDetector,
    alert_log: AlertLog,
    notify_chat_id: Option<String>,
    replies: ReplyPipeline,
    allowed_chat_id: Option<String>,
    send_timeout: Duration,
}

impl MonitorService {
    /// Build the service, register configured chats and the built-in
    /// consumers. Must be called from within a Tokio runtime.
    pub async fn new(
        config: &Config,
        adapter: Arc<dyn ChatAdapter>,
        backend: Option<Arc<dyn GenerationBackend>>,
    ) -> Result<Arc<Self>> {
        let send_timeout = Duration::from_secs(config.monitor.send_timeout_secs.max(1));
        let service = Arc::new(Self {
            adapter,
            registry: ChatRegistry::new(),
            state: RwLock::new(MonitoringState::new()),
            history: RwLock::new(HistoryBuffer::new(config.monitor.history_capacity)),
            guard: SubscriptionGuard::new(),
            bus: FanoutBus::with_queue_size(config.monitor.consumer_queue_size),
            live_feed: Arc::new(LiveFeed::new()),
            auto_forward: Arc::new(AutoForward::new()),
            detector: TriggerDetector::new(config.triggers.phrases.as_slice())?,
            alert_log: AlertLog::new(&config.triggers.alert_log_path),
            notify_chat_id: non_blank(config.triggers.notify_chat_id.as_deref()),
            replies: ReplyPipeline::new(&config.replies, send_timeout, backend),
            allowed_chat_id: non_blank(config.monitor.allowed_chat_id.as_deref()),
            send_timeout,
        });

        for entry in &config.monitor.chats {
            service
                .add_chat(&entry.id, entry.title.as_deref(), entry.kind)
                .await;
        }

        service
            .bus
            .add_listener(Arc::clone(&service.live_feed) as Arc<dyn Consumer>)
            .await;
        service
            .bus
            .add_listener(Arc::clone(&service.auto_forward) as Arc<dyn Consumer>)
            .await;

        if let Some(target) = non_blank(config.feed.forward_chat_id.as_deref()) {
            service.forward_to(&target).await;
        }

        info!(
            adapter = service.adapter.name(),
            chats = config.monitor.chats.len(),
            allowed_chat_id = ?service.allowed_chat_id,
            triggers = service.detector.phrases().len(),
            backend = service.replies.has_backend(),
            "Monitor service created"
        );
        Ok(service)
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Enter `monitoring` and make sure the adapter handler is bound.
    ///
    /// An adapter without subscription support leaves the service running in
    /// degraded mode. Any other bind failure undoes the transition and is
    /// returned, so `start()` can be retried.
    pub async fn start(self: &Arc<Self>) -> Result<Transition> {
        let previous = {
            let mut state = self.state.write().await;
            let previous = state.clone();
            if state.start() == Transition::AlreadyRunning {
                info!("Monitoring already running");
                return Ok(Transition::AlreadyRunning);
            }
            previous
        };

        match self
            .guard
            .ensure_subscribed(self.adapter.as_ref(), self.event_handler())
            .await
        {
            Ok(GuardOutcome::Bound) | Ok(GuardOutcome::AlreadyBound) => {}
            Err(WatchError::CapabilityUnsupported(what)) => {
                warn!(
                    adapter = self.adapter.name(),
                    capability = what,
                    "Adapter cannot deliver events; running without live monitoring"
                );
            }
            Err(e) => {
                self.state.write().await.revert_start(previous);
                error!(adapter = self.adapter.name(), error = %e, "Failed to bind event handler");
                return Err(e);
            }
        }

        info!(chats = self.registry.len().await, "Monitoring started");
        Ok(Transition::Started)
    }

    /// Leave `monitoring`. The handler stays bound; later events are dropped.
    pub async fn stop(&self) -> Transition {
        let transition = self.state.write().await.stop();
        match transition {
            Transition::Stopped => info!("Monitoring stopped"),
            _ => debug!("Stop requested while not monitoring"),
        }
        transition
    }

    /// Connect the adapter, then start monitoring.
    ///
    /// A connect failure is logged; the service still starts so that
    /// registration and stats keep working.
    pub async fn connect_and_start(self: &Arc<Self>) -> Result<Transition> {
        if let Err(e) = self.adapter.connect().await {
            warn!(adapter = self.adapter.name(), error = %e, "Adapter connect failed");
        }
        self.start().await
    }

    /// Stop monitoring, disconnect the adapter and forget the subscription.
    pub async fn shutdown(&self) {
        self.stop().await;
        if let Err(e) = self.adapter.disconnect().await {
            warn!(adapter = self.adapter.name(), error = %e, "Adapter disconnect failed");
        }
        self.guard.reset().await;
        info!("Monitor service shut down");
    }

    /// [`shutdown`](Self::shutdown), then unregister every consumer and wait
    /// for their queues to drain.
    pub async fn close(&self) {
        self.shutdown().await;
        self.bus.close().await;
    }

    fn event_handler(self: &Arc<Self>) -> EventHandler {
        let weak: Weak<Self> = Arc::downgrade(self);
        Arc::new(move |event: RawEvent| {
            let weak = weak.clone();
            async move {
                if let Some(service) = weak.upgrade() {
                    service.handle_event(event).await;
                }
            }
            .boxed()
        })
    }

    // ------------------------------------------------------------------------
    // Processing
    // ------------------------------------------------------------------------

    /// Process one inbound event. Never panics.
    pub async fn handle_event(&self, event: RawEvent) -> ProcessOutcome {
        match AssertUnwindSafe(self.process(event)).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(_) => {
                error!("Message processing panicked");
                ProcessOutcome::Failed
            }
        }
    }

    async fn process(&self, event: RawEvent) -> ProcessOutcome {
        let message = Arc::new(Message::from_event(event));

        if !self.state.read().await.is_monitoring() {
            return ProcessOutcome::Ignored;
        }

        if !self.should_process(&message).await {
            return ProcessOutcome::Filtered {
                chat_id: message.chat_id.clone(),
            };
        }

        let total = self.state.write().await.record_message();
        // Reply context is the chat's earlier messages, taken under the same lock as the push
        let context = {
            let mut history = self.history.write().await;
            let context =
                history.recent_for_chat(&message.chat_id, self.replies.context_messages());
            history.push(Arc::clone(&message));
            context
        };
        let delivered = self.bus.publish(Arc::clone(&message)).await;
        debug!(
            chat_id = %message.chat_id,
            message_id = %message.id,
            total,
            delivered,
            "Message accepted"
        );

        let alert = self.detector.check(&message);
        if let Some(alert) = &alert {
            self.raise_alert(alert).await;
        }

        let reply = if self.replies.is_enabled() {
            Some(
                self.replies
                    .respond(self.adapter.as_ref(), &message, &context)
                    .await,
            )
        } else {
            None
        };

        ProcessOutcome::Accepted {
            message,
            alert,
            reply,
        }
    }

    async fn should_process(&self, message: &Message) -> bool {
        if let Some(allowed) = &self.allowed_chat_id {
            if &message.chat_id != allowed {
                info!(
                    chat_id = %message.chat_id,
                    chat_title = %message.chat_title,
                    allowed = %allowed,
                    "Ignoring message from chat outside the allow-list"
                );
                return false;
            }
            return true;
        }

        let eligible = self
            .registry
            .contains(&message.chat_id, &message.chat_title)
            .await;
        if !eligible {
            debug!(chat_id = %message.chat_id, "Chat not monitored");
        }
        eligible
    }

    async fn raise_alert(&self, alert: &TriggerAlert) {
        warn!(
            chat_id = %alert.message.chat_id,
            phrases = %alert.matched_phrases.join(", "),
            "Trigger phrase detected"
        );

        if let Err(e) = self.alert_log.append(alert).await {
            error!(path = %self.alert_log.path().display(), error = %e, "Failed to write alert log");
        }

        if let Some(target) = &self.notify_chat_id {
            let text = alert.format_notification();
            if let Err(e) =
                send_with_timeout(self.adapter.as_ref(), self.send_timeout, target, &text, None)
                    .await
            {
                warn!(chat_id = %target, error = %e, "Failed to deliver trigger notification");
            }
        }
    }

    // ------------------------------------------------------------------------
    // Registry and observability
    // ------------------------------------------------------------------------

    /// Register a chat. Without a title the id doubles as display title.
    /// Returns `false` if the id was already registered.
    pub async fn add_chat(&self, id: &str, title: Option<&str>, kind: ChatKind) -> bool {
        let display_title = title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(id)
            .to_string();
        let added = self
            .registry
            .add(MonitoredChat {
                id: id.to_string(),
                display_title,
                kind,
            })
            .await;
        info!(chat_id = %id, added, "Chat added to monitoring");
        added
    }

    pub async fn remove_chat(&self, id: &str) -> bool {
        let removed = self.registry.remove(id).await;
        info!(chat_id = %id, removed, "Chat removed from monitoring");
        removed
    }

    pub async fn monitored_chats(&self) -> Vec<MonitoredChat> {
        self.registry.list().await
    }

    pub async fn status(&self) -> MonitoringStatus {
        self.state.read().await.status()
    }

    pub async fn is_monitoring(&self) -> bool {
        self.state.read().await.is_monitoring()
    }

    pub async fn stats(&self) -> MonitoringStats {
        let total_chats = self.registry.len().await;
        let state = self.state.read().await;
        MonitoringStats {
            status: state.status(),
            total_chats,
            active_chats: if state.is_monitoring() { total_chats } else { 0 },
            total_messages: state.total_messages(),
            uptime: state.uptime(),
            subscribed: self.guard.is_bound(),
        }
    }

    /// Up to `n` most recent accepted messages, newest first.
    pub async fn recent_messages(&self, n: usize) -> Vec<Arc<Message>> {
        self.history.read().await.recent(n)
    }

    // ------------------------------------------------------------------------
    // Consumers
    // ------------------------------------------------------------------------

    pub async fn add_listener(&self, consumer: Arc<dyn Consumer>) -> ListenerId {
        self.bus.add_listener(consumer).await
    }

    pub async fn remove_listener(&self, id: ListenerId) -> bool {
        self.bus.remove_listener(id).await
    }

    pub async fn add_feed_callback(&self, callback: FeedCallback) -> FeedCallbackId {
        self.live_feed.add_callback(callback).await
    }

    pub async fn remove_feed_callback(&self, id: FeedCallbackId) -> bool {
        self.live_feed.remove_callback(id).await
    }

    pub async fn set_distributor(&self, distributor: Distributor) {
        self.auto_forward.set_distributor(distributor).await;
    }

    pub async fn clear_distributor(&self) {
        self.auto_forward.clear_distributor().await;
    }

    pub async fn has_distributor(&self) -> bool {
        self.auto_forward.has_distributor().await
    }

    /// Install a distributor that forwards every accepted message to
    /// `chat_id` through the adapter.
    pub async fn forward_to(&self, chat_id: &str) {
        let adapter = Arc::clone(&self.adapter);
        let target = chat_id.to_string();
        let timeout = self.send_timeout;
        let distributor: Distributor = Arc::new(move |text: String| {
            let adapter = Arc::clone(&adapter);
            let target = target.clone();
            async move {
                send_with_timeout(adapter.as_ref(), timeout, &target, &text, None)
                    .await
                    .map(|_| ())
            }
            .boxed()
        });
        self.set_distributor(distributor).await;
        info!(chat_id = %chat_id, "Auto-forwarding enabled");
    }

    // ------------------------------------------------------------------------
    // Outbound and adapter passthrough
    // ------------------------------------------------------------------------

    /// Send a message through the adapter.
    ///
    /// With an `allowed_chat_id` override configured, any other target is
    /// refused before the adapter is touched.
    pub async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        reply_to: Option<&str>,
    ) -> Result<SendReceipt> {
        if let Some(allowed) = &self.allowed_chat_id {
            if chat_id != allowed {
                warn!(chat_id = %chat_id, allowed = %allowed, "Refusing to send outside the allow-list");
                return Err(WatchError::Send(format!(
                    "chat {} is not allowed; only {} is permitted",
                    chat_id, allowed
                )));
            }
        }
        send_with_timeout(self.adapter.as_ref(), self.send_timeout, chat_id, text, reply_to).await
    }

    /// Chat history straight from the adapter, newest first.
    pub async fn history(&self, chat_id: &str, limit: usize) -> Result<Vec<Message>> {
        self.adapter.fetch_history(chat_id, limit).await
    }

    pub async fn dialogs(&self, limit: usize) -> Result<Vec<Dialog>> {
        self.adapter.fetch_dialogs(limit).await
    }

    /// Every dialog the account sees, flagged with its monitoring status.
    /// Adapter failures yield an empty list.
    pub async fn all_groups(&self) -> Vec<GroupInfo> {
        let dialogs = match self.adapter.fetch_dialogs(ALL_GROUPS_DIALOG_LIMIT).await {
            Ok(d) => d,
            Err(e) => {
                warn!(adapter = self.adapter.name(), error = %e, "Failed to list dialogs");
                return Vec::new();
            }
        };

        let mut groups = Vec::with_capacity(dialogs.len());
        for dialog in dialogs {
            if dialog.name == UNRESOLVED_DIALOG_NAME {
                continue;
            }
            let is_monitored = self.registry.contains(&dialog.id, &dialog.name).await;
            groups.push(GroupInfo {
                id: dialog.id,
                name: dialog.name,
                kind: dialog.kind,
                is_monitored,
            });
        }
        groups
    }

    pub fn set_auto_reply(&self, enabled: bool) {
        self.replies.set_enabled(enabled);
    }

    pub fn auto_reply_enabled(&self) -> bool {
        self.replies.is_enabled()
    }

    pub fn replies(&self) -> &ReplyPipeline {
        &self.replies
    }

    pub fn alert_log(&self) -> &AlertLog {
        &self.alert_log
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
