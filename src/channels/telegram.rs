//! Telegram Bot API adapter
//!
//! Implements [`ChatAdapter`] on top of teloxide. Incoming updates are
//! converted into [`RawEvent`]s and handed to the bound [`EventHandler`].
//!
//! ```text
//! ┌──────────────────┐         ┌──────────────────┐
//! │   Telegram API   │ <────── │ TelegramAdapter  │
//! │                  │ ──────> │   (teloxide)     │
//! └──────────────────┘         └────────┬─────────┘
//!                                       │ RawEvent
//!                                       ▼
//!                              ┌──────────────────┐
//!                              │  MonitorService  │
//!                              └──────────────────┘
//! ```
//!
//! The Bot API cannot list dialogs or read chat history, so those
//! capabilities keep their unsupported defaults.

use async_trait::async_trait;
use futures::FutureExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, error, info, warn};

use super::{ChatAdapter, EventHandler, SendReceipt};
use crate::bus::{RawEvent, RawMedia};
use crate::config::TelegramConfig;
use crate::error::{Result, WatchError};

/// Base delay (in seconds) for exponential backoff on startup retries.
const BASE_RETRY_DELAY_SECS: u64 = 2;
/// Maximum delay (in seconds) for exponential backoff on startup retries.
const MAX_RETRY_DELAY_SECS: u64 = 120;

type HandlerSlot = Arc<RwLock<Option<EventHandler>>>;

/// Telegram adapter using long polling.
pub struct TelegramAdapter {
    config: TelegramConfig,
    /// Set while a polling task is alive
    connected: Arc<AtomicBool>,
    /// Cached bot for sends (avoids rebuilding the HTTP client)
    bot: RwLock<Option<teloxide::Bot>>,
    handler: HandlerSlot,
    shutdown_tx: Mutex<Option<mpsc::Sender<()>>>,
}

impl TelegramAdapter {
    pub fn new(config: TelegramConfig) -> Self {
        Self {
            config,
            connected: Arc::new(AtomicBool::new(false)),
            bot: RwLock::new(None),
            handler: Arc::new(RwLock::new(None)),
            shutdown_tx: Mutex::new(None),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Exponential backoff delay for a startup retry attempt.
    fn startup_backoff_delay(attempt: u32) -> Duration {
        let delay_secs = BASE_RETRY_DELAY_SECS
            .saturating_mul(2u64.saturating_pow(attempt))
            .min(MAX_RETRY_DELAY_SECS);
        Duration::from_secs(delay_secs)
    }

    /// Build a bot client with system proxy detection disabled.
    fn build_bot(token: &str) -> Result<teloxide::Bot> {
        let client = teloxide::net::default_reqwest_settings()
            .no_proxy()
            .build()
            .map_err(|e| WatchError::Adapter(format!("Failed to build Telegram HTTP client: {}", e)))?;
        Ok(teloxide::Bot::with_client(token.to_string(), client))
    }

    /// Call `get_me` until it succeeds, retrying transient failures.
    ///
    /// Permanent errors (bad token, API errors) fail on the first attempt.
    async fn wait_until_reachable(&self, bot: &teloxide::Bot) -> Result<()> {
        use teloxide::prelude::*;
        use teloxide::RequestError;

        let max_retries = self.config.max_startup_retries;
        let mut attempt: u32 = 0;
        loop {
            let e = match bot.get_me().await {
                Ok(me) => {
                    info!(bot = %me.username(), "Telegram bot reachable");
                    return Ok(());
                }
                Err(e) => e,
            };

            let is_transient = matches!(
                &e,
                RequestError::Network(_) | RequestError::Io(_) | RequestError::RetryAfter(_)
            );
            if !is_transient || attempt >= max_retries {
                return Err(WatchError::Adapter(format!(
                    "Telegram startup check failed after {} attempt(s): {}",
                    attempt + 1,
                    e
                )));
            }

            let delay = match &e {
                RequestError::RetryAfter(wait) => wait.duration(),
                _ => Self::startup_backoff_delay(attempt),
            };
            warn!(
                attempt = attempt + 1,
                max = max_retries,
                delay_secs = delay.as_secs(),
                error = %e,
                "Telegram startup check failed, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

/// Parse a chat id; Telegram ids are signed 64-bit integers.
fn parse_chat_id(chat_id: &str) -> Result<i64> {
    chat_id
        .trim()
        .parse()
        .map_err(|_| WatchError::Send(format!("Invalid Telegram chat ID: {}", chat_id)))
}

/// Parse a reply target; Telegram message ids are `i32`.
fn parse_reply_to(reply_to: Option<&str>) -> Option<i32> {
    reply_to.and_then(|id| id.trim().parse::<i32>().ok())
}

/// Convert a teloxide message into the adapter-neutral event shape.
fn raw_event_from(msg: &teloxide::types::Message) -> RawEvent {
    let media = if msg.photo().is_some() {
        Some(RawMedia::Photo)
    } else if msg.video().is_some() {
        Some(RawMedia::Document {
            mime_type: Some("video/mp4".to_string()),
        })
    } else if let Some(audio) = msg.audio() {
        Some(RawMedia::Document {
            mime_type: Some(
                audio
                    .mime_type
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "audio/mpeg".to_string()),
            ),
        })
    } else if msg.voice().is_some() {
        Some(RawMedia::Voice)
    } else if let Some(doc) = msg.document() {
        Some(RawMedia::Document {
            mime_type: doc.mime_type.as_ref().map(|m| m.to_string()),
        })
    } else if msg.location().is_some() {
        Some(RawMedia::Location)
    } else if msg.text().is_none() && msg.caption().is_none() {
        Some(RawMedia::Other)
    } else {
        None
    };

    let from = msg.from.as_ref();
    RawEvent {
        message_id: Some(msg.id.0.to_string()),
        chat_id: Some(msg.chat.id.0.to_string()),
        chat_title: msg.chat.title().map(str::to_string),
        sender_id: from.map(|u| u.id.0.to_string()),
        sender_first_name: from.map(|u| u.first_name.clone()),
        sender_last_name: from.and_then(|u| u.last_name.clone()),
        sender_username: from.and_then(|u| u.username.clone()),
        text: msg.text().or_else(|| msg.caption()).map(str::to_string),
        timestamp: Some(msg.date),
        media,
    }
}

#[async_trait]
impl ChatAdapter for TelegramAdapter {
    fn name(&self) -> &str {
        "telegram"
    }

    /// Verify the token, then spawn the polling dispatcher.
    async fn connect(&self) -> Result<()> {
        if self.connected.swap(true, Ordering::SeqCst) {
            info!("Telegram adapter already connected");
            return Ok(());
        }

        if self.config.token.trim().is_empty() {
            self.connected.store(false, Ordering::SeqCst);
            return Err(WatchError::Config("Telegram bot token is empty".into()));
        }

        let bot = match Self::build_bot(&self.config.token) {
            Ok(bot) => bot,
            Err(e) => {
                self.connected.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };
        if let Err(e) = self.wait_until_reachable(&bot).await {
            self.connected.store(false, Ordering::SeqCst);
            return Err(e);
        }

        *self.bot.write().await = Some(bot.clone());

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        *self.shutdown_tx.lock().await = Some(shutdown_tx);

        let slot = Arc::clone(&self.handler);
        let connected = Arc::clone(&self.connected);

        tokio::spawn(async move {
            use teloxide::prelude::*;

            let task_result = std::panic::AssertUnwindSafe(async move {
                let handler = Update::filter_message().endpoint(
                    |msg: Message, slot: HandlerSlot| async move {
                        let bound = slot.read().await.clone();
                        match bound {
                            Some(on_event) => on_event(raw_event_from(&msg)).await,
                            None => debug!(
                                chat_id = msg.chat.id.0,
                                "Telegram update received before a handler was bound"
                            ),
                        }
                        Ok::<(), Box<dyn std::error::Error + Send + Sync>>(())
                    },
                );

                let mut dispatcher = Dispatcher::builder(bot, handler)
                    .dependencies(dptree::deps![slot])
                    .build();

                info!("Telegram dispatcher started");
                tokio::select! {
                    _ = dispatcher.dispatch() => {
                        info!("Telegram dispatcher completed");
                    }
                    _ = shutdown_rx.recv() => {
                        info!("Telegram adapter shutdown signal received");
                    }
                }
            })
            .catch_unwind()
            .await;

            if task_result.is_err() {
                error!("Telegram polling task panicked");
            }
            connected.store(false, Ordering::SeqCst);
            info!("Telegram polling task stopped");
        });

        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        *self.handler.write().await = None;
        *self.bot.write().await = None;

        if !self.connected.swap(false, Ordering::SeqCst) {
            debug!("Telegram adapter already disconnected");
            return Ok(());
        }

        if let Some(tx) = self.shutdown_tx.lock().await.take() {
            if tx.send(()).await.is_err() {
                warn!("Telegram shutdown channel already closed");
            }
        }
        info!("Telegram adapter disconnected");
        Ok(())
    }

    async fn send(
        &self,
        chat_id: &str,
        text: &str,
        reply_to: Option<&str>,
    ) -> Result<SendReceipt> {
        use teloxide::payloads::SendMessageSetters;
        use teloxide::prelude::*;
        use teloxide::types::{ChatId, MessageId, ReplyParameters};

        let chat = parse_chat_id(chat_id)?;
        let bot = self
            .bot
            .read()
            .await
            .clone()
            .ok_or_else(|| WatchError::Adapter("Telegram adapter not connected".to_string()))?;

        let mut request = bot.send_message(ChatId(chat), text);
        if let Some(id) = parse_reply_to(reply_to) {
            request = request
                .reply_parameters(ReplyParameters::new(MessageId(id)).allow_sending_without_reply());
        }

        let sent = request
            .await
            .map_err(|e| WatchError::Send(format!("Failed to send Telegram message: {}", e)))?;

        debug!(chat_id = chat, message_id = sent.id.0, "Telegram message sent");
        Ok(SendReceipt {
            message_id: sent.id.0.to_string(),
            timestamp: sent.date,
        })
    }

    async fn subscribe(&self, handler: EventHandler) -> Result<()> {
        *self.handler.write().await = Some(handler);
        Ok(())
    }
}
