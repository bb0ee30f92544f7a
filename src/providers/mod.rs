//! Providers module - Reply generation backends
//!
//! The reply pipeline asks a [`GenerationBackend`] for a reply to an inbound
//! message. The crate ships [`OpenAiBackend`], which talks to any
//! OpenAI-compatible chat completions endpoint. Failures are reported as
//! classified [`GenerationError`]s so the pipeline can decide between the
//! circuit breaker and the templated fallback.
//!
//! # Example
//!
//! ```rust,ignore
//! use groupwatch::config::GenerationConfig;
//! use groupwatch::providers::{GenerationBackend, OpenAiBackend};
//!
//! let mut config = GenerationConfig::default();
//! config.api_key = Some("sk-...".into());
//! let backend = OpenAiBackend::from_config(&config).expect("api key set");
//! let reply = backend.generate(&message, &context).await?;
//! ```

pub mod openai;

pub use openai::OpenAiBackend;

use async_trait::async_trait;
use std::sync::Arc;

use crate::bus::Message;
use crate::error::GenerationError;

/// Result type for generation calls.
pub type GenerationResult<T> = std::result::Result<T, GenerationError>;

/// A source of generated reply text.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Name used in logs (e.g. "openai").
    fn name(&self) -> &str;

    /// Produce a reply to `message`.
    ///
    /// `history` holds earlier messages of the same chat, newest first,
    /// without `message` itself.
    async fn generate(
        &self,
        message: &Message,
        history: &[Arc<Message>],
    ) -> GenerationResult<String>;
}

/// Map an HTTP status code and response body to a [`GenerationError`].
pub fn parse_backend_error(status: u16, body: &str) -> GenerationError {
    match status {
        401 | 403 => GenerationError::Auth(body.to_string()),
        404 => GenerationError::ModelNotFound(body.to_string()),
        429 => GenerationError::RateLimit(body.to_string()),
        400 | 422 => GenerationError::InvalidRequest(body.to_string()),
        500..=599 => GenerationError::ServerError(body.to_string()),
        _ => GenerationError::Unknown(format!("HTTP {}: {}", status, body)),
    }
}
