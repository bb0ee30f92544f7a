//! Message types for the GroupWatch pipeline
//!
//! Adapters hand the core a loosely-populated [`RawEvent`]; the processor
//! normalizes it into a canonical [`Message`] which is then shared as
//! `Arc<Message>` by the history buffer, the fan-out bus, the trigger
//! detector and the reply pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Placeholder for identifiers the adapter could not resolve.
pub const UNKNOWN_ID: &str = "unknown";
/// Placeholder for chats without a title.
pub const UNKNOWN_CHAT_TITLE: &str = "Unknown Chat";
/// Placeholder for senders without a first name.
pub const UNKNOWN_SENDER_NAME: &str = "Unknown";

/// Kind of media attached to a message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Photo,
    Video,
    Audio,
    Voice,
    Document,
    Location,
    Unknown,
}

impl MediaKind {
    /// Classify a document attachment by its MIME type.
    pub fn from_document_mime(mime: Option<&str>) -> Self {
        match mime.unwrap_or_default() {
            m if m.starts_with("video/") => MediaKind::Video,
            m if m.starts_with("audio/") => MediaKind::Audio,
            _ => MediaKind::Document,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Photo => "photo",
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
            MediaKind::Voice => "voice",
            MediaKind::Document => "document",
            MediaKind::Location => "location",
            MediaKind::Unknown => "unknown",
        }
    }
}

/// Media as the adapter sees it, before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawMedia {
    Photo,
    /// A file; video and audio files arrive this way too
    Document { mime_type: Option<String> },
    Voice,
    Location,
    Other,
}

impl RawMedia {
    pub fn kind(&self) -> MediaKind {
        match self {
            RawMedia::Photo => MediaKind::Photo,
            RawMedia::Document { mime_type } => MediaKind::from_document_mime(mime_type.as_deref()),
            RawMedia::Voice => MediaKind::Voice,
            RawMedia::Location => MediaKind::Location,
            RawMedia::Other => MediaKind::Unknown,
        }
    }
}

/// An inbound event exactly as an adapter delivers it.
///
/// Every field is optional; [`Message::from_event`] fills the gaps.
#[derive(Debug, Clone, Default)]
pub struct RawEvent {
    pub message_id: Option<String>,
    pub chat_id: Option<String>,
    pub chat_title: Option<String>,
    pub sender_id: Option<String>,
    pub sender_first_name: Option<String>,
    pub sender_last_name: Option<String>,
    pub sender_username: Option<String>,
    pub text: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub media: Option<RawMedia>,
}

impl RawEvent {
    /// Minimal event for a text message in a chat.
    pub fn text(chat_id: &str, message_id: &str, text: &str) -> Self {
        Self {
            message_id: Some(message_id.to_string()),
            chat_id: Some(chat_id.to_string()),
            text: Some(text.to_string()),
            ..Default::default()
        }
    }

    pub fn with_chat_title(mut self, title: &str) -> Self {
        self.chat_title = Some(title.to_string());
        self
    }

    pub fn with_sender(mut self, id: &str, first_name: &str) -> Self {
        self.sender_id = Some(id.to_string());
        self.sender_first_name = Some(first_name.to_string());
        self
    }

    pub fn with_media(mut self, media: RawMedia) -> Self {
        self.media = Some(media);
        self
    }
}

/// Canonical, immutable chat message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// Adapter message id; replies reference it
    pub id: String,
    pub chat_id: String,
    pub chat_title: String,
    pub from_user_id: String,
    /// First name, plus last name when present
    pub from_display_name: String,
    /// `@username`, when the sender has one
    pub from_handle: Option<String>,
    /// Empty for media-only messages
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub media: Option<MediaKind>,
}

impl Message {
    /// Normalize a raw adapter event.
    ///
    /// # Example
    /// ```
    /// use groupwatch::bus::message::{Message, RawEvent};
    ///
    /// let msg = Message::from_event(RawEvent::text("-100", "7", "hi"));
    /// assert_eq!(msg.chat_title, "Unknown Chat");
    /// assert_eq!(msg.from_display_name, "Unknown");
    /// ```
    pub fn from_event(event: RawEvent) -> Self {
        let first = event
            .sender_first_name
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| UNKNOWN_SENDER_NAME.to_string());
        let from_display_name = match event.sender_last_name.filter(|s| !s.is_empty()) {
            Some(last) => format!("{} {}", first, last),
            None => first,
        };

        Self {
            id: non_empty_or(event.message_id, UNKNOWN_ID),
            chat_id: non_empty_or(event.chat_id, UNKNOWN_ID),
            chat_title: non_empty_or(event.chat_title, UNKNOWN_CHAT_TITLE),
            from_user_id: non_empty_or(event.sender_id, UNKNOWN_ID),
            from_display_name,
            from_handle: event
                .sender_username
                .filter(|s| !s.is_empty())
                .map(|u| format!("@{}", u.trim_start_matches('@'))),
            text: event.text.unwrap_or_default(),
            timestamp: event.timestamp.unwrap_or_else(Utc::now),
            media: event.media.map(|m| m.kind()),
        }
    }

    /// Convenience constructor, mostly for tests and adapters that already
    /// have clean data.
    pub fn new(id: &str, chat_id: &str, text: &str) -> Self {
        Self::from_event(RawEvent::text(chat_id, id, text))
    }

    pub fn has_media(&self) -> bool {
        self.media.is_some()
    }

    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

fn non_empty_or(value: Option<String>, fallback: &str) -> String {
    value
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_normalize_empty_event() {
        let msg = Message::from_event(RawEvent::default());
        assert_eq!(msg.id, "unknown");
        assert_eq!(msg.chat_id, "unknown");
        assert_eq!(msg.chat_title, "Unknown Chat");
        assert_eq!(msg.from_user_id, "unknown");
        assert_eq!(msg.from_display_name, "Unknown");
        assert!(msg.from_handle.is_none());
        assert_eq!(msg.text, "");
        assert!(!msg.has_media());
        assert!(!msg.has_text());
    }

    #[test]
    fn test_normalize_full_event() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        let event = RawEvent {
            message_id: Some("42".into()),
            chat_id: Some("-100123".into()),
            chat_title: Some("Ops".into()),
            sender_id: Some("777".into()),
            sender_first_name: Some("Ada".into()),
            sender_last_name: Some("Lovelace".into()),
            sender_username: Some("ada".into()),
            text: Some("hello".into()),
            timestamp: Some(ts),
            media: None,
        };
        let msg = Message::from_event(event);

        assert_eq!(msg.id, "42");
        assert_eq!(msg.chat_title, "Ops");
        assert_eq!(msg.from_display_name, "Ada Lovelace");
        assert_eq!(msg.from_handle.as_deref(), Some("@ada"));
        assert_eq!(msg.timestamp, ts);
    }

    #[test]
    fn test_normalize_last_name_without_first() {
        let event = RawEvent {
            sender_last_name: Some("Smith".into()),
            ..Default::default()
        };
        assert_eq!(Message::from_event(event).from_display_name, "Unknown Smith");
    }

    #[test]
    fn test_handle_not_double_prefixed() {
        let event = RawEvent {
            sender_username: Some("@bob".into()),
            ..Default::default()
        };
        assert_eq!(Message::from_event(event).from_handle.as_deref(), Some("@bob"));
    }

    #[test]
    fn test_missing_timestamp_defaults_to_now() {
        let before = Utc::now();
        let msg = Message::new("1", "c", "x");
        assert!(msg.timestamp >= before);
    }

    #[test]
    fn test_media_classification() {
        assert_eq!(RawMedia::Photo.kind(), MediaKind::Photo);
        assert_eq!(RawMedia::Voice.kind(), MediaKind::Voice);
        assert_eq!(RawMedia::Location.kind(), MediaKind::Location);
        assert_eq!(RawMedia::Other.kind(), MediaKind::Unknown);
        assert_eq!(
            RawMedia::Document {
                mime_type: Some("video/mp4".into())
            }
            .kind(),
            MediaKind::Video
        );
        assert_eq!(
            RawMedia::Document {
                mime_type: Some("audio/ogg".into())
            }
            .kind(),
            MediaKind::Audio
        );
        assert_eq!(
            RawMedia::Document { mime_type: None }.kind(),
            MediaKind::Document
        );
    }

    #[test]
    fn test_media_message() {
        let msg = Message::from_event(RawEvent::text("c", "1", "").with_media(RawMedia::Photo));
        assert!(msg.has_media());
        assert_eq!(msg.media, Some(MediaKind::Photo));
        assert_eq!(MediaKind::Photo.as_str(), "photo");
    }

    #[test]
    fn test_message_serialization() {
        let msg = Message::from_event(
            RawEvent::text("c", "1", "hi")
                .with_chat_title("Chat")
                .with_sender("9", "Eve"),
        );
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"chat_title\":\"Chat\""));
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }
}
