//! Bounded recent-message history, newest first.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::bus::Message;

/// Default number of messages kept.
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// Fixed-capacity buffer of the most recent messages.
///
/// Not synchronized; the service keeps it behind a lock.
#[derive(Debug)]
pub struct HistoryBuffer {
    entries: VecDeque<Arc<Message>>,
    capacity: usize,
}

impl HistoryBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Insert at the front, evicting the oldest entry beyond capacity.
    pub fn push(&mut self, message: Arc<Message>) {
        self.entries.push_front(message);
        self.entries.truncate(self.capacity);
    }

    /// Up to `n` newest messages, newest first.
    pub fn recent(&self, n: usize) -> Vec<Arc<Message>> {
        self.entries.iter().take(n).cloned().collect()
    }

    /// Up to `n` newest messages from one chat, newest first.
    pub fn recent_for_chat(&self, chat_id: &str, n: usize) -> Vec<Arc<Message>> {
        self.entries
            .iter()
            .filter(|m| m.chat_id == chat_id)
            .take(n)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}
