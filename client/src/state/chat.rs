//! Chat log as seen by this client.

#[cfg(test)]
#[path = "chat_test.rs"]
mod chat_test;

use frames::ChatMessage;
use uuid::Uuid;

/// Sender shown for messages that arrive without one.
pub const UNKNOWN_SENDER: &str = "Unknown";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatEntry {
    pub id: String,
    pub from: String,
    pub content: String,
    /// Server timestamp in epoch milliseconds, when the server sent one.
    pub ts: Option<i64>,
}

/// Messages in arrival order.
#[derive(Clone, Debug, Default)]
pub struct ChatLog {
    entries: Vec<ChatEntry>,
}

impl ChatLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a received message. Messages with empty content are dropped;
    /// returns `true` if the entry was appended.
    pub fn push(&mut self, message: ChatMessage) -> bool {
        if message.content.is_empty() {
            return false;
        }
        let id = if message.id.is_empty() { Uuid::new_v4().to_string() } else { message.id };
        let from = if message.from.is_empty() { UNKNOWN_SENDER.to_owned() } else { message.from };
        let ts = (message.ts != 0).then_some(message.ts);
        self.entries.push(ChatEntry { id, from, content: message.content, ts });
        true
    }

    #[must_use]
    pub fn entries(&self) -> &[ChatEntry] {
        &self.entries
    }

    #[must_use]
    pub fn last(&self) -> Option<&ChatEntry> {
        self.entries.last()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
