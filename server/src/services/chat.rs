//! Chat service — accept a message and broadcast it.
//!
//! Messages are not stored; once fanned out they exist only in the clients.

use frames::{ChatMessage, ServerEvent};
use tracing::info;
use uuid::Uuid;

use crate::services::{ANONYMOUS, broadcast, now_ms};
use crate::state::AppState;

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ChatError {
    #[error("userId required")]
    EmptyUserId,
    #[error("content required")]
    EmptyContent,
}

impl ChatError {
    /// Grepable code returned to HTTP callers.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::EmptyUserId => "E_EMPTY_USER_ID",
            Self::EmptyContent => "E_EMPTY_CONTENT",
        }
    }
}

// =============================================================================
// SEND
// =============================================================================

/// Broadcast `content` as a message from `from_user_id`.
///
/// The sender's display name comes from its most recent live connection and
/// falls back to `"Anonymous"` when the id is absent or unknown.
///
/// # Errors
///
/// Returns [`ChatError::EmptyContent`] if `content` is blank.
pub fn send_message(state: &AppState, from_user_id: Option<&str>, content: &str) -> Result<ChatMessage, ChatError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(ChatError::EmptyContent);
    }

    let from = from_user_id
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .and_then(|id| state.registry.display_name(id))
        .unwrap_or_else(|| ANONYMOUS.to_owned());

    let message = ChatMessage { id: Uuid::new_v4().to_string(), from, content: content.to_owned(), ts: now_ms() };

    let delivery = broadcast::broadcast(state, &ServerEvent::Message(message.clone()));
    info!(
        id = %message.id,
        from = %message.from,
        delivered = delivery.delivered,
        pruned = delivery.pruned,
        "chat: message broadcast"
    );
    Ok(message)
}

#[cfg(test)]
#[path = "chat_test.rs"]
mod tests;
