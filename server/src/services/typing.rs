//! Typing presence tracker — record explicit pings.
//!
//! DESIGN
//! ======
//! A ping marks every connection of the user (all tabs) as typing and then
//! broadcasts `typing(true)` once. The broadcast is unconditional: repeated
//! pings carry no new state but refresh the expiry countdown every receiver
//! keeps. Stop events come only from the expiry loop and disconnects.

use frames::{ServerEvent, TypingEvent};
use tokio::time::Instant;
use tracing::debug;

use crate::services::chat::ChatError;
use crate::services::{ANONYMOUS, broadcast, now_ms};
use crate::state::AppState;

/// Record a typing ping for `user_id` and broadcast it.
///
/// # Errors
///
/// Returns [`ChatError::EmptyUserId`] if `user_id` is blank; nothing is
/// broadcast in that case.
pub fn ping(state: &AppState, user_id: &str) -> Result<TypingEvent, ChatError> {
    let user_id = user_id.trim();
    if user_id.is_empty() {
        return Err(ChatError::EmptyUserId);
    }

    let username = state
        .registry
        .mark_typing(user_id, Instant::now())
        .unwrap_or_else(|| ANONYMOUS.to_owned());

    let event = TypingEvent::started(user_id, username, state.config.typing_ttl_ms(), now_ms());
    let delivery = broadcast::broadcast(state, &ServerEvent::Typing(event.clone()));
    debug!(%user_id, delivered = delivery.delivered, "typing: ping broadcast");
    Ok(event)
}

#[cfg(test)]
#[path = "typing_test.rs"]
mod tests;
