//! Session service — stream connection open/close.
//!
//! LIFECYCLE
//! =========
//! 1. Canonicalize the caller's identity (generate what is missing).
//! 2. Queue `hello` as the connection's first frame, then register it.
//! 3. The response body drains the connection's channel until the peer or
//!    the server drops it.
//! 4. Close → unregister; if that connection was typing and none of the
//!    user's remaining connections is, broadcast one `typing(false)`.
//!
//! Close is driven by `ConnectionGuard::drop`, so every exit path of the
//! response body (client gone, pruned, shutdown) cleans up exactly once.

use frames::{Hello, ServerEvent};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::services::broadcast::{self, OutboundFrame};
use crate::services::registry::Connection;
use crate::state::AppState;

/// Length of the id prefix used as a default display name.
pub const DEFAULT_NAME_LEN: usize = 8;

// =============================================================================
// IDENTITY
// =============================================================================

/// Normalize a caller-supplied identity.
///
/// A missing or blank id becomes a fresh 32-character hex id; a missing or
/// blank username becomes the first [`DEFAULT_NAME_LEN`] characters of the
/// id.
#[must_use]
pub fn canonical_identity(user_id: Option<&str>, username: Option<&str>) -> Hello {
    let user_id = user_id
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map_or_else(|| Uuid::new_v4().simple().to_string(), str::to_owned);

    let username = username
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map_or_else(|| user_id.chars().take(DEFAULT_NAME_LEN).collect(), str::to_owned);

    Hello { user_id, username }
}

// =============================================================================
// OPEN / CLOSE
// =============================================================================

/// Register a new connection for `identity` and return its id plus the
/// receiver the response body drains. The receiver already holds `hello`.
pub fn open(state: &AppState, identity: &Hello) -> (Uuid, mpsc::Receiver<OutboundFrame>) {
    let (tx, rx) = mpsc::channel::<OutboundFrame>(state.config.connection_buffer);
    let connection = Connection::new(identity.user_id.clone(), identity.username.clone(), tx);
    let connection_id = connection.id;

    match OutboundFrame::from_event(&ServerEvent::Hello(identity.clone())) {
        Ok(frame) => {
            if let Err(e) = broadcast::write_frame(&connection, &frame) {
                warn!(%connection_id, error = %e, "stream: failed to queue hello");
            }
        }
        Err(e) => warn!(%connection_id, error = %e, "stream: failed to encode hello"),
    }

    state.registry.register(connection);
    info!(
        %connection_id,
        user_id = %identity.user_id,
        username = %identity.username,
        connections = state.registry.len(),
        "stream: client connected"
    );
    (connection_id, rx)
}

/// Unregister a connection. Idempotent.
///
/// Returns `true` if a final `typing(false)` was broadcast for the user.
pub fn close(state: &AppState, connection_id: Uuid) -> bool {
    let Some(departure) = state.registry.remove(connection_id) else {
        return false;
    };
    info!(
        %connection_id,
        user_id = %departure.connection.user_id,
        siblings = departure.siblings_remaining,
        siblings_typing = departure.siblings_typing,
        "stream: client disconnected"
    );

    let Some(stop) = broadcast::stop_for_departure(&departure) else {
        return false;
    };
    broadcast::broadcast(state, &stop);
    true
}

/// Closes its connection when dropped. Owned by the streaming response body.
pub struct ConnectionGuard {
    state: AppState,
    connection_id: Uuid,
}

impl ConnectionGuard {
    #[must_use]
    pub fn new(state: AppState, connection_id: Uuid) -> Self {
        Self { state, connection_id }
    }

    #[must_use]
    pub fn connection_id(&self) -> Uuid {
        self.connection_id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        close(&self.state, self.connection_id);
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
