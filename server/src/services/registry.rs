//! Connection registry — the authoritative set of live streams.
//!
//! DESIGN
//! ======
//! One `std::sync::Mutex` guards a `Vec<Connection>` kept in registration
//! order, so "most recent connection of a user" is the last match. Every
//! method holds the lock only for in-memory work and returns owned copies;
//! writes to connections happen elsewhere, after the lock is released.
//!
//! A user may hold any number of connections (one per tab). Typing flags are
//! per connection; the user's aggregate state is the OR across them.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use uuid::Uuid;

use crate::services::broadcast::OutboundFrame;

// =============================================================================
// TYPES
// =============================================================================

/// One open streaming connection.
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: Uuid,
    pub user_id: String,
    pub username: String,
    /// Frames destined for this connection's response body.
    pub tx: mpsc::Sender<OutboundFrame>,
    pub is_typing: bool,
    pub last_typing_at: Option<Instant>,
}

impl Connection {
    pub fn new(user_id: impl Into<String>, username: impl Into<String>, tx: mpsc::Sender<OutboundFrame>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            username: username.into(),
            tx,
            is_typing: false,
            last_typing_at: None,
        }
    }
}

/// What `remove` took out of the registry.
#[derive(Debug)]
pub struct Departure {
    pub connection: Connection,
    /// Connections the same user still holds after this removal.
    pub siblings_remaining: usize,
    /// Whether any of those remaining connections is still typing.
    pub siblings_typing: bool,
}

impl Departure {
    /// True when the user's aggregate typing state just flipped to false
    /// because its last typing connection went away. Idle tabs left behind
    /// do not keep the user typing.
    #[must_use]
    pub fn ends_typing(&self) -> bool {
        self.connection.is_typing && !self.siblings_typing
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<Mutex<Vec<Connection>>>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Connection>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a connection. No uniqueness constraint on `user_id`.
    pub fn register(&self, connection: Connection) {
        self.lock().push(connection);
    }

    /// Remove by connection id. Returns `None` if it was already gone.
    pub fn remove(&self, connection_id: Uuid) -> Option<Departure> {
        let mut connections = self.lock();
        let index = connections.iter().position(|c| c.id == connection_id)?;
        let connection = connections.remove(index);
        let (siblings_remaining, siblings_typing) = connections
            .iter()
            .filter(|c| c.user_id == connection.user_id)
            .fold((0, false), |(count, typing), c| (count + 1, typing || c.is_typing));
        Some(Departure { connection, siblings_remaining, siblings_typing })
    }

    /// Point-in-time copy of every connection.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Connection> {
        self.lock().clone()
    }

    #[must_use]
    pub fn connections_for(&self, user_id: &str) -> Vec<Connection> {
        self.lock()
            .iter()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Username of the user's most recently registered connection.
    #[must_use]
    pub fn display_name(&self, user_id: &str) -> Option<String> {
        self.lock()
            .iter()
            .rev()
            .find(|c| c.user_id == user_id)
            .map(|c| c.username.clone())
    }

    /// Mark every connection of `user_id` as typing at `now`.
    ///
    /// Returns the user's display name, or `None` when the user has no live
    /// connection (nothing was marked).
    pub fn mark_typing(&self, user_id: &str, now: Instant) -> Option<String> {
        let mut connections = self.lock();
        let mut name = None;
        for connection in connections.iter_mut().filter(|c| c.user_id == user_id) {
            connection.is_typing = true;
            connection.last_typing_at = Some(now);
            name = Some(connection.username.clone());
        }
        name
    }

    /// Clear the user's typing flags if, under the lock, the aggregate is
    /// still typing and its newest ping is older than `ttl`.
    ///
    /// Returns the display name when something was cleared. A ping that
    /// landed after the caller's snapshot keeps the user typing.
    pub fn clear_stale_typing(&self, user_id: &str, now: Instant, ttl: Duration) -> Option<String> {
        let mut connections = self.lock();
        let group: Vec<&mut Connection> = connections.iter_mut().filter(|c| c.user_id == user_id).collect();
        let aggregate = TypingAggregate::of(group.iter().map(|c| &**c));
        if !aggregate.is_expired(now, ttl) {
            return None;
        }

        let mut name = None;
        for connection in group {
            connection.is_typing = false;
            name = Some(connection.username.clone());
        }
        name
    }

    /// Drop every connection. Their channels close once in-flight snapshots
    /// are released, which ends the held-open response bodies.
    pub fn close_all(&self) -> usize {
        let mut connections = self.lock();
        let count = connections.len();
        connections.clear();
        count
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

// =============================================================================
// AGGREGATE
// =============================================================================

/// A user's typing state folded across all of its connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TypingAggregate {
    pub any_typing: bool,
    pub last_seen: Option<Instant>,
}

impl TypingAggregate {
    pub fn of<'a>(connections: impl IntoIterator<Item = &'a Connection>) -> Self {
        connections.into_iter().fold(Self::default(), |acc, c| acc.with(c))
    }

    #[must_use]
    pub fn with(self, connection: &Connection) -> Self {
        Self {
            any_typing: self.any_typing || connection.is_typing,
            last_seen: self.last_seen.max(connection.last_typing_at),
        }
    }

    /// Typing, and the newest ping is strictly older than `ttl`.
    #[must_use]
    pub fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        if !self.any_typing {
            return false;
        }
        match self.last_seen {
            Some(seen) => now.saturating_duration_since(seen) > ttl,
            None => true,
        }
    }
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod tests;
