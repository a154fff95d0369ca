//! Broadcast hub — fan one event out to every live connection.
//!
//! DESIGN
//! ======
//! The event is serialized once into an `OutboundFrame`, the registry is
//! snapshotted, and each connection gets a non-blocking `try_send` of a
//! cheap clone outside the lock. A closed
//! channel (peer gone) or a full one (peer not draining) is a failed write.
//! Failed connections are collected during the pass and removed only after
//! it completes.
//!
//! Pruning can strand a typing indicator: if the removed connection was the
//! user's last typing one, a stop event is fanned out as a follow-up
//! round. Each extra round exists only because a connection was removed, so
//! the loop is bounded by the registry size.

use std::sync::Arc;

use frames::{CodecError, ServerEvent, TypingEvent};
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::services::now_ms;
use crate::services::registry::{Connection, Departure};
use crate::state::AppState;

// =============================================================================
// TYPES
// =============================================================================

/// One serialized event, shared by every connection it is queued on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundFrame {
    /// Wire name for the `event:` field.
    pub name: &'static str,
    /// JSON payload for the `data:` field.
    pub data: Arc<str>,
}

impl OutboundFrame {
    /// # Errors
    ///
    /// Returns [`CodecError::Json`] if the payload cannot be serialized.
    pub fn from_event(event: &ServerEvent) -> Result<Self, CodecError> {
        Ok(Self { name: event.name(), data: event.payload_json()?.into() })
    }

    /// The frame as text/event-stream bytes would carry it.
    #[must_use]
    pub fn encode(&self) -> String {
        frames::encode_frame(self.name, &self.data)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WriteError {
    #[error("connection closed")]
    Closed,
    #[error("connection buffer full")]
    Stalled,
}

/// Outcome of fanning out one event.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    /// Connections that accepted the frame.
    pub delivered: usize,
    /// Connections removed because the write failed.
    pub pruned: usize,
}

// =============================================================================
// FAN-OUT
// =============================================================================

/// Queue one frame on a single connection.
///
/// # Errors
///
/// Returns [`WriteError::Closed`] if the receiving body is gone and
/// [`WriteError::Stalled`] if its buffer is full.
pub fn write_frame(connection: &Connection, frame: &OutboundFrame) -> Result<(), WriteError> {
    connection.tx.try_send(frame.clone()).map_err(|e| match e {
        TrySendError::Closed(_) => WriteError::Closed,
        TrySendError::Full(_) => WriteError::Stalled,
    })
}

/// Broadcast an event to every registered connection, pruning failures.
///
/// The returned `Delivery` describes the requested event; stop events caused
/// by pruning are delivered afterwards and not counted.
pub fn broadcast(state: &AppState, event: &ServerEvent) -> Delivery {
    let mut follow_ups = Vec::new();
    let delivery = fan_out(state, event, &mut follow_ups);

    while let Some(stop) = follow_ups.pop() {
        fan_out(state, &stop, &mut follow_ups);
    }
    delivery
}

fn fan_out(state: &AppState, event: &ServerEvent, follow_ups: &mut Vec<ServerEvent>) -> Delivery {
    let frame = match OutboundFrame::from_event(event) {
        Ok(frame) => frame,
        Err(e) => {
            error!(error = %e, event = event.name(), "broadcast: failed to encode event");
            return Delivery::default();
        }
    };

    let targets = state.registry.snapshot();
    let mut failed: Vec<Uuid> = Vec::new();
    let mut delivery = Delivery::default();

    for connection in &targets {
        match write_frame(connection, &frame) {
            Ok(()) => delivery.delivered += 1,
            Err(e) => {
                debug!(connection_id = %connection.id, error = %e, "broadcast: write failed");
                failed.push(connection.id);
            }
        }
    }
    drop(targets);

    for connection_id in failed {
        let Some(departure) = state.registry.remove(connection_id) else {
            continue;
        };
        delivery.pruned += 1;
        warn!(
            %connection_id,
            user_id = %departure.connection.user_id,
            "broadcast: pruned unwritable connection"
        );
        if let Some(stop) = stop_for_departure(&departure) {
            follow_ups.push(stop);
        }
    }

    delivery
}

/// The stop event owed to other clients when a departure ends a user's
/// typing state, if any.
#[must_use]
pub fn stop_for_departure(departure: &Departure) -> Option<ServerEvent> {
    if !departure.ends_typing() {
        return None;
    }
    let connection = &departure.connection;
    Some(ServerEvent::Typing(TypingEvent::stopped(
        connection.user_id.clone(),
        connection.username.clone(),
        now_ms(),
    )))
}

#[cfg(test)]
#[path = "broadcast_test.rs"]
mod tests;
