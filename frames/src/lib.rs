//! Shared event model and text/event-stream codec for the chat transport.
//!
//! This crate owns the wire representation used by both `server` and
//! `client`. Every payload is a typed struct; a frame on the wire is
//!
//! ```text
//! event: <name>
//! data: <json>
//!
//! ```
//!
//! The server only ever encodes. Clients feed raw bytes to [`SseDecoder`]
//! and map each [`RawEvent`] back to a [`ServerEvent`] with
//! [`ServerEvent::parse`].

mod decode;

pub use decode::{RawEvent, SseDecoder};

use serde::{Deserialize, Deserializer, Serialize};

/// Event name for the identity echo sent on every new connection.
pub const EVENT_HELLO: &str = "hello";

/// Event name for chat messages.
pub const EVENT_MESSAGE: &str = "message";

/// Event name for typing presence updates.
pub const EVENT_TYPING: &str = "typing";

/// Error returned by [`ServerEvent::encode`] and [`ServerEvent::parse`].
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The payload could not be serialized or deserialized as JSON.
    #[error("invalid event payload: {0}")]
    Json(#[from] serde_json::Error),
    /// The frame carried an event name this protocol does not define.
    #[error("unknown event: {0}")]
    UnknownEvent(String),
}

// =============================================================================
// PAYLOADS
// =============================================================================

/// Canonical identity echoed back to a client right after it connects.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hello {
    pub user_id: String,
    pub username: String,
}

/// A chat message as delivered to every connection.
///
/// `content` is the only required field when decoding; the others default so
/// that a partially formed payload still renders.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub id: String,
    /// Display name of the sender at send time.
    #[serde(default)]
    pub from: String,
    pub content: String,
    /// Milliseconds since the Unix epoch, server clock.
    #[serde(default)]
    pub ts: i64,
}

/// Typing presence change for one user.
///
/// `expires_in_ms` is only ever set on a start event; it tells receivers how
/// long to trust the signal before expiring it themselves. Build values with
/// [`TypingEvent::started`] and [`TypingEvent::stopped`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingEvent {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub is_typing: bool,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_millis")]
    pub expires_in_ms: Option<u64>,
    #[serde(default)]
    pub ts: i64,
}

impl TypingEvent {
    /// A "user is typing" event valid for `ttl_ms`.
    pub fn started(user_id: impl Into<String>, username: impl Into<String>, ttl_ms: u64, ts: i64) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
            is_typing: true,
            expires_in_ms: Some(ttl_ms),
            ts,
        }
    }

    /// A "user stopped typing" event. Never carries an expiry.
    pub fn stopped(user_id: impl Into<String>, username: impl Into<String>, ts: i64) -> Self {
        Self { user_id: user_id.into(), username: username.into(), is_typing: false, expires_in_ms: None, ts }
    }
}

/// Accept any JSON value for `expiresInMs`; anything that is not a
/// non-negative integer (or finite float) decodes as `None`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn lenient_millis<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let millis = match value {
        serde_json::Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|v| v.is_finite() && *v >= 0.0)
                .map(|v| v as u64)
        }),
        _ => None,
    };
    Ok(millis)
}

// =============================================================================
// EVENTS
// =============================================================================

/// Every event the server pushes down a stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServerEvent {
    Hello(Hello),
    Message(ChatMessage),
    Typing(TypingEvent),
}

impl ServerEvent {
    /// Wire name written on the `event:` line.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Hello(_) => EVENT_HELLO,
            Self::Message(_) => EVENT_MESSAGE,
            Self::Typing(_) => EVENT_TYPING,
        }
    }

    /// JSON body written on the `data:` line.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Json`] if serialization fails.
    pub fn payload_json(&self) -> Result<String, CodecError> {
        let json = match self {
            Self::Hello(p) => serde_json::to_string(p)?,
            Self::Message(p) => serde_json::to_string(p)?,
            Self::Typing(p) => serde_json::to_string(p)?,
        };
        Ok(json)
    }

    /// Encode into one complete text/event-stream frame.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Json`] if serialization fails.
    pub fn encode(&self) -> Result<String, CodecError> {
        Ok(encode_frame(self.name(), &self.payload_json()?))
    }

    /// Map a decoded frame back to a typed event.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::UnknownEvent`] for names outside the protocol and
    /// [`CodecError::Json`] when the data line is not a valid payload.
    pub fn parse(raw: &RawEvent) -> Result<Self, CodecError> {
        match raw.event.as_str() {
            EVENT_HELLO => Ok(Self::Hello(serde_json::from_str(&raw.data)?)),
            EVENT_MESSAGE => Ok(Self::Message(serde_json::from_str(&raw.data)?)),
            EVENT_TYPING => Ok(Self::Typing(serde_json::from_str(&raw.data)?)),
            other => Err(CodecError::UnknownEvent(other.to_owned())),
        }
    }
}

/// Format a named event with a single-line JSON body.
///
/// `serde_json` never emits raw newlines, so the body always fits on one
/// `data:` line.
#[must_use]
pub fn encode_frame(name: &str, data: &str) -> String {
    format!("event: {name}\ndata: {data}\n\n")
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
