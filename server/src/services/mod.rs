//! Presence and broadcast services used by the HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own the registry mutations and fan-out so route handlers
//! stay focused on protocol translation. Everything here is synchronous:
//! writes to connections are non-blocking channel sends, which also lets
//! disconnect cleanup run from a `Drop` impl.

pub mod broadcast;
pub mod chat;
pub mod expiry;
pub mod registry;
pub mod session;
pub mod typing;

use std::time::{SystemTime, UNIX_EPOCH};

/// Display name used when a user id has no live connection.
pub const ANONYMOUS: &str = "Anonymous";

/// Current time as milliseconds since Unix epoch.
pub(crate) fn now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}
