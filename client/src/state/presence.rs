//! Local cache of peers currently shown as typing.
//!
//! DESIGN
//! ======
//! Every `typing(true)` carries its own expiry; the cache trusts it and
//! sweeps on a 250 ms cadence, independent of the server's expiry loop. A
//! lost `typing(false)` (dropped stream, missed frame) therefore still clears
//! the indicator within `expires_in + 250 ms`.

#[cfg(test)]
#[path = "presence_test.rs"]
mod presence_test;

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use frames::TypingEvent;

/// Expiry applied when a `typing(true)` event carries none.
pub const DEFAULT_EXPIRES_IN: Duration = Duration::from_millis(2000);

/// Cadence callers should drive `sweep` at.
pub const SWEEP_INTERVAL: Duration = Duration::from_millis(250);

/// Shown for peers that announced a blank username.
pub const FALLBACK_NAME: &str = "Someone";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypingPeer {
    pub username: String,
    pub expires_at: Instant,
}

/// Typing peers keyed by user id.
#[derive(Clone, Debug, Default)]
pub struct PresenceCache {
    peers: BTreeMap<String, TypingPeer>,
}

impl PresenceCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one typing event. Events about `self_user_id` or with no user id
    /// are ignored. Returns `true` if the visible set changed.
    pub fn apply(&mut self, event: &TypingEvent, self_user_id: &str, now: Instant) -> bool {
        if event.user_id.is_empty() || event.user_id == self_user_id {
            return false;
        }

        if !event.is_typing {
            return self.peers.remove(&event.user_id).is_some();
        }

        let expires_in = event.expires_in_ms.map_or(DEFAULT_EXPIRES_IN, Duration::from_millis);
        let username = if event.username.trim().is_empty() {
            FALLBACK_NAME.to_owned()
        } else {
            event.username.clone()
        };
        let peer = TypingPeer { username, expires_at: now + expires_in };
        let changed = self.peers.get(&event.user_id).is_none_or(|old| old.username != peer.username);
        self.peers.insert(event.user_id.clone(), peer);
        changed
    }

    /// Drop peers whose expiry has passed. Returns `true` if any were removed.
    pub fn sweep(&mut self, now: Instant) -> bool {
        let before = self.peers.len();
        self.peers.retain(|_, peer| peer.expires_at > now);
        self.peers.len() != before
    }

    /// Forget everyone, e.g. when the stream reconnects.
    pub fn clear(&mut self) {
        self.peers.clear();
    }

    #[must_use]
    pub fn get(&self, user_id: &str) -> Option<&TypingPeer> {
        self.peers.get(user_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Human-readable indicator line, or `None` when nobody is typing.
    #[must_use]
    pub fn typing_line(&self) -> Option<String> {
        let names: Vec<&str> = self.peers.values().map(|peer| peer.username.as_str()).collect();
        match names.as_slice() {
            [] => None,
            [one] => Some(format!("{one} is typing…")),
            [first, second] => Some(format!("{first} and {second} are typing…")),
            [first, second, rest @ ..] => Some(format!("{first}, {second} and {} others are typing…", rest.len())),
        }
    }
}
