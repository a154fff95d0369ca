//! Client state: identity, connection status, chat log, typing presence.
//!
//! DESIGN
//! ======
//! `ClientState` is the single owner of everything a front end renders.
//! Decoded stream frames go through `apply_raw`; the result tells the caller
//! which part changed so it can redraw just that.

pub mod chat;
pub mod presence;
pub mod typing;

#[cfg(test)]
#[path = "mod_test.rs"]
mod mod_test;

use std::time::Instant;

use frames::{RawEvent, ServerEvent};

use self::chat::ChatLog;
use self::presence::PresenceCache;
use self::typing::TypingDebounce;

/// Who this client is, as last confirmed by the server.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub username: String,
}

/// Event stream connection status.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// No stream open.
    #[default]
    Disconnected,
    /// Stream open; `hello` may or may not have arrived yet.
    Connected,
    /// Stream dropped; a retry is pending.
    Reconnecting,
}

impl ConnectionStatus {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
        }
    }
}

/// What a frame changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Applied {
    Identity,
    Message,
    Presence,
    /// Malformed, unknown, or a no-op.
    Nothing,
}

#[derive(Clone, Debug, Default)]
pub struct ClientState {
    pub identity: Identity,
    pub status: ConnectionStatus,
    pub chat: ChatLog,
    pub presence: PresenceCache,
    pub debounce: TypingDebounce,
}

impl ClientState {
    #[must_use]
    pub fn new(identity: Identity) -> Self {
        Self { identity, ..Self::default() }
    }

    /// Apply one decoded stream frame.
    pub fn apply_raw(&mut self, raw: &RawEvent, now: Instant) -> Applied {
        let event = match ServerEvent::parse(raw) {
            Ok(event) => event,
            Err(e) => {
                log::debug!("dropping {} frame: {e}", raw.event);
                return Applied::Nothing;
            }
        };

        match event {
            ServerEvent::Hello(hello) => {
                if hello.user_id.is_empty() || hello.username.is_empty() {
                    return Applied::Nothing;
                }
                self.identity = Identity { user_id: hello.user_id, username: hello.username };
                Applied::Identity
            }
            ServerEvent::Message(message) => {
                if self.chat.push(message) { Applied::Message } else { Applied::Nothing }
            }
            ServerEvent::Typing(typing) => {
                if self.presence.apply(&typing, &self.identity.user_id, now) {
                    Applied::Presence
                } else {
                    Applied::Nothing
                }
            }
        }
    }

    /// Stream opened.
    pub fn on_connected(&mut self) {
        self.status = ConnectionStatus::Connected;
    }

    /// Stream dropped; peers' typing state is stale until frames flow again.
    pub fn on_disconnected(&mut self) {
        self.status = ConnectionStatus::Reconnecting;
        self.presence.clear();
    }
}
