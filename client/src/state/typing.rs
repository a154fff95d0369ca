//! Typing debounce controller.
//!
//! DESIGN
//! ======
//! Decides when the local user's typing pings go out. The first non-empty
//! edit pings immediately; while the draft stays non-empty and was edited
//! recently, a 250 ms tick re-pings every 2.5 s so the server TTL never
//! lapses mid-sentence. Clearing the draft or going idle for 4 s drops back
//! to `NotTyping` without sending anything: the server TTL and every peer's
//! local expiry end the indicator on their own.
//!
//! The controller never reads a clock and never sends; it only answers
//! "ping now?" for the instants it is given.

#[cfg(test)]
#[path = "typing_test.rs"]
mod typing_test;

use std::time::{Duration, Instant};

/// Interval between keepalive pings during one typing session.
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_millis(2500);

/// How long after the last edit the session still counts as active. Must
/// exceed `KEEPALIVE_INTERVAL` so tick jitter cannot open a gap.
pub const ACTIVE_WINDOW: Duration = Duration::from_millis(4000);

/// Cadence callers should drive `on_tick` at.
pub const TICK_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TypingPhase {
    #[default]
    NotTyping,
    Typing,
}

#[derive(Clone, Debug, Default)]
pub struct TypingDebounce {
    phase: TypingPhase,
    has_draft: bool,
    last_edit_at: Option<Instant>,
    last_ping_at: Option<Instant>,
}

impl TypingDebounce {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn phase(&self) -> TypingPhase {
        self.phase
    }

    /// Record an edit of the draft. Returns `true` when a ping must be sent.
    pub fn on_edit(&mut self, draft: &str, now: Instant) -> bool {
        self.last_edit_at = Some(now);
        self.has_draft = !draft.trim().is_empty();

        if !self.has_draft {
            self.phase = TypingPhase::NotTyping;
            return false;
        }
        if self.phase == TypingPhase::Typing {
            return false;
        }
        self.start(now)
    }

    /// Periodic check. Returns `true` when a keepalive ping is due.
    pub fn on_tick(&mut self, now: Instant) -> bool {
        let recently_edited = self
            .last_edit_at
            .is_some_and(|at| now.saturating_duration_since(at) < ACTIVE_WINDOW);

        if !self.has_draft || !recently_edited {
            self.phase = TypingPhase::NotTyping;
            return false;
        }

        match self.phase {
            // Draft came back without an edit event reaching us first.
            TypingPhase::NotTyping => self.start(now),
            TypingPhase::Typing => {
                let due = self
                    .last_ping_at
                    .map_or(true, |at| now.saturating_duration_since(at) >= KEEPALIVE_INTERVAL);
                if due {
                    self.last_ping_at = Some(now);
                }
                due
            }
        }
    }

    /// Forget the current session, e.g. after the draft was sent.
    pub fn reset(&mut self) {
        self.phase = TypingPhase::NotTyping;
        self.has_draft = false;
    }

    fn start(&mut self, now: Instant) -> bool {
        self.phase = TypingPhase::Typing;
        self.last_ping_at = Some(now);
        true
    }
}
