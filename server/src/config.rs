//! Presence timing and buffer configuration.
//!
//! The typing TTL and expiry period are protocol constants: clients refresh
//! their ping every 2500 ms and rely on the TTL staying above that, so neither
//! is read from the environment. Tests that need other timings build a
//! `ChatConfig` directly. Only the per-connection buffer is tunable.

use std::time::Duration;

/// How long a typing ping is trusted before the server expires it.
pub const DEFAULT_TYPING_TTL_MS: u64 = 3500;

/// Expiry loop period.
pub const DEFAULT_EXPIRY_INTERVAL_MS: u64 = 300;

/// Outbound frames buffered per connection before it counts as stalled.
pub const DEFAULT_CONNECTION_BUFFER: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChatConfig {
    pub typing_ttl: Duration,
    pub expiry_interval: Duration,
    pub connection_buffer: usize,
}

impl ChatConfig {
    /// Defaults plus an optional `CONNECTION_BUFFER` override.
    #[must_use]
    pub fn from_env() -> Self {
        let buffer = env_parse("CONNECTION_BUFFER", DEFAULT_CONNECTION_BUFFER).max(1);
        Self { connection_buffer: buffer, ..Self::default() }
    }

    /// TTL advertised to receivers as `expiresInMs`.
    #[must_use]
    pub fn typing_ttl_ms(&self) -> u64 {
        u64::try_from(self.typing_ttl.as_millis()).unwrap_or(u64::MAX)
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            typing_ttl: Duration::from_millis(DEFAULT_TYPING_TTL_MS),
            expiry_interval: Duration::from_millis(DEFAULT_EXPIRY_INTERVAL_MS),
            connection_buffer: DEFAULT_CONNECTION_BUFFER,
        }
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
