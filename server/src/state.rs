//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor and
//! handed to the expiry task. It owns the connection registry (the only
//! mutable presence state in the process), the timing config, and the flag
//! that keeps the expiry task a singleton.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use crate::config::ChatConfig;
use crate::services::registry::Registry;

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; all inner fields are Arc-wrapped or Copy.
#[derive(Clone)]
pub struct AppState {
    pub registry: Registry,
    pub config: ChatConfig,
    /// Flipped by the first successful `spawn_expiry_task`.
    pub expiry_started: Arc<AtomicBool>,
}

impl AppState {
    #[must_use]
    pub fn new(config: ChatConfig) -> Self {
        Self { registry: Registry::new(), config, expiry_started: Arc::new(AtomicBool::new(false)) }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
