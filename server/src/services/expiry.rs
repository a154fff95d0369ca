//! Expiry loop — force-stop typing users whose pings went quiet.
//!
//! DESIGN
//! ======
//! Clients never send an explicit stop, and a tab can vanish without a clean
//! close, so the server ages typing state out on its own. A single task wakes
//! every `expiry_interval`, folds a registry snapshot into one aggregate per
//! user, and for every user whose newest ping is older than the TTL clears
//! all of that user's flags and broadcasts one `typing(false)`.
//!
//! The clear re-checks staleness under the registry lock, so a ping that
//! arrives between snapshot and clear wins. Users that were already clear
//! produce nothing; repeated ticks never emit duplicate stops.
//!
//! LIFECYCLE
//! =========
//! `main` spawns the task once at startup. The `expiry_started` flag in
//! `AppState` makes any further spawn a no-op. The returned handle stops the
//! task on shutdown.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::Ordering;

use frames::{ServerEvent, TypingEvent};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{error, info};

use crate::services::registry::TypingAggregate;
use crate::services::{broadcast, now_ms};
use crate::state::AppState;

/// Handle to the running expiry task.
pub struct ExpiryHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ExpiryHandle {
    /// Signal the task to stop and wait for it to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            error!(error = %e, "expiry task ended abnormally");
        }
    }
}

/// Spawn the expiry task. Returns `None` if it is already running for this
/// state.
pub fn spawn_expiry_task(state: AppState) -> Option<ExpiryHandle> {
    if state
        .expiry_started
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return None;
    }

    let (shutdown, mut shutdown_rx) = watch::channel(false);
    let interval = state.config.expiry_interval;
    info!(
        ?interval,
        ttl_ms = state.config.typing_ttl_ms(),
        "typing expiry task started"
    );

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = ticker.tick() => run_tick(&state),
                _ = shutdown_rx.changed() => break,
            }
        }
        info!("typing expiry task stopped");
    });

    Some(ExpiryHandle { shutdown, task })
}

/// One tick with panics contained, so a bad tick cannot end the task.
fn run_tick(state: &AppState) {
    let result = catch_unwind(AssertUnwindSafe(|| expire_stale(state, Instant::now())));
    if result.is_err() {
        error!("typing expiry tick panicked; continuing");
    }
}

/// Stop every user whose typing state is older than the TTL at `now`.
///
/// Returns the user ids a stop event was broadcast for.
pub fn expire_stale(state: &AppState, now: Instant) -> Vec<String> {
    let ttl = state.config.typing_ttl;

    let mut groups: HashMap<String, TypingAggregate> = HashMap::new();
    for connection in state.registry.snapshot() {
        let aggregate = groups.entry(connection.user_id.clone()).or_default();
        *aggregate = aggregate.with(&connection);
    }

    let mut stopped = Vec::new();
    for (user_id, aggregate) in groups {
        if !aggregate.is_expired(now, ttl) {
            continue;
        }
        let Some(username) = state.registry.clear_stale_typing(&user_id, now, ttl) else {
            continue;
        };

        let event = TypingEvent::stopped(user_id.clone(), username, now_ms());
        let delivery = broadcast::broadcast(state, &ServerEvent::Typing(event));
        info!(%user_id, delivered = delivery.delivered, "typing: expired stale typing state");
        stopped.push(user_id);
    }
    stopped
}

#[cfg(test)]
#[path = "expiry_test.rs"]
mod tests;
