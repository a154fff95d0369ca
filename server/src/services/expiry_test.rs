use super::*;
use crate::services::broadcast::OutboundFrame;
use crate::services::typing;
use crate::state::test_helpers::{assert_no_event, connect_ready, recv_event, test_app_state};
use tokio::sync::mpsc;
use tokio::time::{Duration, timeout};

async fn recv_within(rx: &mut mpsc::Receiver<OutboundFrame>, limit: Duration) -> ServerEvent {
    let frame = timeout(limit, rx.recv())
        .await
        .expect("frame receive timed out")
        .expect("channel closed");
    crate::state::test_helpers::decode_one(&frame.encode())
}

// =============================================================================
// SINGLE TICK
// =============================================================================

#[tokio::test]
async fn expire_stale_stops_user_once_after_ttl() {
    let state = test_app_state();
    let (_a, mut rx) = connect_ready(&state, "u2", "bob").await;
    let (_b, _rx_typist) = connect_ready(&state, "u1", "ada").await;
    let t0 = Instant::now();
    state.registry.mark_typing("u1", t0);

    assert!(expire_stale(&state, t0 + Duration::from_millis(3500)).is_empty());
    assert_eq!(expire_stale(&state, t0 + Duration::from_millis(3501)), vec!["u1".to_owned()]);

    let ServerEvent::Typing(stop) = recv_event(&mut rx).await else {
        panic!("expected typing stop");
    };
    assert_eq!(stop.user_id, "u1");
    assert_eq!(stop.username, "ada");
    assert!(!stop.is_typing);
    assert_eq!(stop.expires_in_ms, None);

    // Already clear on later ticks: no redundant stops.
    assert!(expire_stale(&state, t0 + Duration::from_secs(10)).is_empty());
    assert!(expire_stale(&state, t0 + Duration::from_secs(20)).is_empty());
    assert_no_event(&mut rx).await;
}

#[tokio::test]
async fn expire_stale_sends_one_stop_for_multi_tab_user() {
    let state = test_app_state();
    let (_a, mut rx) = connect_ready(&state, "u2", "bob").await;
    let (_b, _rx_b) = connect_ready(&state, "u1", "ada").await;
    let (_c, _rx_c) = connect_ready(&state, "u1", "ada").await;
    let t0 = Instant::now();
    state.registry.mark_typing("u1", t0);

    expire_stale(&state, t0 + Duration::from_secs(4));

    assert!(matches!(recv_event(&mut rx).await, ServerEvent::Typing(e) if !e.is_typing));
    assert_no_event(&mut rx).await;
    assert!(state.registry.connections_for("u1").iter().all(|c| !c.is_typing));
}

#[tokio::test]
async fn expire_stale_ignores_idle_users() {
    let state = test_app_state();
    let (_a, mut rx) = connect_ready(&state, "u1", "ada").await;

    assert!(expire_stale(&state, Instant::now() + Duration::from_secs(60)).is_empty());
    assert_no_event(&mut rx).await;
}

#[tokio::test]
async fn expire_stale_keeps_recently_pinged_user() {
    let state = test_app_state();
    let (_a, _rx) = connect_ready(&state, "u1", "ada").await;
    let t0 = Instant::now();
    state.registry.mark_typing("u1", t0);
    state.registry.mark_typing("u1", t0 + Duration::from_secs(3));

    assert!(expire_stale(&state, t0 + Duration::from_secs(5)).is_empty());
    assert!(state.registry.connections_for("u1")[0].is_typing);
}

// =============================================================================
// TASK
// =============================================================================

#[tokio::test(start_paused = true)]
async fn expiry_task_stops_typing_between_ttl_and_one_tick_later() {
    let state = test_app_state();
    let (_a, mut rx) = connect_ready(&state, "u2", "bob").await;
    let (_b, _rx_typist) = connect_ready(&state, "u1", "ada").await;

    let start = Instant::now();
    typing::ping(&state, "u1").expect("ping");
    assert!(matches!(recv_event(&mut rx).await, ServerEvent::Typing(e) if e.is_typing));

    let handle = spawn_expiry_task(state.clone()).expect("first spawn");

    let stop = recv_within(&mut rx, Duration::from_secs(5)).await;
    let elapsed = start.elapsed();
    assert!(matches!(stop, ServerEvent::Typing(ref e) if !e.is_typing && e.user_id == "u1"));
    assert!(elapsed > Duration::from_millis(3500), "stopped too early: {elapsed:?}");
    assert!(elapsed <= Duration::from_millis(3800), "stopped too late: {elapsed:?}");

    assert!(timeout(Duration::from_secs(3), rx.recv()).await.is_err(), "stop must be sent once");

    handle.shutdown().await;
}

#[tokio::test]
async fn spawn_expiry_task_is_idempotent() {
    let state = test_app_state();
    let first = spawn_expiry_task(state.clone());
    let second = spawn_expiry_task(state.clone());

    assert!(first.is_some());
    assert!(second.is_none());
    assert!(state.expiry_started.load(Ordering::SeqCst));

    if let Some(handle) = first {
        handle.shutdown().await;
    }
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_further_expiry() {
    let state = test_app_state();
    let (_a, mut rx) = connect_ready(&state, "u2", "bob").await;
    let (_b, _rx_typist) = connect_ready(&state, "u1", "ada").await;

    let handle = spawn_expiry_task(state.clone()).expect("spawn");
    handle.shutdown().await;

    state.registry.mark_typing("u1", Instant::now());
    tokio::time::advance(Duration::from_secs(10)).await;
    assert!(rx.try_recv().is_err(), "no stop after shutdown");
    assert!(state.registry.connections_for("u1")[0].is_typing);
}
