use super::*;
use crate::state::test_helpers::{assert_no_event, connect_ready, recv_event, test_app_state};

#[tokio::test]
async fn ping_marks_every_tab_and_broadcasts_once() {
    let state = test_app_state();
    let (_a, mut rx_a) = connect_ready(&state, "u1", "ada").await;
    let (_b, mut rx_b) = connect_ready(&state, "u1", "ada").await;
    let (_c, mut rx_c) = connect_ready(&state, "u2", "bob").await;

    ping(&state, "u1").expect("ping");

    let tabs = state.registry.connections_for("u1");
    assert_eq!(tabs.len(), 2);
    assert!(tabs.iter().all(|c| c.is_typing && c.last_typing_at.is_some()));

    for rx in [&mut rx_a, &mut rx_b, &mut rx_c] {
        let ServerEvent::Typing(event) = recv_event(rx).await else {
            panic!("expected typing event");
        };
        assert_eq!(event.user_id, "u1");
        assert_eq!(event.username, "ada");
        assert!(event.is_typing);
        assert_eq!(event.expires_in_ms, Some(3500));
        assert_no_event(rx).await;
    }
}

#[tokio::test]
async fn repeated_pings_rebroadcast_every_time() {
    let state = test_app_state();
    let (_a, mut rx) = connect_ready(&state, "u2", "bob").await;

    ping(&state, "u1").expect("first ping");
    ping(&state, "u1").expect("second ping");

    assert!(matches!(recv_event(&mut rx).await, ServerEvent::Typing(e) if e.is_typing));
    assert!(matches!(recv_event(&mut rx).await, ServerEvent::Typing(e) if e.is_typing));
}

#[tokio::test]
async fn ping_for_user_without_connection_is_anonymous() {
    let state = test_app_state();
    let (_a, mut rx) = connect_ready(&state, "u2", "bob").await;

    let event = ping(&state, "ghost").expect("ping");

    assert_eq!(event.username, ANONYMOUS);
    assert!(matches!(recv_event(&mut rx).await, ServerEvent::Typing(e) if e.user_id == "ghost"));
}

#[tokio::test]
async fn blank_user_id_is_rejected_without_broadcast() {
    let state = test_app_state();
    let (_a, mut rx) = connect_ready(&state, "u2", "bob").await;

    assert_eq!(ping(&state, ""), Err(ChatError::EmptyUserId));
    assert_eq!(ping(&state, " \t "), Err(ChatError::EmptyUserId));
    assert_no_event(&mut rx).await;
}

#[tokio::test]
async fn ping_uses_configured_ttl() {
    let mut state = test_app_state();
    state.config.typing_ttl = std::time::Duration::from_millis(1200);
    let event = ping(&state, "u1").expect("ping");
    assert_eq!(event.expires_in_ms, Some(1200));
}
