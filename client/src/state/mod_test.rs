use super::*;

fn raw(event: &str, data: &str) -> RawEvent {
    RawEvent { event: event.to_owned(), data: data.to_owned() }
}

fn state() -> ClientState {
    ClientState::new(Identity { user_id: "me".into(), username: "Me".into() })
}

// =============================================================
// Dispatch
// =============================================================

#[test]
fn hello_adopts_server_identity() {
    let mut state = state();
    let applied = state.apply_raw(&raw("hello", r#"{"userId":"abc","username":"ada"}"#), Instant::now());
    assert_eq!(applied, Applied::Identity);
    assert_eq!(state.identity, Identity { user_id: "abc".into(), username: "ada".into() });
}

#[test]
fn hello_with_blank_field_is_ignored() {
    let mut state = state();
    let applied = state.apply_raw(&raw("hello", r#"{"userId":"abc","username":""}"#), Instant::now());
    assert_eq!(applied, Applied::Nothing);
    assert_eq!(state.identity.user_id, "me");
}

#[test]
fn message_is_appended() {
    let mut state = state();
    let applied = state.apply_raw(
        &raw("message", r#"{"id":"1","from":"bob","content":"hi","ts":5}"#),
        Instant::now(),
    );
    assert_eq!(applied, Applied::Message);
    assert_eq!(state.chat.len(), 1);
}

#[test]
fn typing_from_peer_updates_presence_but_own_is_ignored() {
    let mut state = state();
    let now = Instant::now();
    let peer = raw("typing", r#"{"userId":"bob","username":"Bob","isTyping":true,"expiresInMs":3500,"ts":1}"#);
    let own = raw("typing", r#"{"userId":"me","username":"Me","isTyping":true,"expiresInMs":3500,"ts":1}"#);

    assert_eq!(state.apply_raw(&peer, now), Applied::Presence);
    assert_eq!(state.apply_raw(&own, now), Applied::Nothing);
    assert_eq!(state.presence.typing_line().as_deref(), Some("Bob is typing…"));
}

#[test]
fn identity_change_from_hello_applies_to_later_typing() {
    let mut state = state();
    let now = Instant::now();
    state.apply_raw(&raw("hello", r#"{"userId":"bob","username":"Bob"}"#), now);
    let own = raw("typing", r#"{"userId":"bob","username":"Bob","isTyping":true}"#);
    assert_eq!(state.apply_raw(&own, now), Applied::Nothing);
}

// =============================================================
// Malformed input
// =============================================================

#[test]
fn malformed_json_is_dropped() {
    let mut state = state();
    assert_eq!(state.apply_raw(&raw("message", "{not json"), Instant::now()), Applied::Nothing);
    assert!(state.chat.is_empty());
}

#[test]
fn unknown_event_is_dropped() {
    let mut state = state();
    assert_eq!(state.apply_raw(&raw("cursor", "{}"), Instant::now()), Applied::Nothing);
}

#[test]
fn message_without_content_is_dropped() {
    let mut state = state();
    assert_eq!(state.apply_raw(&raw("message", r#"{"from":"bob"}"#), Instant::now()), Applied::Nothing);
    assert_eq!(state.apply_raw(&raw("message", r#"{"content":""}"#), Instant::now()), Applied::Nothing);
}

// =============================================================
// Connection status
// =============================================================

#[test]
fn status_transitions_and_labels() {
    let mut state = state();
    assert_eq!(state.status, ConnectionStatus::Disconnected);
    state.on_connected();
    assert_eq!(state.status.label(), "connected");

    state.apply_raw(
        &raw("typing", r#"{"userId":"bob","username":"Bob","isTyping":true}"#),
        Instant::now(),
    );
    state.on_disconnected();
    assert_eq!(state.status, ConnectionStatus::Reconnecting);
    assert!(state.presence.is_empty());
}
