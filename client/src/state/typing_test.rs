use super::*;

fn at(base: Instant, ms: u64) -> Instant {
    base + Duration::from_millis(ms)
}

/// Drive edits and 250 ms ticks over `[0, until_ms]`; return ping times.
fn run(edits: &[(u64, &str)], until_ms: u64) -> Vec<u64> {
    let base = Instant::now();
    let mut debounce = TypingDebounce::new();
    let mut pings = Vec::new();
    let mut pending = edits.iter().peekable();

    let mut t = 0;
    while t <= until_ms {
        while let Some((edit_ms, draft)) = pending.next_if(|(edit_ms, _)| *edit_ms <= t) {
            if debounce.on_edit(draft, at(base, *edit_ms)) {
                pings.push(*edit_ms);
            }
        }
        if t > 0 && debounce.on_tick(at(base, t)) {
            pings.push(t);
        }
        t += 250;
    }
    pings
}

// =============================================================
// Edits
// =============================================================

#[test]
fn first_non_empty_edit_pings_immediately() {
    let base = Instant::now();
    let mut debounce = TypingDebounce::new();
    assert!(debounce.on_edit("h", base));
    assert_eq!(debounce.phase(), TypingPhase::Typing);
}

#[test]
fn further_edits_in_session_do_not_ping() {
    let base = Instant::now();
    let mut debounce = TypingDebounce::new();
    assert!(debounce.on_edit("h", base));
    assert!(!debounce.on_edit("he", at(base, 100)));
    assert!(!debounce.on_edit("hel", at(base, 200)));
}

#[test]
fn whitespace_draft_does_not_start_session() {
    let base = Instant::now();
    let mut debounce = TypingDebounce::new();
    assert!(!debounce.on_edit("   ", base));
    assert_eq!(debounce.phase(), TypingPhase::NotTyping);
}

#[test]
fn clearing_draft_ends_session_silently_and_next_edit_pings() {
    let base = Instant::now();
    let mut debounce = TypingDebounce::new();
    assert!(debounce.on_edit("h", base));
    assert!(!debounce.on_edit("", at(base, 100)));
    assert_eq!(debounce.phase(), TypingPhase::NotTyping);
    assert!(debounce.on_edit("x", at(base, 200)));
}

// =============================================================
// Keepalive
// =============================================================

#[test]
fn keepalive_contract_edits_at_0_100_2600() {
    let pings = run(&[(0, "h"), (100, "he"), (2600, "hel")], 3000);
    assert_eq!(pings, vec![0, 2500]);
}

#[test]
fn keepalive_repeats_while_edits_continue() {
    let pings = run(&[(0, "a"), (2000, "ab"), (4000, "abc"), (6000, "abcd")], 8000);
    assert_eq!(pings, vec![0, 2500, 5000, 7500]);
}

#[test]
fn keepalive_stops_after_active_window_lapses() {
    let pings = run(&[(0, "h")], 10_000);
    // 2500 is still inside the 4 s window; nothing after it.
    assert_eq!(pings, vec![0, 2500]);
}

#[test]
fn idle_tick_returns_to_not_typing() {
    let base = Instant::now();
    let mut debounce = TypingDebounce::new();
    debounce.on_edit("h", base);
    assert!(!debounce.on_tick(at(base, 4000)));
    assert_eq!(debounce.phase(), TypingPhase::NotTyping);
}

#[test]
fn tick_without_any_edit_is_quiet() {
    let mut debounce = TypingDebounce::new();
    assert!(!debounce.on_tick(Instant::now()));
}

#[test]
fn reset_ends_session_and_stops_keepalive() {
    let base = Instant::now();
    let mut debounce = TypingDebounce::new();
    debounce.on_edit("hello", base);
    debounce.reset();
    assert_eq!(debounce.phase(), TypingPhase::NotTyping);
    assert!(!debounce.on_tick(at(base, 2500)));
}

#[test]
fn constants_keep_window_above_keepalive() {
    assert!(ACTIVE_WINDOW > KEEPALIVE_INTERVAL);
    assert_eq!(TICK_INTERVAL, Duration::from_millis(250));
}
