//! Streaming route — one long-lived text/event-stream response per tab.
//!
//! DESIGN
//! ======
//! The handler opens a session and returns an `Sse` response that drains the
//! connection's channel. The stream owns a `ConnectionGuard`, so when hyper
//! drops it (peer disconnect, server shutdown) or the channel closes (pruned
//! by a failed write), the connection is unregistered exactly once.
//!
//! Idle streams carry keep-alive comments. They keep proxies from cutting the
//! response and make a vanished peer show up as a failed write even when no
//! chat traffic is flowing.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::services::broadcast::OutboundFrame;
use crate::services::session::{self, ConnectionGuard};
use crate::state::AppState;

/// Interval between keep-alive comments on an idle stream.
pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamParams {
    pub user_id: Option<String>,
    pub username: Option<String>,
}

/// `GET /stream?userId=&username=` — open an event stream.
pub async fn handle_stream(
    State(state): State<AppState>,
    Query(params): Query<StreamParams>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>> + Send + 'static> {
    let identity = session::canonical_identity(params.user_id.as_deref(), params.username.as_deref());
    let (connection_id, rx) = session::open(&state, &identity);
    let guard = ConnectionGuard::new(state, connection_id);

    let events = frame_stream(rx, guard).map(|frame| Ok(to_sse_event(&frame)));
    Sse::new(events).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL))
}

/// Same bytes as `OutboundFrame::encode`: `event:` line, `data:` line, blank
/// line.
fn to_sse_event(frame: &OutboundFrame) -> Event {
    Event::default().event(frame.name).data(&*frame.data)
}

/// Yield queued frames until the channel closes. The guard lives as long as
/// the stream does.
fn frame_stream(
    rx: mpsc::Receiver<OutboundFrame>,
    guard: ConnectionGuard,
) -> impl Stream<Item = OutboundFrame> + Send + 'static {
    futures::stream::unfold((rx, guard), |(mut rx, guard)| async move {
        let frame = rx.recv().await?;
        Some((frame, (rx, guard)))
    })
}

#[cfg(test)]
#[path = "stream_test.rs"]
mod tests;
