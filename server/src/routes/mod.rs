//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! Three chat endpoints plus a health check. `/stream` is the only long-lived
//! response; `/send` and `/typing` return as soon as the broadcast is queued.

pub mod chat;
pub mod stream;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the application router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/stream", get(stream::handle_stream))
        .route("/send", post(chat::send_message))
        .route("/typing", post(chat::typing_ping))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
