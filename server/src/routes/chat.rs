//! Chat routes — message send and typing ping.
//!
//! Both are plain request/response calls; their effect reaches clients only
//! through the event streams.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;

use crate::services::chat::{self as chat_svc, ChatError};
use crate::services::typing;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendParams {
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SendBody {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingBody {
    #[serde(default)]
    pub user_id: String,
}

type ApiError = (StatusCode, Json<serde_json::Value>);

pub(crate) fn chat_error_to_status(err: &ChatError) -> StatusCode {
    match err {
        ChatError::EmptyUserId | ChatError::EmptyContent => StatusCode::BAD_REQUEST,
    }
}

fn error_response(err: ChatError) -> ApiError {
    let body = serde_json::json!({ "code": err.error_code(), "message": err.to_string() });
    (chat_error_to_status(&err), Json(body))
}

/// `POST /send?userId=` — broadcast a chat message.
pub async fn send_message(
    State(state): State<AppState>,
    Query(params): Query<SendParams>,
    Json(body): Json<SendBody>,
) -> Result<StatusCode, ApiError> {
    chat_svc::send_message(&state, params.user_id.as_deref(), &body.content).map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /typing` — record a typing ping and broadcast `typing(true)`.
pub async fn typing_ping(State(state): State<AppState>, Json(body): Json<TypingBody>) -> Result<StatusCode, ApiError> {
    typing::ping(&state, &body.user_id).map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[path = "chat_test.rs"]
mod tests;
