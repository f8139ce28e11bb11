use crate::api::errors::error_response;
use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct ScheduleRequest {
    channel_id: String,
    message_id: String,
}

#[derive(Debug, Deserialize)]
struct CancelRequest {
    channel_id: String,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/somnus/cleanup/schedule", post(schedule))
        .route("/somnus/cleanup/cancel", post(cancel))
}

/// Called by the command frontend after it posts a report message, so the
/// previous report in the channel gets cleaned up shortly after.
async fn schedule(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ScheduleRequest>,
) -> Result<Json<Value>, Response> {
    let channel_id = payload.channel_id.trim();
    let message_id = payload.message_id.trim();
    if channel_id.is_empty() || message_id.is_empty() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "channel_id and message_id required",
        ));
    }
    state.cleanup.schedule(channel_id, message_id).await;
    Ok(Json(json!({
        "data": { "channel_id": channel_id, "pending": state.cleanup.pending_count() }
    })))
}

async fn cancel(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CancelRequest>,
) -> Result<Json<Value>, Response> {
    let channel_id = payload.channel_id.trim();
    if channel_id.is_empty() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "channel_id required",
        ));
    }
    let cancelled = state.cleanup.cancel(channel_id);
    Ok(Json(json!({
        "data": { "channel_id": channel_id, "cancelled": cancelled }
    })))
}
