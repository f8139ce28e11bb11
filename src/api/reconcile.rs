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

#[derive(Debug, Default, Deserialize)]
struct RunRequest {
    #[serde(default)]
    only_long_dormant: bool,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/somnus/reconcile/run", post(run))
}

/// Manual trigger. The caller always gets counts or an explicit failure;
/// a pass already in flight maps to 409.
async fn run(
    State(state): State<Arc<AppState>>,
    payload: Option<Json<RunRequest>>,
) -> Result<Json<Value>, Response> {
    let request = payload.map(|Json(value)| value).unwrap_or_default();
    let summary = state
        .reconciler
        .run_pass(request.only_long_dormant)
        .await
        .map_err(|err| {
            let message = err.to_string();
            let status = if message.contains("already in progress") {
                StatusCode::CONFLICT
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            error_response(status, message)
        })?;
    Ok(Json(json!({ "data": summary })))
}
