use crate::api::errors::error_response;
use crate::services::report;
use crate::state::AppState;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct StatusQuery {
    guild_id: String,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/somnus/status", get(status))
}

async fn healthz() -> &'static str {
    "OK"
}

async fn status(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<Value>, Response> {
    let guild_id = query.guild_id.trim();
    if guild_id.is_empty() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "guild_id required",
        ));
    }
    let count = report::dormant_count(state.storage.clone(), guild_id)
        .await
        .map_err(|err| error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;
    let last_pass_at = {
        let storage = state.storage.clone();
        tokio::task::spawn_blocking(move || storage.get_meta("last_pass_at"))
            .await
            .ok()
            .and_then(|result| result.ok())
            .flatten()
            .and_then(|value| value.parse::<f64>().ok())
    };
    Ok(Json(json!({
        "data": {
            "guild_id": guild_id,
            "dormant_count": count,
            "last_pass_at": last_pass_at,
        }
    })))
}
