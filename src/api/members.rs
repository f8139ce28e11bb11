use crate::api::errors::error_response;
use crate::services::report;
use crate::state::AppState;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct ListQuery {
    guild_id: String,
    #[serde(default = "default_min_days")]
    min_days: i64,
}

fn default_min_days() -> i64 {
    1
}

#[derive(Debug, Deserialize)]
struct RevokeRequest {
    member_id: String,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/somnus/members/list", get(list))
        .route("/somnus/members/export", get(export))
        .route("/somnus/members/revoke", post(revoke))
}

async fn list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Value>, Response> {
    let guild_id = query.guild_id.trim();
    if guild_id.is_empty() {
        return Err(error_response(StatusCode::BAD_REQUEST, "guild_id required"));
    }
    if query.min_days < 0 {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "min_days must be >= 0",
        ));
    }
    let members = report::list_inactive(
        state.storage.clone(),
        state.platform.clone(),
        guild_id,
        query.min_days,
    )
    .await
    .map_err(|err| error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;
    Ok(Json(json!({
        "data": { "guild_id": guild_id, "min_days": query.min_days, "members": members }
    })))
}

async fn export(State(state): State<Arc<AppState>>) -> Result<Response, Response> {
    let csv = report::export_csv(state.storage.clone())
        .await
        .map_err(|err| error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;
    let headers = [
        (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
        (
            header::CONTENT_DISPOSITION,
            "attachment; filename=\"inactivity_export.csv\"",
        ),
    ];
    Ok((headers, csv).into_response())
}

async fn revoke(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RevokeRequest>,
) -> Result<Json<Value>, Response> {
    let member_id = payload.member_id.trim();
    if member_id.is_empty() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "member_id required",
        ));
    }
    let record = state.reconciler.revoke(member_id).await.map_err(|err| {
        let message = err.to_string();
        let status = if message.contains("not tracked") {
            StatusCode::NOT_FOUND
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        error_response(status, message)
    })?;
    Ok(Json(json!({
        "data": {
            "member_id": record.member_id,
            "guild_id": record.guild_id,
            "dormant": record.dormant,
        }
    })))
}
