use crate::api::errors::error_response;
use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct InactiveDaysRequest {
    days: i64,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/somnus/settings", get(settings_info))
        .route("/somnus/settings/inactive-days", post(set_inactive_days))
        .route("/somnus/settings/autodelete/toggle", post(toggle_autodelete))
}

async fn settings_info(State(state): State<Arc<AppState>>) -> Json<Value> {
    let config = state.config_store.get().await;
    Json(json!({
        "data": {
            "inactive_days": config.reconcile.inactive_days,
            "interval_s": config.reconcile.interval_s,
            "auto_delete_enabled": config.cleanup.auto_delete_enabled,
            "delete_delay_s": config.cleanup.delay_s,
            "dormant_role": config.platform.dormant_role,
            "db_path": config.storage.db_path,
        }
    }))
}

async fn set_inactive_days(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<InactiveDaysRequest>,
) -> Result<Json<Value>, Response> {
    if payload.days < 1 {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "days must be >= 1",
        ));
    }
    let updated = state
        .config_store
        .update(|config| {
            config.reconcile.inactive_days = payload.days;
        })
        .await
        .map_err(|err| error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;
    Ok(Json(json!({
        "data": { "inactive_days": updated.reconcile.inactive_days }
    })))
}

async fn toggle_autodelete(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, Response> {
    let updated = state
        .config_store
        .update(|config| {
            config.cleanup.auto_delete_enabled = !config.cleanup.auto_delete_enabled;
        })
        .await
        .map_err(|err| error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;
    Ok(Json(json!({
        "data": { "auto_delete_enabled": updated.cleanup.auto_delete_enabled }
    })))
}
