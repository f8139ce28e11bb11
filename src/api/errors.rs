use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use uuid::Uuid;

/// Unified error payload: `{ ok, error { code, message, status, trace_id },
/// detail { message } }`. The trace id shows up in logs and responses alike.
pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let message = message.into();
    let trace_id = format!("err_{}", Uuid::new_v4().simple());
    let payload: Value = json!({
        "ok": false,
        "error": {
            "code": default_error_code(status),
            "message": message,
            "status": status.as_u16(),
            "trace_id": trace_id,
        },
        "detail": { "message": message },
    });
    (status, Json(payload)).into_response()
}

fn default_error_code(status: StatusCode) -> &'static str {
    match status {
        StatusCode::BAD_REQUEST => "BAD_REQUEST",
        StatusCode::UNAUTHORIZED => "UNAUTHORIZED",
        StatusCode::FORBIDDEN => "FORBIDDEN",
        StatusCode::NOT_FOUND => "NOT_FOUND",
        StatusCode::CONFLICT => "CONFLICT",
        StatusCode::TOO_MANY_REQUESTS => "RATE_LIMITED",
        StatusCode::SERVICE_UNAVAILABLE => "SERVICE_UNAVAILABLE",
        _ if status.is_server_error() => "INTERNAL_ERROR",
        _ => "REQUEST_ERROR",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn error_response_carries_unified_fields() {
        let response = error_response(StatusCode::CONFLICT, "pass already running");
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read response body");
        let payload: Value = serde_json::from_slice(&body).expect("parse response json");
        assert_eq!(payload["ok"], json!(false));
        assert_eq!(payload["error"]["code"], json!("CONFLICT"));
        assert_eq!(payload["error"]["status"], json!(409));
        assert_eq!(payload["detail"]["message"], json!("pass already running"));
        assert!(payload["error"]["trace_id"]
            .as_str()
            .unwrap_or_default()
            .starts_with("err_"));
    }
}
