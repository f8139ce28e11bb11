use axum::http::HeaderMap;

/// Admin routes live under `/somnus/`; the liveness probe stays public.
pub fn is_admin_path(path: &str) -> bool {
    path == "/somnus" || path.starts_with("/somnus/")
}

pub fn extract_api_key(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get("x-api-key").and_then(|v| v.to_str().ok()) {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            return Some(trimmed.to_string());
        }
    }
    let authorization = headers.get("authorization").and_then(|v| v.to_str().ok())?;
    let token = authorization.strip_prefix("Bearer ")?;
    let trimmed = token.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn admin_path_matches_prefix_only() {
        assert!(is_admin_path("/somnus/reconcile/run"));
        assert!(is_admin_path("/somnus"));
        assert!(!is_admin_path("/healthz"));
        assert!(!is_admin_path("/somnusish"));
    }

    #[test]
    fn api_key_prefers_dedicated_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_static("  secret "));
        headers.insert("authorization", HeaderValue::from_static("Bearer other"));
        assert_eq!(extract_api_key(&headers).as_deref(), Some("secret"));
    }

    #[test]
    fn api_key_falls_back_to_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer token"));
        assert_eq!(extract_api_key(&headers).as_deref(), Some("token"));
        headers.insert("authorization", HeaderValue::from_static("Basic dXNlcg=="));
        assert_eq!(extract_api_key(&headers), None);
    }
}
