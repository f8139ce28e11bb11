// Service entrypoint: config, tracing, router and the reconcile loop.
use axum::body::Body;
use axum::extract::State;
use axum::http::{Method, Request, StatusCode};
use axum::middleware::{from_fn_with_state, Next};
use axum::response::Response;
use somnus_server::api;
use somnus_server::api::errors::error_response;
use somnus_server::auth;
use somnus_server::config::Config;
use somnus_server::config_store::ConfigStore;
use somnus_server::services::reconciler::ReconcileScheduler;
use somnus_server::shutdown::shutdown_signal;
use somnus_server::state::AppState;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_store = ConfigStore::new(ConfigStore::override_path_default());
    let config = config_store.get().await;
    init_tracing(&config);

    let state = Arc::new(AppState::new(config_store.clone(), config.clone())?);

    let scheduler = ReconcileScheduler::new(config_store.clone(), state.reconciler.clone());
    scheduler.start();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let app = api::build_router(state.clone())
        .layer(from_fn_with_state(state.clone(), api_key_guard))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr = bind_address(&config);
    let listener = tokio::net::TcpListener::bind(addr.as_str()).await?;
    info!("somnus reconciler listening on http://{addr}");

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());
    if let Err(err) = server.await {
        warn!("server exited with error: {err}");
    }

    Ok(())
}

fn init_tracing(config: &Config) {
    let default_level = config.observability.log_level.trim();
    let default_level = if default_level.is_empty() {
        "info".to_string()
    } else {
        default_level.to_lowercase()
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn bind_address(config: &Config) -> String {
    // Env overrides keep containerized deployments simple.
    let host = std::env::var("SOMNUS_HOST").unwrap_or_else(|_| config.server.host.clone());
    let port = std::env::var("SOMNUS_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(config.server.port);
    format!("{host}:{port}")
}

async fn api_key_guard(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    if request.method() == Method::OPTIONS {
        return Ok(next.run(request).await);
    }
    if !auth::is_admin_path(request.uri().path()) {
        return Ok(next.run(request).await);
    }
    let config = state.config_store.get().await;
    // No configured key means an open instance (trusted network).
    let Some(expected) = config.security.api_key() else {
        return Ok(next.run(request).await);
    };
    let provided = auth::extract_api_key(request.headers()).unwrap_or_default();
    if provided == expected {
        Ok(next.run(request).await)
    } else {
        Ok(error_response(StatusCode::UNAUTHORIZED, "invalid api key"))
    }
}
