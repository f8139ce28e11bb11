// API routes, split per domain.
pub mod cleanup;
pub mod core;
pub mod errors;
pub mod members;
pub mod reconcile;
pub mod settings;

use crate::state::AppState;
use axum::Router;
use std::sync::Arc;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(core::router())
        .merge(reconcile::router())
        .merge(members::router())
        .merge(settings::router())
        .merge(cleanup::router())
        .with_state(state)
}
