pub mod search;
pub mod server;

use axum::{routing::get, Router};
use std::sync::Arc;

use crate::state::AppState;

/// API routes (static page fallback is added by main) / API 路由
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/search", get(search::search))
        .route("/api/health", get(server::health_check))
        .with_state(state)
}
