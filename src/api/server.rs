use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::state::AppState;

/// GET /api/health - 健康检查（含后端连通性）
pub async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    let backend = &state.services.backend;
    match backend.ping().await {
        Ok(info) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "backend": backend.kind(),
                "cluster": info.name,
                "version": info.version,
                "build_time": env!("BUILD_TIME"),
            })),
        ),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unavailable",
                    "backend": backend.kind(),
                    "error": e.to_string(),
                })),
            )
        }
    }
}
