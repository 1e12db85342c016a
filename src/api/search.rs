use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub name: Option<String>,
}

/// GET /search?name= - 按姓名搜索员工
pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Response {
    let name = match params.name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => name,
        _ => {
            return (StatusCode::BAD_REQUEST, "Query parameter 'name' is required").into_response();
        }
    };

    match state.services.queries.search_by_field(&state.collection, "name", name).await {
        Ok(hits) => Json(hits).into_response(),
        Err(e) if e.is_validation() => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
        Err(e) => {
            tracing::error!("Error searching by name: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Error searching by name").into_response()
        }
    }
}
