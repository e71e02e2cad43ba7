//! Render endpoint handlers.

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

use crate::error::PlacardError;
use crate::pipeline::{API_KEY_PARAM, RenderRequest};

use super::super::state::AppState;

/// Handle GET /update-canvas - render a template with query substitutions as PNG.
///
/// The key is checked before anything else; a request with no substitutions
/// left after removing `apikey` and `dbtemplate` is rejected without a
/// template fetch.
pub async fn update_canvas(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if !state.authorize(query.get(API_KEY_PARAM).map(String::as_str)) {
        warn!("render request rejected: invalid API key");
        let err = PlacardError::Auth("Invalid API key".to_string());
        return Err((err.status_code(), err.to_string()));
    }

    let request = RenderRequest::from_query(query);
    let png = state
        .pipeline
        .run(request)
        .await
        .map_err(|failure| (failure.status_code(), failure.error.to_string()))?;

    Ok(([(header::CONTENT_TYPE, "image/png")], png))
}

/// Handle GET /health.
pub async fn health() -> &'static str {
    "ok"
}
