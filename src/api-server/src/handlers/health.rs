//! Service-level handlers mounted next to the discovered endpoints

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::state::AppState;

/// `GET {prefix}`
pub async fn api_ready() -> &'static str {
    "API is ready"
}

/// Simple liveness probe
pub async fn liveness(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "alive",
        "timestamp": chrono::Utc::now(),
        "uptime_seconds": state.uptime_seconds(),
    }))
}

/// Registered routes and GraphQL fields; debug mode only
pub async fn system_info(State(state): State<AppState>) -> impl IntoResponse {
    if !state.config.debug {
        return StatusCode::NOT_FOUND.into_response();
    }

    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "environment": &state.config.environment,
        "api_prefix": state.config.api_prefix(),
        "started_at": state.started_at,
        "routes": &*state.routes,
        "graphql_fields": &*state.graphql_fields,
        "skipped": &*state.skipped,
    }))
    .into_response()
}
