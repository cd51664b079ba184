//! Service-level routes that exist independently of discovery

use axum::{routing::get, Router};

use crate::{handlers, state::AppState};

pub const HEALTH_PATH: &str = "/health";
pub const INFO_PATH: &str = "/info";

/// `GET {prefix}`, or `/` without a prefix
pub fn ready_path(prefix: &str) -> &str {
    if prefix.is_empty() {
        "/"
    } else {
        prefix
    }
}

pub fn graphql_path(prefix: &str) -> String {
    format!("{prefix}/graphql")
}

/// Paths owned by the server; discovered endpoints may not claim them
pub fn reserved_paths(prefix: &str) -> Vec<String> {
    vec![
        ready_path(prefix).to_string(),
        graphql_path(prefix),
        HEALTH_PATH.to_string(),
        INFO_PATH.to_string(),
    ]
}

/// Readiness text under the API prefix plus health and info endpoints
pub fn router(prefix: &str) -> Router<AppState> {
    Router::new()
        .route(ready_path(prefix), get(handlers::health::api_ready))
        .route(HEALTH_PATH, get(handlers::health::liveness))
        .route(INFO_PATH, get(handlers::health::system_info))
}
