//! CORS handling
//!
//! Browsers talk to the API from the school's web frontend on another
//! origin. Regular responses get their headers from [`cors_layer`]; every
//! `OPTIONS` request under the API prefix is answered directly with an empty
//! 204 by [`preflight_middleware`].

use std::time::Duration;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tower_http::cors::{Any, CorsLayer};

pub const MAX_AGE: Duration = Duration::from_secs(3600);

/// Permissive CORS for all non-preflight responses
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .max_age(MAX_AGE)
}

/// Answer `OPTIONS {prefix}/*` with 204 and no body
pub async fn preflight_middleware(
    State(prefix): State<String>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.method() == Method::OPTIONS && under_prefix(request.uri().path(), &prefix) {
        return preflight_response();
    }
    next.run(request).await
}

fn under_prefix(path: &str, prefix: &str) -> bool {
    prefix.is_empty()
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

fn preflight_response() -> Response {
    let mut response = StatusCode::NO_CONTENT.into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_MAX_AGE,
        HeaderValue::from(MAX_AGE.as_secs()),
    );
    response
}
