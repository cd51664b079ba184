//! Request logging middleware

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

/// Requests slower than this are logged at `warn`
const SLOW_REQUEST_THRESHOLD: Duration = Duration::from_millis(1000);

/// Logs one line when a request starts and one when it completes; the level
/// follows the status class
pub async fn logging_middleware(request: Request<Body>, next: Next) -> Response {
    let start_time = Instant::now();
    let method = request.method().clone();
    let uri = request.uri().clone();
    let request_id = request_id(&request);

    // Matched path groups parameterised routes together
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched_path| matched_path.as_str())
        .unwrap_or_else(|| uri.path())
        .to_string();

    let client_ip = extract_client_ip(&request);
    let user_agent = request
        .headers()
        .get("user-agent")
        .and_then(|header| header.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let span = tracing::info_span!(
        "http_request",
        method = %method,
        path = %path,
        request_id = %request_id,
        client_ip = %client_ip,
        status = tracing::field::Empty,
        duration_ms = tracing::field::Empty,
    );
    span.in_scope(|| {
        info!(
            method = %method,
            uri = %uri,
            client_ip = %client_ip,
            user_agent = %user_agent,
            "Request started"
        )
    });

    let response = next.run(request).instrument(span.clone()).await;

    let duration = start_time.elapsed();
    let status = response.status();
    span.record("status", status.as_u16());
    span.record("duration_ms", duration.as_millis() as u64);

    let _guard = span.enter();
    match status {
        status if status.is_server_error() => {
            error!(
                method = %method,
                path = %path,
                status = %status,
                duration_ms = duration.as_millis(),
                "Request completed with server error"
            );
        }
        status if status.is_client_error() => {
            warn!(
                method = %method,
                path = %path,
                status = %status,
                duration_ms = duration.as_millis(),
                "Request completed with client error"
            );
        }
        _ => {
            info!(
                method = %method,
                path = %path,
                status = %status,
                duration_ms = duration.as_millis(),
                "Request completed successfully"
            );
        }
    }

    if duration > SLOW_REQUEST_THRESHOLD {
        warn!(
            method = %method,
            path = %path,
            duration_ms = duration.as_millis(),
            event_type = "slow_request",
            "Slow request detected"
        );
    }

    response
}

/// `X-Request-Id` set by the request-id layer, or a fresh UUID
fn request_id(request: &Request<Body>) -> String {
    request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// First `X-Forwarded-For` hop, then `X-Real-IP`, then the peer address
fn extract_client_ip(request: &Request<Body>) -> String {
    if let Some(first_ip) = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
    {
        return first_ip.trim().to_string();
    }

    if let Some(real_ip) = request
        .headers()
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
    {
        return real_ip.to_string();
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
