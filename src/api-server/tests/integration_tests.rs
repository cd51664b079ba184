//! Integration tests for the Vertretungsplan API Server
//!
//! These tests drive the assembled router end to end: discovery, REST and
//! GraphQL dispatch of the same handlers, error envelopes, CORS preflight
//! and the service-level routes.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use pretty_assertions::assert_eq;
use serde::Deserialize;
use serde_json::{json, Value};
use tower::ServiceExt;

use vp_api_server::{
    build_app,
    discovery::{
        respond, EndpointDescriptor, GraphQLFieldKind, GraphQLFieldResolver, Handler,
        HandlerResult, HttpMethod, RestHandler,
    },
    error::GENERIC_ERROR_MESSAGE,
    handlers::{self, animal::PET_RESPONSE, legacy::ERROR_WRONG_PASSWORD},
    ApiError, ArgumentLocation, Config, DiscoveryError, EndpointRegistry, Parameters,
};

/// Handler without a result, rendered as 204
#[derive(Default)]
struct SilentEndpoint;

impl Handler for SilentEndpoint {
    fn as_rest(self: Arc<Self>) -> Option<Arc<dyn RestHandler>> {
        Some(self)
    }
}

#[async_trait]
impl RestHandler for SilentEndpoint {
    async fn handle(&self, _params: &Parameters) -> HandlerResult {
        Ok(None)
    }
}

/// Handler that always fails
#[derive(Default)]
struct FailingEndpoint;

impl Handler for FailingEndpoint {
    fn as_rest(self: Arc<Self>) -> Option<Arc<dyn RestHandler>> {
        Some(self)
    }
}

#[async_trait]
impl RestHandler for FailingEndpoint {
    async fn handle(&self, _params: &Parameters) -> HandlerResult {
        Err(anyhow::anyhow!("substitution data unavailable").into())
    }
}

#[derive(Deserialize)]
struct Absence {
    teacher: String,
    lessons: u32,
}

/// Reads a path parameter and a JSON body
#[derive(Default)]
struct AbsenceEndpoint;

impl Handler for AbsenceEndpoint {
    fn as_rest(self: Arc<Self>) -> Option<Arc<dyn RestHandler>> {
        Some(self)
    }
}

#[async_trait]
impl RestHandler for AbsenceEndpoint {
    async fn handle(&self, params: &Parameters) -> HandlerResult {
        let class: String = params
            .get_argument("class", ArgumentLocation::Path)?
            .unwrap_or_default();
        let absence: Absence = params.get_request_body()?;
        respond(json!({
            "class": class,
            "teacher": absence.teacher,
            "lessons": absence.lessons,
        }))
    }
}

/// Standalone resolver for `Query.hello`, not reachable over REST
#[derive(Default)]
struct TimetableResolver;

impl Handler for TimetableResolver {
    fn as_graphql_field(self: Arc<Self>) -> Option<Arc<dyn GraphQLFieldResolver>> {
        Some(self)
    }
}

#[async_trait]
impl GraphQLFieldResolver for TimetableResolver {
    async fn resolve(&self, params: &Parameters) -> HandlerResult {
        let name: Option<String> =
            params.get_argument("name", ArgumentLocation::GraphQLArgument)?;
        respond(format!("Timetable for {}", name.unwrap_or_default()))
    }
}

/// MULTI handler whose REST and GraphQL paths both panic
#[derive(Default)]
struct CollapsingEndpoint;

impl Handler for CollapsingEndpoint {
    fn as_rest(self: Arc<Self>) -> Option<Arc<dyn RestHandler>> {
        Some(self)
    }
}

#[async_trait]
impl RestHandler for CollapsingEndpoint {
    async fn handle(&self, _params: &Parameters) -> HandlerResult {
        panic!("timetable index out of range")
    }
}

fn test_config(debug: bool) -> Config {
    let mut config = Config {
        debug,
        ..Config::default()
    };
    config.server.host = "127.0.0.1".to_string();
    config.server.port = 0;
    config.legacy.secure_hash = Some("s3c".to_string());
    config.legacy.password_hash = Some("pw".to_string());
    config
}

/// The shipped handlers plus the test endpoints above
fn create_test_app(debug: bool) -> Router {
    let config = test_config(debug);
    let mut registry = EndpointRegistry::new();
    handlers::register_all(&mut registry, &config);
    registry
        .register_default::<SilentEndpoint>(EndpointDescriptor::rest("/silent"))
        .register_default::<FailingEndpoint>(EndpointDescriptor::rest("/failing"))
        .register_default::<AbsenceEndpoint>(
            EndpointDescriptor::rest("/classes/:class/absences")
                .methods([HttpMethod::Post])
                .versions(["v1"]),
        );

    build_app(config, &registry, "").expect("application should assemble")
}

/// Only the given registrations, without the shipped handlers
fn create_app_with(debug: bool, register: impl FnOnce(&mut EndpointRegistry)) -> Router {
    let mut registry = EndpointRegistry::new();
    register(&mut registry);
    build_app(test_config(debug), &registry, "").expect("application should assemble")
}

/// Test helper to make HTTP requests to the API
async fn make_request(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let request_builder = Request::builder().method(method).uri(uri);

    let request = if let Some(body) = body {
        request_builder
            .header("Content-Type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap()
    } else {
        request_builder.body(Body::empty()).unwrap()
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();

    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();

    let body_json: Value = if body_bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body_bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body_bytes).into_owned()))
    };

    (status, body_json)
}

async fn graphql(app: &Router, query: &str) -> Value {
    let (status, body) = make_request(
        app,
        Method::POST,
        "/api/graphql",
        Some(json!({ "query": query })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body
}

#[tokio::test]
async fn test_api_ready() {
    let app = create_test_app(false);

    let (status, body) = make_request(&app, Method::GET, "/api", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!("API is ready"));
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_app(false);

    let (status, body) = make_request(&app, Method::GET, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "alive");
}

#[tokio::test]
async fn test_info_only_in_debug_mode() {
    let (status, _) = make_request(&create_test_app(false), Method::GET, "/info", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = make_request(&create_test_app(true), Method::GET, "/info", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["api_prefix"], "/api");
    assert!(body["routes"]
        .as_array()
        .unwrap()
        .iter()
        .any(|route| route["path"] == "/api/petAnimal"));
}

#[tokio::test]
async fn test_pet_animal_over_rest_and_graphql() {
    let app = create_test_app(true);

    for method in [Method::GET, Method::POST] {
        let (status, body) = make_request(&app, method, "/api/petAnimal", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!(PET_RESPONSE));
    }

    let body = graphql(&app, "mutation { petAnimal }").await;
    assert_eq!(body["data"]["petAnimal"], PET_RESPONSE);
}

#[tokio::test]
async fn test_hello_argument_over_rest_and_graphql() {
    let app = create_test_app(true);

    let (status, body) = make_request(&app, Method::GET, "/api/hello?name=Ada", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!("Hello Ada!"));

    let body = graphql(&app, r#"{ hello(name: "Ada") }"#).await;
    assert_eq!(body["data"]["hello"], "Hello Ada!");

    let body = graphql(&app, "{ hello }").await;
    assert_eq!(body["data"]["hello"], "Hello World!");
}

#[tokio::test]
async fn test_debug_only_endpoints_absent_in_production() {
    let app = create_test_app(false);

    let (status, _) = make_request(&app, Method::GET, "/api/petAnimal", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = make_request(&app, Method::GET, "/api/v1/wsdemo", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let body = graphql(&app, "mutation { petAnimal }").await;
    assert_eq!(body["data"]["petAnimal"], Value::Null);
}

#[tokio::test]
async fn test_websocket_route_registered_in_debug_mode() {
    let app = create_test_app(true);

    let (status, _) = make_request(&app, Method::GET, "/api/v1/wsdemo", None).await;

    assert_ne!(status, StatusCode::NOT_FOUND);
    assert_ne!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_unregistered_method_is_rejected() {
    let app = create_test_app(true);

    let (status, _) = make_request(&app, Method::DELETE, "/api/petAnimal", None).await;

    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_empty_result_is_no_content() {
    let app = create_test_app(false);

    let (status, body) = make_request(&app, Method::GET, "/api/silent", None).await;

    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);
}

#[tokio::test]
async fn test_error_envelope_in_production() {
    let app = create_test_app(false);

    let (status, body) = make_request(&app, Method::GET, "/api/failing", None).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "message": GENERIC_ERROR_MESSAGE }));
}

#[tokio::test]
async fn test_error_envelope_in_debug_mode() {
    let app = create_test_app(true);

    let (status, body) = make_request(&app, Method::GET, "/api/failing", None).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "substitution data unavailable");
    assert_eq!(body["errorKind"], "HandlerError");
    assert!(body["stackTrace"]
        .as_str()
        .unwrap()
        .contains("substitution data unavailable"));
}

#[tokio::test]
async fn test_path_parameter_and_json_body() {
    let app = create_test_app(false);

    let (status, body) = make_request(
        &app,
        Method::POST,
        "/api/v1/classes/7b/absences",
        Some(json!({ "teacher": "Mrs. Krüger", "lessons": 3 })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "class": "7b", "teacher": "Mrs. Krüger", "lessons": 3 })
    );

    // Only the versioned path is registered
    let (status, _) = make_request(&app, Method::POST, "/api/classes/7b/absences", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_body_is_reported() {
    let app = create_test_app(true);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/classes/7b/absences")
        .header("Content-Type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body: Value = serde_json::from_slice(
        &axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap(),
    )
    .unwrap();

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["errorKind"], "BodyError");
}

#[tokio::test]
async fn test_cors_preflight() {
    let app = create_test_app(false);

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/anything/at/all")
        .header(header::ORIGIN, "https://plan.example.org")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
}

#[tokio::test]
async fn test_cors_headers_on_regular_responses() {
    let app = create_test_app(false);

    let request = Request::builder()
        .method(Method::GET)
        .uri("/api")
        .header(header::ORIGIN, "https://plan.example.org")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
}

#[tokio::test]
async fn test_request_id_is_set() {
    let app = create_test_app(false);

    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_legacy_plan() {
    let app = create_test_app(false);

    let (status, body) = make_request(
        &app,
        Method::GET,
        "/api/legacy/vertretungsplan?ANZ=1&SEC=s3c&PW=pw",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let days: HashMap<String, Value> = serde_json::from_value(body).unwrap();
    assert_eq!(days.len(), 1);

    let (status, body) = make_request(
        &app,
        Method::GET,
        "/api/legacy/vertretungsplan?ANZ=1&SEC=s3c&PW=wrong",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "ERROR": ERROR_WRONG_PASSWORD }));
}

#[tokio::test]
async fn test_standalone_graphql_field() {
    let app = create_app_with(false, |registry| {
        registry.register_default::<TimetableResolver>(EndpointDescriptor::graphql_field(
            "hello",
            GraphQLFieldKind::Query,
        ));
    });

    let body = graphql(&app, r#"{ hello(name: "7b") }"#).await;
    assert_eq!(body["data"]["hello"], "Timetable for 7b");

    // Not exposed as a route
    let (status, _) = make_request(&app, Method::GET, "/api/hello", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[test]
fn test_graphql_field_without_resolver_is_rejected() {
    let mut registry = EndpointRegistry::new();
    registry.register_default::<SilentEndpoint>(EndpointDescriptor::graphql_field(
        "hello",
        GraphQLFieldKind::Query,
    ));

    let result = build_app(test_config(false), &registry, "");

    assert!(matches!(
        result,
        Err(ApiError::Discovery(DiscoveryError::MissingCapability { expected, .. }))
            if expected == "GraphQLFieldResolver"
    ));
}

#[tokio::test]
async fn test_handler_panic_is_reported_over_both_transports() {
    let app = create_app_with(false, |registry| {
        registry.register_default::<CollapsingEndpoint>(EndpointDescriptor::multi(
            "hello",
            GraphQLFieldKind::Query,
            "/boom",
        ));
    });

    let (status, body) = make_request(&app, Method::GET, "/api/boom", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "message": GENERIC_ERROR_MESSAGE }));

    let body = graphql(&app, "{ hello }").await;
    assert_eq!(body["data"]["hello"], Value::Null);
    assert!(body["errors"][0]["message"]
        .as_str()
        .unwrap()
        .contains("timetable index out of range"));
}
