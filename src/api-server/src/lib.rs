//! Vertretungsplan API Server Library
//!
//! Endpoint discovery and multi-protocol dispatch for the substitution-plan
//! backend. Handlers are registered once with a descriptor and served over
//! REST, GraphQL and WebSocket through a uniform parameter and error layer.

pub mod config;
pub mod discovery;
pub mod dispatcher;
pub mod error;
pub mod graphql;
pub mod handlers;
pub mod middleware_layer;
pub mod params;
pub mod routes;
pub mod routing;
pub mod state;

// Re-export main types and functions for external use
pub use config::{ApiConfig, Config, GraphQLConfig, LegacyConfig, ServerConfig};
pub use discovery::{Discovery, EndpointDescriptor, EndpointRegistry};
pub use error::{ApiError, DiscoveryError, EndpointError, ErrorEnvelope, Result};
pub use params::{ArgumentLocation, Parameters};
pub use state::AppState;

use axum::{middleware, Router};
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::graphql::GraphQLSchema;
use crate::routing::RouteTable;

/// Discover the endpoints of `registry` within `scope` and assemble the
/// complete application router.
///
/// Any discovery or schema problem aborts with an error; nothing is served
/// from a partially discovered registry.
pub fn build_app(config: Config, registry: &EndpointRegistry, scope: &str) -> Result<Router> {
    config.validate()?;

    let discovered = Discovery::new(registry, &config).discover(scope)?;
    let routes = RouteTable::build(&discovered, &config.api_prefix(), config.debug)?;
    let schema = graphql::assemble(&config, &discovered)?;

    info!(
        routes = routes.len(),
        graphql_fields = schema.bindings().len(),
        debug = config.debug,
        "Application assembled"
    );

    let state = AppState::new(config, &discovered, &routes, &schema);
    Ok(build_router(state, &routes, schema))
}

/// Build the main application router with all middleware and routes
pub fn build_router(state: AppState, routes: &RouteTable, schema: GraphQLSchema) -> Router {
    let prefix = state.config.api_prefix();
    let graphql_path = routes::public::graphql_path(&prefix);
    let playground = state.config.debug && state.config.graphql.playground;

    let public_routes = routes::public::router(&prefix).with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(routes.router())
        .merge(graphql::endpoint::router(schema, &graphql_path, playground))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn(
                    middleware_layer::logging::logging_middleware,
                ))
                .layer(middleware::from_fn_with_state(
                    prefix,
                    middleware_layer::cors::preflight_middleware,
                ))
                .layer(middleware_layer::cors::cors_layer()),
        )
}
