//! `POST {prefix}/graphql` and the optional GraphiQL page

use std::net::SocketAddr;

use async_graphql::http::GraphiQLSource;
use axum::{
    extract::{ConnectInfo, State},
    http::{HeaderMap, Method},
    response::Html,
    routing::post,
    Json, Router,
};
use tracing::info;

use super::wiring::GraphQLSchema;
use crate::params::RequestMeta;

/// Router serving the GraphQL endpoint under `path`
pub fn router(schema: GraphQLSchema, path: &str, playground: bool) -> Router {
    let mut method_router = post(graphql_handler);
    if playground {
        let endpoint = path.to_string();
        method_router = method_router.get(move || {
            let page = graphiql(&endpoint);
            async move { page }
        });
        info!(path, "GraphiQL enabled");
    }

    info!(path, "Registered GraphQL route");
    Router::new().route(path, method_router).with_state(schema)
}

async fn graphql_handler(
    State(schema): State<GraphQLSchema>,
    method: Method,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    Json(request): Json<async_graphql::Request>,
) -> Json<async_graphql::Response> {
    let meta = RequestMeta {
        method,
        headers,
        remote_addr: connect_info.map(|ConnectInfo(addr)| addr),
    };
    Json(schema.execute(request.data(meta)).await)
}

fn graphiql(endpoint: &str) -> Html<String> {
    Html(GraphiQLSource::build().endpoint(endpoint).finish())
}
