//! "Hello" demo endpoints
//!
//! `hello` is served both as `GET {prefix}/hello` and as the GraphQL query
//! field `hello`. The WebSocket demo greets on connect and echoes text frames.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::discovery::{
    respond, EndpointDescriptor, GraphQLFieldKind, Handler, HandlerResult, HttpMethod,
    RestHandler, WebSocketHandler,
};
use crate::params::{ArgumentLocation, Parameters};
use crate::routing::{WsCloseReason, WsSession};

pub const GREETING: &str = "Hey from Hello plugin!";

/// Greets the `name` argument over REST and GraphQL
#[derive(Debug, Default)]
pub struct HelloMultiEndpoint;

impl HelloMultiEndpoint {
    pub fn descriptor() -> EndpointDescriptor {
        EndpointDescriptor::multi("hello", GraphQLFieldKind::Query, "/hello")
            .methods([HttpMethod::Get])
            .debug_only()
    }
}

impl Handler for HelloMultiEndpoint {
    fn as_rest(self: Arc<Self>) -> Option<Arc<dyn RestHandler>> {
        Some(self)
    }
}

#[async_trait]
impl RestHandler for HelloMultiEndpoint {
    async fn handle(&self, params: &Parameters) -> HandlerResult {
        let name: String =
            params.get_argument_or_default("name", "World".to_string(), ArgumentLocation::Query)?;
        respond(format!("Hello {name}!"))
    }
}

/// Debug WebSocket at `/v1/wsdemo`
#[derive(Debug, Default)]
pub struct HelloWebSocketEndpoint;

impl HelloWebSocketEndpoint {
    pub fn descriptor() -> EndpointDescriptor {
        EndpointDescriptor::websocket("/wsdemo")
            .versions(["v1"])
            .debug_only()
    }
}

impl Handler for HelloWebSocketEndpoint {
    fn as_websocket(self: Arc<Self>) -> Option<Arc<dyn WebSocketHandler>> {
        Some(self)
    }
}

#[async_trait]
impl WebSocketHandler for HelloWebSocketEndpoint {
    async fn on_connect(&self, session: &WsSession) {
        info!(host = session.host(), "Someone connected");
        session.send(GREETING);
    }

    async fn on_message(&self, session: &WsSession, message: String) {
        info!(%message, "Received message, reply with echo message");
        session.send(message);
    }

    async fn on_binary_message(&self, _session: &WsSession, data: Vec<u8>) {
        info!(bytes = data.len(), "Received binary message");
    }

    async fn on_close(&self, session: &WsSession, reason: Option<WsCloseReason>) {
        info!(host = session.host(), reason = ?reason, "Connection closed");
    }

    async fn on_error(&self, session: &WsSession, error: &axum::Error) {
        info!(host = session.host(), %error, "Connection encountered an error");
    }
}
