//! Handler capabilities
//!
//! A registered handler implements [`Handler`] and overrides the capability
//! accessors matching the kinds it can be exposed as. Discovery checks that
//! the capability requested by the descriptor is actually provided.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::error::EndpointError;
use crate::params::Parameters;
use crate::routing::{WsCloseReason, WsSession};

/// Outcome of a REST or GraphQL invocation; `Ok(None)` means "no content"
pub type HandlerResult = Result<Option<Value>, EndpointError>;

/// Serialize `value` as a handler result
pub fn respond<T: Serialize>(value: T) -> HandlerResult {
    Ok(Some(serde_json::to_value(value)?))
}

/// Capability query implemented by every registered handler type
pub trait Handler: Send + Sync + 'static {
    fn as_autoload(&self) -> Option<&dyn AutoloadHandler> {
        None
    }

    fn as_rest(self: Arc<Self>) -> Option<Arc<dyn RestHandler>> {
        None
    }

    fn as_websocket(self: Arc<Self>) -> Option<Arc<dyn WebSocketHandler>> {
        None
    }

    fn as_graphql_field(self: Arc<Self>) -> Option<Arc<dyn GraphQLFieldResolver>> {
        None
    }
}

/// Runs once during discovery, before any traffic is served
pub trait AutoloadHandler: Send + Sync {
    fn on_load(&self) -> anyhow::Result<()>;
}

/// Serves REST requests; MULTI endpoints also serve their GraphQL field with it
#[async_trait]
pub trait RestHandler: Send + Sync + 'static {
    async fn handle(&self, params: &Parameters) -> HandlerResult;
}

/// Resolves a single Query or Mutation field
#[async_trait]
pub trait GraphQLFieldResolver: Send + Sync + 'static {
    async fn resolve(&self, params: &Parameters) -> HandlerResult;
}

/// Lifecycle callbacks for one WebSocket path.
///
/// All callbacks default to doing nothing.
#[async_trait]
pub trait WebSocketHandler: Send + Sync + 'static {
    async fn on_connect(&self, _session: &WsSession) {}

    async fn on_message(&self, _session: &WsSession, _message: String) {}

    async fn on_binary_message(&self, _session: &WsSession, _data: Vec<u8>) {}

    async fn on_close(&self, _session: &WsSession, _reason: Option<WsCloseReason>) {}

    async fn on_error(&self, _session: &WsSession, _error: &axum::Error) {}
}
