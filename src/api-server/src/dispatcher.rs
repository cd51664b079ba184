//! Dispatchers bridging transports to handlers
//!
//! [`RestDispatcher`] wraps a REST handler for one route and turns its result
//! into an HTTP response. [`MultiFieldResolver`] lets the same handler answer
//! its GraphQL field, so both transports run identical code.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::Request,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use futures::FutureExt;
use serde_json::Value;
use tracing::{debug, error};

use crate::discovery::{GraphQLFieldResolver, HandlerResult, RestHandler};
use crate::error::{EndpointError, ErrorEnvelope};
use crate::params::Parameters;

/// Per-route adapter invoking a [`RestHandler`]
pub struct RestDispatcher {
    handler: Arc<dyn RestHandler>,
    handler_type: &'static str,
    debug: bool,
}

impl RestDispatcher {
    pub fn new(handler: Arc<dyn RestHandler>, handler_type: &'static str, debug: bool) -> Self {
        Self {
            handler,
            handler_type,
            debug,
        }
    }

    pub fn handler_type(&self) -> &'static str {
        self.handler_type
    }

    /// Run the handler for `request` and render the outcome
    pub async fn dispatch(
        &self,
        path_params: HashMap<String, String>,
        request: Request<Body>,
    ) -> Response {
        let result = match Parameters::from_request(request, path_params).await {
            Ok(params) => self.invoke(&params).await,
            Err(err) => Err(err),
        };
        self.render(result)
    }

    async fn invoke(&self, params: &Parameters) -> HandlerResult {
        debug!(handler = self.handler_type, method = %params.method(), "Dispatching request");

        catch_panic(self.handler_type, self.handler.handle(params)).await
    }

    /// `Some` becomes 200 with a JSON body, `None` (or JSON null) a bare 204,
    /// and errors a 500 carrying an [`ErrorEnvelope`].
    pub fn render(&self, result: HandlerResult) -> Response {
        match result {
            Ok(Some(Value::Null)) | Ok(None) => StatusCode::NO_CONTENT.into_response(),
            Ok(Some(value)) => (StatusCode::OK, Json(value)).into_response(),
            Err(err) => {
                error!(
                    handler = self.handler_type,
                    error_kind = err.kind(),
                    error = %err,
                    "Exception was thrown during handling"
                );
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorEnvelope::from_error(&err, self.debug)),
                )
                    .into_response()
            }
        }
    }
}

/// Await a handler invocation; a panic becomes an [`EndpointError::Handler`]
pub async fn catch_panic<F>(handler_type: &str, invocation: F) -> HandlerResult
where
    F: Future<Output = HandlerResult>,
{
    AssertUnwindSafe(invocation)
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| {
            let message = panic_message(panic.as_ref());
            error!(handler = handler_type, panic = message, "Handler panicked");
            Err(EndpointError::Handler(anyhow::anyhow!(
                "handler panicked: {message}"
            )))
        })
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic payload")
}

/// Resolves the GraphQL field of a MULTI endpoint through its REST handler
pub struct MultiFieldResolver {
    handler: Arc<dyn RestHandler>,
}

impl MultiFieldResolver {
    pub fn new(handler: Arc<dyn RestHandler>) -> Self {
        Self { handler }
    }
}

#[async_trait]
impl GraphQLFieldResolver for MultiFieldResolver {
    async fn resolve(&self, params: &Parameters) -> HandlerResult {
        self.handler.handle(params).await
    }
}
