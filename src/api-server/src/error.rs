//! Error handling for the API server
//!
//! Three layers of failure exist:
//! - [`ApiError`] for process-level failures during boot (configuration, IO, discovery)
//! - [`DiscoveryError`] for fatal problems found while materialising endpoints
//! - [`EndpointError`] for request-scoped failures, rendered as an [`ErrorEnvelope`]

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

pub type Result<T> = std::result::Result<T, ApiError>;

/// Message returned for any failure when debug mode is off
pub const GENERIC_ERROR_MESSAGE: &str = "Internal Server Error. Please try again later.";

/// Main error type for the API server process
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Internal server error: {message}")]
    Internal { message: String },
}

impl ApiError {
    /// Create configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create a new internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the error type string for API responses
    pub fn error_type(&self) -> &'static str {
        match self {
            ApiError::Config(_) | ApiError::Configuration(_) => "configuration_error",
            ApiError::Discovery(_) => "discovery_error",
            ApiError::Io(_) => "io_error",
            ApiError::Internal { .. } => "internal_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!(
            error = %self,
            error_type = self.error_type(),
            "API error occurred"
        );

        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorEnvelope::generic()),
        )
            .into_response()
    }
}

/// Fatal errors raised while discovering endpoints and assembling the schema.
///
/// Any of these aborts startup; there is no partial boot.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Invalid path {path:?} for {handler}: {reason}")]
    InvalidPath {
        handler: String,
        path: String,
        reason: &'static str,
    },

    #[error("Handler {handler} is declared as {expected} but does not provide that capability")]
    MissingCapability {
        handler: String,
        expected: &'static str,
    },

    #[error("Failed to instantiate {handler}: {source}")]
    Instantiation {
        handler: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("on_load() of {handler} failed: {source}")]
    Autoload {
        handler: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Descriptor for {handler} is missing its GraphQL field binding")]
    MissingFieldBinding { handler: String },

    #[error("GraphQL field {parent}.{field} is bound by both {existing} and {duplicate}")]
    DuplicateFieldBinding {
        parent: &'static str,
        field: String,
        existing: String,
        duplicate: String,
    },

    #[error("GraphQL field {parent}.{field} bound by {handler} is not declared in any schema fragment")]
    UnknownField {
        parent: &'static str,
        field: String,
        handler: String,
    },

    #[error("Route {path} of {handler} is already served by the server itself")]
    ReservedPath { handler: String, path: String },

    #[error("Route {path} of {handler} conflicts with {existing} of {existing_handler}: {reason}")]
    RouteConflict {
        handler: String,
        path: String,
        existing: String,
        existing_handler: String,
        reason: &'static str,
    },

    #[error("Failed to parse schema fragment {fragment}: {message}")]
    SchemaParse { fragment: String, message: String },

    #[error("Schema fragment {fragment} redefines type {type_name}")]
    DuplicateType { fragment: String, type_name: String },

    #[error("Schema fragment {fragment} redefines field {type_name}.{field}")]
    DuplicateField {
        fragment: String,
        type_name: String,
        field: String,
    },

    #[error("Schema fragment {fragment}: {message}")]
    UnsupportedDefinition { fragment: String, message: String },

    #[error("Failed to read schema fragments from {dir}: {source}")]
    FragmentIo {
        dir: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to build executable schema: {0}")]
    SchemaBuild(String),
}

/// Request-scoped failures surfaced by handlers and the parameter abstraction
#[derive(Error, Debug)]
pub enum EndpointError {
    #[error("Argument {name:?} cannot be converted to {target}: {value:?}")]
    ArgumentType {
        name: String,
        target: &'static str,
        value: String,
    },

    #[error("Unable to transform body: {reason}")]
    UnsupportedMethod { reason: String },

    #[error("Malformed request body: {0}")]
    Body(#[from] serde_json::Error),

    #[error("Failed to read request: {0}")]
    Request(String),

    #[error("{0}")]
    Handler(#[from] anyhow::Error),
}

impl EndpointError {
    pub fn argument_type(
        name: impl Into<String>,
        target: &'static str,
        value: impl Into<String>,
    ) -> Self {
        Self::ArgumentType {
            name: name.into(),
            target,
            value: value.into(),
        }
    }

    pub fn unsupported_method(reason: impl Into<String>) -> Self {
        Self::UnsupportedMethod {
            reason: reason.into(),
        }
    }

    /// Name of the failure category reported as `errorKind` in debug mode
    pub fn kind(&self) -> &'static str {
        match self {
            EndpointError::ArgumentType { .. } => "ArgumentTypeError",
            EndpointError::UnsupportedMethod { .. } => "UnsupportedMethodError",
            EndpointError::Body(_) => "BodyError",
            EndpointError::Request(_) => "RequestError",
            EndpointError::Handler(_) => "HandlerError",
        }
    }

    /// Full error chain; handler errors include the captured backtrace if any
    pub fn trace(&self) -> String {
        match self {
            EndpointError::Handler(err) => format!("{err:?}"),
            other => {
                use std::error::Error as _;

                let mut trace = format!("{}: {}", other.kind(), other);
                let mut source = other.source();
                while let Some(cause) = source {
                    trace.push_str(&format!("\nCaused by: {cause}"));
                    source = cause.source();
                }
                trace
            }
        }
    }
}

/// Uniform failure body for REST and MULTI endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub stack_trace: Option<String>,
}

impl ErrorEnvelope {
    /// Production envelope without implementation details
    pub fn generic() -> Self {
        Self {
            message: GENERIC_ERROR_MESSAGE.to_string(),
            error_kind: None,
            stack_trace: None,
        }
    }

    /// Build the envelope for `error`, verbose only when `debug` is set
    pub fn from_error(error: &EndpointError, debug: bool) -> Self {
        if !debug {
            return Self::generic();
        }

        Self {
            message: error.to_string(),
            error_kind: Some(error.kind().to_string()),
            stack_trace: Some(error.trace()),
        }
    }
}
