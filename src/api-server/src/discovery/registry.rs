//! Endpoint registration and discovery
//!
//! Handler types are registered explicitly together with their descriptor
//! and a factory. [`Discovery::discover`] then validates every registration
//! inside a module scope, instantiates the handlers and runs autoload hooks.
//! Any failure aborts startup.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use super::descriptor::{EndpointDescriptor, EndpointKind};
use super::handler::{GraphQLFieldResolver, Handler, RestHandler, WebSocketHandler};
use crate::config::Config;
use crate::error::DiscoveryError;

type Factory = Box<dyn Fn() -> anyhow::Result<Arc<dyn Handler>> + Send + Sync>;

struct Registration {
    descriptor: EndpointDescriptor,
    handler_type: &'static str,
    factory: Factory,
}

/// Explicit list of handler types known to the process
#[derive(Default)]
pub struct EndpointRegistry {
    registrations: Vec<Registration>,
}

impl EndpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register handler type `H`; `factory` runs once per discovery pass
    pub fn register<H, F>(&mut self, descriptor: EndpointDescriptor, factory: F) -> &mut Self
    where
        H: Handler,
        F: Fn() -> anyhow::Result<H> + Send + Sync + 'static,
    {
        self.registrations.push(Registration {
            descriptor,
            handler_type: std::any::type_name::<H>(),
            factory: Box::new(move || {
                factory().map(|handler| Arc::new(handler) as Arc<dyn Handler>)
            }),
        });
        self
    }

    /// Register a handler type constructed through [`Default`]
    pub fn register_default<H>(&mut self, descriptor: EndpointDescriptor) -> &mut Self
    where
        H: Handler + Default,
    {
        self.register(descriptor, || Ok(H::default()))
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}

/// Capability a discovered handler is exposed through
#[derive(Clone)]
pub enum HandlerInstance {
    /// Autoload handlers have already run; the instance is only kept alive
    Autoload(Arc<dyn Handler>),
    Rest(Arc<dyn RestHandler>),
    WebSocket(Arc<dyn WebSocketHandler>),
    GraphQLField(Arc<dyn GraphQLFieldResolver>),
}

/// A validated, instantiated endpoint
#[derive(Clone)]
pub struct DiscoveredEndpoint {
    pub descriptor: EndpointDescriptor,
    pub handler_type: &'static str,
    pub instance: HandlerInstance,
}

/// A registration left out because it is debug-only
#[derive(Debug, Clone, Serialize)]
pub struct SkippedEndpoint {
    pub handler_type: &'static str,
    pub kind: EndpointKind,
}

/// Result of a discovery pass, in registration order
#[derive(Clone, Default)]
pub struct DiscoveredEndpoints {
    pub endpoints: Vec<DiscoveredEndpoint>,
    pub skipped: Vec<SkippedEndpoint>,
}

impl DiscoveredEndpoints {
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DiscoveredEndpoint> {
        self.endpoints.iter()
    }

    pub fn of_kind(&self, kind: EndpointKind) -> impl Iterator<Item = &DiscoveredEndpoint> {
        self.endpoints
            .iter()
            .filter(move |endpoint| endpoint.descriptor.kind == kind)
    }

    pub fn contains(&self, handler_type: &str) -> bool {
        self.endpoints
            .iter()
            .any(|endpoint| endpoint.handler_type == handler_type)
    }
}

/// Discovery pass over an [`EndpointRegistry`]
pub struct Discovery<'a> {
    registry: &'a EndpointRegistry,
    debug: bool,
}

impl<'a> Discovery<'a> {
    pub fn new(registry: &'a EndpointRegistry, config: &Config) -> Self {
        Self {
            registry,
            debug: config.debug,
        }
    }

    /// Discover every registration whose type path starts with `scope`.
    ///
    /// An empty scope matches everything. Debug-only endpoints are validated
    /// but neither instantiated nor returned unless debug mode is on.
    pub fn discover(&self, scope: &str) -> Result<DiscoveredEndpoints, DiscoveryError> {
        let mut discovered = DiscoveredEndpoints::default();

        for registration in self
            .registry
            .registrations
            .iter()
            .filter(|registration| in_scope(registration.handler_type, scope))
        {
            let handler_type = registration.handler_type;
            let descriptor = &registration.descriptor;

            descriptor
                .validate_path()
                .map_err(|reason| DiscoveryError::InvalidPath {
                    handler: handler_type.to_string(),
                    path: descriptor.path.clone(),
                    reason,
                })?;

            if descriptor.kind.is_graphql() && descriptor.graphql_field.is_none() {
                return Err(DiscoveryError::MissingFieldBinding {
                    handler: handler_type.to_string(),
                });
            }

            if descriptor.debug_only && !self.debug {
                debug!(
                    handler = handler_type,
                    kind = %descriptor.kind,
                    "Skipping debug-only endpoint"
                );
                discovered.skipped.push(SkippedEndpoint {
                    handler_type,
                    kind: descriptor.kind,
                });
                continue;
            }

            let handler = (registration.factory)().map_err(|source| {
                DiscoveryError::Instantiation {
                    handler: handler_type.to_string(),
                    source,
                }
            })?;

            let instance = Self::bind(handler_type, descriptor.kind, handler)?;
            info!(handler = handler_type, kind = %descriptor.kind, "Discovered endpoint");

            discovered.endpoints.push(DiscoveredEndpoint {
                descriptor: descriptor.clone(),
                handler_type,
                instance,
            });
        }

        info!(
            scope,
            endpoints = discovered.len(),
            skipped = discovered.skipped.len(),
            "Endpoint discovery finished"
        );
        Ok(discovered)
    }

    fn bind(
        handler_type: &'static str,
        kind: EndpointKind,
        handler: Arc<dyn Handler>,
    ) -> Result<HandlerInstance, DiscoveryError> {
        let missing = |expected: &'static str| DiscoveryError::MissingCapability {
            handler: handler_type.to_string(),
            expected,
        };

        match kind {
            EndpointKind::Autoload => {
                let autoload = handler.as_autoload().ok_or_else(|| missing("AutoloadHandler"))?;
                autoload
                    .on_load()
                    .map_err(|source| DiscoveryError::Autoload {
                        handler: handler_type.to_string(),
                        source,
                    })?;
                Ok(HandlerInstance::Autoload(handler))
            }
            EndpointKind::Rest | EndpointKind::Multi => handler
                .as_rest()
                .map(HandlerInstance::Rest)
                .ok_or_else(|| missing("RestHandler")),
            EndpointKind::WebSocket => handler
                .as_websocket()
                .map(HandlerInstance::WebSocket)
                .ok_or_else(|| missing("WebSocketHandler")),
            EndpointKind::GraphQLField => handler
                .as_graphql_field()
                .map(HandlerInstance::GraphQLField)
                .ok_or_else(|| missing("GraphQLFieldResolver")),
        }
    }
}

fn in_scope(handler_type: &str, scope: &str) -> bool {
    if scope.is_empty() {
        return true;
    }
    handler_type
        .strip_prefix(scope)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
}
