//! Endpoint discovery
//!
//! Descriptors, handler capabilities and the registry that turns both into
//! live handler instances at boot.

pub mod descriptor;
pub mod handler;
pub mod registry;

pub use descriptor::{
    construct_path, EndpointDescriptor, EndpointKind, GraphQLField, GraphQLFieldKind, HttpMethod,
};
pub use handler::{
    respond, AutoloadHandler, GraphQLFieldResolver, Handler, HandlerResult, RestHandler,
    WebSocketHandler,
};
pub use registry::{
    DiscoveredEndpoint, DiscoveredEndpoints, Discovery, EndpointRegistry, HandlerInstance,
    SkippedEndpoint,
};
