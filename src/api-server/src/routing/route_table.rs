//! Route table built from discovered endpoints
//!
//! Every routed descriptor is expanded over its API versions and HTTP
//! methods. Entries are keyed by `(method, path)`; a later registration for
//! the same key replaces the earlier one. The table is turned into an axum
//! [`Router`] only once it is final, so overrides never reach axum.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ws::WebSocketUpgrade, ConnectInfo, Path, Request},
    http::HeaderMap,
    routing::{MethodFilter, MethodRouter},
    Router,
};
use serde::Serialize;
use tracing::{info, warn};

use super::websocket::WebSocketBinding;
use crate::discovery::{
    construct_path, DiscoveredEndpoints, EndpointKind, HandlerInstance, HttpMethod,
};
use crate::dispatcher::RestDispatcher;
use crate::error::DiscoveryError;
use crate::routes::public::reserved_paths;

/// What a route entry invokes
#[derive(Clone)]
pub enum RouteTarget {
    Rest(Arc<RestDispatcher>),
    WebSocket(Arc<WebSocketBinding>),
}

/// One `(method, path)` binding
#[derive(Clone)]
pub struct RouteEntry {
    pub method: HttpMethod,
    pub path: String,
    pub kind: EndpointKind,
    pub handler_type: &'static str,
    target: RouteTarget,
}

impl RouteEntry {
    pub fn target(&self) -> &RouteTarget {
        &self.target
    }
}

/// Serializable view of a route entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteSummary {
    pub method: HttpMethod,
    pub path: String,
    pub kind: EndpointKind,
    pub handler: &'static str,
}

/// Final set of HTTP routes, in first-registration order
#[derive(Clone, Default)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    /// Expand every REST, MULTI and WEBSOCKET endpoint under `prefix`
    pub fn build(
        discovered: &DiscoveredEndpoints,
        prefix: &str,
        debug: bool,
    ) -> Result<Self, DiscoveryError> {
        let mut table = Self::default();
        let reserved = reserved_paths(prefix);

        for endpoint in discovered.iter() {
            let descriptor = &endpoint.descriptor;
            let target = match &endpoint.instance {
                HandlerInstance::Rest(handler) if descriptor.kind.is_routed() => {
                    RouteTarget::Rest(Arc::new(RestDispatcher::new(
                        handler.clone(),
                        endpoint.handler_type,
                        debug,
                    )))
                }
                HandlerInstance::WebSocket(handler) => RouteTarget::WebSocket(Arc::new(
                    WebSocketBinding::new(handler.clone(), endpoint.handler_type),
                )),
                _ => continue,
            };

            let methods = match &target {
                RouteTarget::WebSocket(_) => vec![HttpMethod::Get],
                RouteTarget::Rest(_) => descriptor.http_methods.clone(),
            };

            for version in descriptor.version_segments() {
                let path = construct_path(prefix, version, &descriptor.path);
                if reserved.contains(&path) {
                    return Err(DiscoveryError::ReservedPath {
                        handler: endpoint.handler_type.to_string(),
                        path,
                    });
                }
                table.check_conflicts(&path, endpoint.handler_type)?;

                for method in &methods {
                    table.insert(RouteEntry {
                        method: *method,
                        path: path.clone(),
                        kind: descriptor.kind,
                        handler_type: endpoint.handler_type,
                        target: target.clone(),
                    });
                }
            }
        }

        Ok(table)
    }

    fn check_conflicts(&self, path: &str, handler_type: &str) -> Result<(), DiscoveryError> {
        for existing in &self.entries {
            if let Some(reason) = segment_conflict(&existing.path, path) {
                return Err(DiscoveryError::RouteConflict {
                    handler: handler_type.to_string(),
                    path: path.to_string(),
                    existing: existing.path.clone(),
                    existing_handler: existing.handler_type.to_string(),
                    reason,
                });
            }
        }
        Ok(())
    }

    fn insert(&mut self, entry: RouteEntry) {
        match self
            .entries
            .iter_mut()
            .find(|existing| existing.method == entry.method && existing.path == entry.path)
        {
            Some(existing) => {
                warn!(
                    method = %entry.method,
                    path = %entry.path,
                    replaced = existing.handler_type,
                    handler = entry.handler_type,
                    "Route registered twice, later registration wins"
                );
                *existing = entry;
            }
            None => {
                info!(
                    method = %entry.method,
                    path = %entry.path,
                    kind = %entry.kind,
                    handler = entry.handler_type,
                    "Registered route"
                );
                self.entries.push(entry);
            }
        }
    }

    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn find(&self, method: HttpMethod, path: &str) -> Option<&RouteEntry> {
        self.entries
            .iter()
            .find(|entry| entry.method == method && entry.path == path)
    }

    pub fn summaries(&self) -> Vec<RouteSummary> {
        self.entries
            .iter()
            .map(|entry| RouteSummary {
                method: entry.method,
                path: entry.path.clone(),
                kind: entry.kind,
                handler: entry.handler_type,
            })
            .collect()
    }

    /// Build the axum router serving every entry
    pub fn router(&self) -> Router {
        let mut by_path: Vec<(&str, Vec<&RouteEntry>)> = Vec::new();
        for entry in &self.entries {
            match by_path.iter_mut().find(|(path, _)| *path == entry.path) {
                Some((_, entries)) => entries.push(entry),
                None => by_path.push((&entry.path, vec![entry])),
            }
        }

        by_path
            .into_iter()
            .fold(Router::new(), |router, (path, entries)| {
                let method_router = entries.into_iter().fold(MethodRouter::new(), |acc, entry| {
                    attach(acc, entry.method.method_filter(), &entry.target)
                });
                router.route(path, method_router)
            })
    }
}

/// Two paths clash when they first differ at a segment where both capture,
/// e.g. `/plan/:id` and `/plan/:name`
fn segment_conflict(existing: &str, path: &str) -> Option<&'static str> {
    let captures = |segment: &str| segment.starts_with(':') || segment.starts_with('*');

    existing
        .split('/')
        .zip(path.split('/'))
        .find(|(left, right)| left != right)
        .filter(|(left, right)| captures(left) && captures(right))
        .map(|_| "differently named captures on the same path segment")
}

fn attach(method_router: MethodRouter, filter: MethodFilter, target: &RouteTarget) -> MethodRouter {
    match target {
        RouteTarget::Rest(dispatcher) => {
            let dispatcher = dispatcher.clone();
            method_router.on(
                filter,
                move |path: Option<Path<HashMap<String, String>>>, request: Request| async move {
                    let path_params = path.map(|Path(params)| params).unwrap_or_default();
                    dispatcher.dispatch(path_params, request).await
                },
            )
        }
        RouteTarget::WebSocket(binding) => {
            let binding = binding.clone();
            method_router.on(
                filter,
                move |ws: WebSocketUpgrade,
                      headers: HeaderMap,
                      connect_info: Option<ConnectInfo<SocketAddr>>| async move {
                    binding.upgrade(ws, &headers, connect_info.map(|ConnectInfo(addr)| addr))
                },
            )
        }
    }
}
