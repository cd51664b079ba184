//! Declarative endpoint metadata

use std::fmt;

use axum::routing::MethodFilter;
use serde::Serialize;

/// How a handler is exposed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EndpointKind {
    /// Instantiated during discovery only to run `on_load()`
    Autoload,
    Rest,
    WebSocket,
    GraphQLField,
    /// REST endpoint that is also bound to a GraphQL field
    Multi,
}

impl EndpointKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointKind::Autoload => "AUTOLOAD",
            EndpointKind::Rest => "REST",
            EndpointKind::WebSocket => "WEBSOCKET",
            EndpointKind::GraphQLField => "GRAPHQL_FIELD",
            EndpointKind::Multi => "MULTI",
        }
    }

    /// Kinds that occupy a path on the HTTP router
    pub fn is_routed(&self) -> bool {
        matches!(
            self,
            EndpointKind::Rest | EndpointKind::WebSocket | EndpointKind::Multi
        )
    }

    /// Kinds that contribute a GraphQL field binding
    pub fn is_graphql(&self) -> bool {
        matches!(self, EndpointKind::GraphQLField | EndpointKind::Multi)
    }
}

impl fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP methods a REST or MULTI endpoint can listen on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }

    pub fn method_filter(&self) -> MethodFilter {
        match self {
            HttpMethod::Get => MethodFilter::GET,
            HttpMethod::Post => MethodFilter::POST,
            HttpMethod::Put => MethodFilter::PUT,
            HttpMethod::Patch => MethodFilter::PATCH,
            HttpMethod::Delete => MethodFilter::DELETE,
            HttpMethod::Head => MethodFilter::HEAD,
            HttpMethod::Options => MethodFilter::OPTIONS,
        }
    }

    /// Methods whose request body may be read by a handler
    pub fn carries_body(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }

    pub fn from_http(method: &axum::http::Method) -> Option<Self> {
        match *method {
            axum::http::Method::GET => Some(HttpMethod::Get),
            axum::http::Method::POST => Some(HttpMethod::Post),
            axum::http::Method::PUT => Some(HttpMethod::Put),
            axum::http::Method::PATCH => Some(HttpMethod::Patch),
            axum::http::Method::DELETE => Some(HttpMethod::Delete),
            axum::http::Method::HEAD => Some(HttpMethod::Head),
            axum::http::Method::OPTIONS => Some(HttpMethod::Options),
            _ => None,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Root operation type a GraphQL field hangs off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum GraphQLFieldKind {
    Query,
    Mutation,
}

impl GraphQLFieldKind {
    /// Name of the root type in the schema
    pub fn type_name(&self) -> &'static str {
        match self {
            GraphQLFieldKind::Query => "Query",
            GraphQLFieldKind::Mutation => "Mutation",
        }
    }
}

/// Field a GRAPHQL_FIELD or MULTI endpoint is bound to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct GraphQLField {
    pub name: String,
    pub kind: GraphQLFieldKind,
}

/// Immutable metadata describing how one handler is exposed.
///
/// Built with the kind-specific constructors and refined with the builder
/// methods, then handed to [`EndpointRegistry::register`](super::EndpointRegistry::register).
///
/// ```rust,ignore
/// let descriptor = EndpointDescriptor::multi("hello", GraphQLFieldKind::Query, "/hello")
///     .methods([HttpMethod::Get])
///     .debug_only();
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct EndpointDescriptor {
    pub kind: EndpointKind,
    pub http_methods: Vec<HttpMethod>,
    pub path: String,
    /// Empty, or entries equal to `""`, mean unversioned
    pub api_versions: Vec<String>,
    pub debug_only: bool,
    pub graphql_field: Option<GraphQLField>,
}

impl EndpointDescriptor {
    fn new(kind: EndpointKind, path: impl Into<String>) -> Self {
        Self {
            kind,
            http_methods: Vec::new(),
            path: path.into(),
            api_versions: Vec::new(),
            debug_only: false,
            graphql_field: None,
        }
    }

    pub fn autoload() -> Self {
        Self::new(EndpointKind::Autoload, "")
    }

    /// REST endpoint; listens on GET unless [`methods`](Self::methods) says otherwise
    pub fn rest(path: impl Into<String>) -> Self {
        Self::new(EndpointKind::Rest, path).methods([HttpMethod::Get])
    }

    pub fn websocket(path: impl Into<String>) -> Self {
        Self::new(EndpointKind::WebSocket, path)
    }

    pub fn graphql_field(name: impl Into<String>, kind: GraphQLFieldKind) -> Self {
        let mut descriptor = Self::new(EndpointKind::GraphQLField, "");
        descriptor.graphql_field = Some(GraphQLField {
            name: name.into(),
            kind,
        });
        descriptor
    }

    pub fn multi(
        field_name: impl Into<String>,
        field_kind: GraphQLFieldKind,
        path: impl Into<String>,
    ) -> Self {
        let mut descriptor = Self::new(EndpointKind::Multi, path).methods([HttpMethod::Get]);
        descriptor.graphql_field = Some(GraphQLField {
            name: field_name.into(),
            kind: field_kind,
        });
        descriptor
    }

    /// Replace the HTTP methods; duplicates are dropped, declaration order kept
    pub fn methods(mut self, methods: impl IntoIterator<Item = HttpMethod>) -> Self {
        self.http_methods.clear();
        for method in methods {
            if !self.http_methods.contains(&method) {
                self.http_methods.push(method);
            }
        }
        self
    }

    pub fn versions<I, S>(mut self, versions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.api_versions = versions.into_iter().map(Into::into).collect();
        self
    }

    pub fn debug_only(mut self) -> Self {
        self.debug_only = true;
        self
    }

    /// Version segments to expand the path over; `None` stands for unversioned
    pub fn version_segments(&self) -> Vec<Option<&str>> {
        if self.api_versions.is_empty() {
            return vec![None];
        }
        self.api_versions
            .iter()
            .map(|v| {
                let v = v.trim_matches('/');
                (!v.is_empty()).then_some(v)
            })
            .collect()
    }

    /// Checks the path invariant of routed kinds
    pub fn validate_path(&self) -> std::result::Result<(), &'static str> {
        if !self.kind.is_routed() {
            return Ok(());
        }
        if self.path.is_empty() {
            return Err("API path cannot be empty");
        }
        if !self.path.starts_with('/') {
            return Err("API path must start with a \"/\"");
        }
        validate_segments(&self.path)
    }
}

/// Captures must span a whole segment and carry a name; a `*` wildcard may
/// only be the last segment
fn validate_segments(path: &str) -> std::result::Result<(), &'static str> {
    let segments: Vec<&str> = path[1..].split('/').collect();
    let last = segments.len() - 1;

    for (index, segment) in segments.iter().enumerate() {
        let (marker, name) = match segment.chars().next() {
            Some(marker @ (':' | '*')) => (Some(marker), &segment[1..]),
            _ => (None, *segment),
        };
        if name.contains([':', '*']) {
            return Err("\":\" and \"*\" may only start a path segment");
        }
        match marker {
            Some(_) if name.is_empty() => return Err("path parameters need a name"),
            Some('*') if index != last => {
                return Err("a \"*\" wildcard must be the last path segment")
            }
            _ => {}
        }
    }
    Ok(())
}

/// Fully-qualified path: `prefix + ("/" + version)? + path`
pub fn construct_path(prefix: &str, version: Option<&str>, path: &str) -> String {
    match version {
        Some(version) => format!("{prefix}/{version}{path}"),
        None => format!("{prefix}{path}"),
    }
}
