//! Transport-independent access to request arguments
//!
//! Handlers never see the axum request or the GraphQL resolver context
//! directly; both are wrapped in a [`Parameters`] value built fresh for every
//! dispatch.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use axum::{
    body::{Body, Bytes},
    extract::{ConnectInfo, Request},
    http::{header, request::Parts, HeaderMap, Method},
};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::discovery::HttpMethod;
use crate::error::EndpointError;

/// Upper bound for request bodies read by the dispatcher
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Transport a request arrived through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestSource {
    Rest,
    GraphQL,
}

/// Where an argument is looked up.
///
/// GraphQL-sourced requests ignore the location and always read the field
/// arguments, so a MULTI handler written against `Query` works unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentLocation {
    Path,
    Query,
    Form,
    GraphQLArgument,
}

/// HTTP-level facts about the request carrying a GraphQL operation
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    pub method: Method,
    pub headers: HeaderMap,
    pub remote_addr: Option<SocketAddr>,
}

impl RequestMeta {
    pub fn from_parts(parts: &Parts) -> Self {
        Self {
            method: parts.method.clone(),
            headers: parts.headers.clone(),
            remote_addr: parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| *addr),
        }
    }
}

/// Per-request argument accessor handed to every handler
#[derive(Debug)]
pub struct Parameters {
    source: RequestSource,
    meta: RequestMeta,
    path_params: HashMap<String, String>,
    query_params: HashMap<String, String>,
    form_params: HashMap<String, String>,
    body: Bytes,
    graphql_args: serde_json::Map<String, Value>,
}

enum RawArgument<'a> {
    Text(&'a str),
    Typed(&'a Value),
}

impl Parameters {
    /// Build REST parameters from an already split request
    pub fn rest(parts: &Parts, path_params: HashMap<String, String>, body: Bytes) -> Self {
        let query_params = parts
            .uri
            .query()
            .map(|query| parse_urlencoded(query.as_bytes()))
            .unwrap_or_default();

        let is_form = parts
            .headers
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("application/x-www-form-urlencoded"));
        let form_params = if is_form {
            parse_urlencoded(&body)
        } else {
            HashMap::new()
        };

        Self {
            source: RequestSource::Rest,
            meta: RequestMeta::from_parts(parts),
            path_params,
            query_params,
            form_params,
            body,
            graphql_args: serde_json::Map::new(),
        }
    }

    /// Read the body of `request` and build REST parameters from it
    pub async fn from_request(
        request: Request<Body>,
        path_params: HashMap<String, String>,
    ) -> Result<Self, EndpointError> {
        let (parts, body) = request.into_parts();
        let body = axum::body::to_bytes(body, MAX_BODY_BYTES)
            .await
            .map_err(|e| EndpointError::Request(e.to_string()))?;
        Ok(Self::rest(&parts, path_params, body))
    }

    /// Build parameters for a GraphQL field resolution
    pub fn graphql(meta: Option<&RequestMeta>, args: serde_json::Map<String, Value>) -> Self {
        Self {
            source: RequestSource::GraphQL,
            meta: meta.cloned().unwrap_or_default(),
            path_params: HashMap::new(),
            query_params: HashMap::new(),
            form_params: HashMap::new(),
            body: Bytes::new(),
            graphql_args: args,
        }
    }

    pub fn source(&self) -> RequestSource {
        self.source
    }

    /// HTTP method of the underlying request (always POST for GraphQL)
    pub fn method(&self) -> &Method {
        &self.meta.method
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.meta
            .headers
            .get(name)
            .and_then(|value| value.to_str().ok())
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.header(header::USER_AGENT.as_str())
    }

    /// Client address, preferring the first `X-Forwarded-For` hop
    pub fn remote_ip(&self) -> Option<IpAddr> {
        self.header("x-forwarded-for")
            .and_then(|value| value.split(',').next())
            .and_then(|first| first.trim().parse().ok())
            .or_else(|| self.meta.remote_addr.map(|addr| addr.ip()))
    }

    /// Look up `name` and coerce it to `T`.
    ///
    /// Returns `Ok(None)` when no value is present and
    /// [`EndpointError::ArgumentType`] when a value exists but cannot be
    /// coerced.
    pub fn get_argument<T: FromArgument>(
        &self,
        name: &str,
        location: ArgumentLocation,
    ) -> Result<Option<T>, EndpointError> {
        match self.lookup(name, location) {
            None => Ok(None),
            Some(RawArgument::Text(raw)) => T::from_text(raw)
                .map(Some)
                .ok_or_else(|| EndpointError::argument_type(name, T::TYPE_NAME, raw)),
            Some(RawArgument::Typed(Value::Null)) => Ok(None),
            Some(RawArgument::Typed(value)) => T::from_value(value)
                .map(Some)
                .ok_or_else(|| EndpointError::argument_type(name, T::TYPE_NAME, value.to_string())),
        }
    }

    /// Like [`get_argument`](Self::get_argument), substituting `default` only
    /// when the value is absent. Coercion failures still raise.
    pub fn get_argument_or_default<T: FromArgument>(
        &self,
        name: &str,
        default: T,
        location: ArgumentLocation,
    ) -> Result<T, EndpointError> {
        Ok(self.get_argument(name, location)?.unwrap_or(default))
    }

    /// Deserialize the JSON request body.
    ///
    /// Only REST requests sent with POST, PUT or PATCH carry a body.
    pub fn get_request_body<T: DeserializeOwned>(&self) -> Result<T, EndpointError> {
        if self.source == RequestSource::GraphQL {
            return Err(EndpointError::unsupported_method(
                "GraphQL requests carry no request body for handlers",
            ));
        }

        match HttpMethod::from_http(&self.meta.method) {
            Some(method) if method.carries_body() => Ok(serde_json::from_slice(&self.body)?),
            _ => Err(EndpointError::unsupported_method(format!(
                "Only HTTP Methods POST, PUT and PATCH are allowed, got {}",
                self.meta.method
            ))),
        }
    }

    fn lookup(&self, name: &str, location: ArgumentLocation) -> Option<RawArgument<'_>> {
        match self.source {
            RequestSource::GraphQL => self.graphql_args.get(name).map(RawArgument::Typed),
            RequestSource::Rest => {
                let params = match location {
                    ArgumentLocation::Path => &self.path_params,
                    ArgumentLocation::Query => &self.query_params,
                    ArgumentLocation::Form => &self.form_params,
                    ArgumentLocation::GraphQLArgument => return None,
                };
                params.get(name).map(|value| RawArgument::Text(value.as_str()))
            }
        }
    }
}

/// First occurrence of each key wins
fn parse_urlencoded(input: &[u8]) -> HashMap<String, String> {
    let mut params = HashMap::new();
    for (key, value) in url::form_urlencoded::parse(input) {
        params
            .entry(key.into_owned())
            .or_insert_with(|| value.into_owned());
    }
    params
}

/// Types an argument can be coerced to: string, integer, long, float, double
/// and boolean.
pub trait FromArgument: Sized {
    /// Name used in [`EndpointError::ArgumentType`]
    const TYPE_NAME: &'static str;

    /// Parse a raw REST value
    fn from_text(raw: &str) -> Option<Self>;

    /// Convert an already typed GraphQL value
    fn from_value(value: &Value) -> Option<Self>;
}

impl FromArgument for String {
    const TYPE_NAME: &'static str = "string";

    fn from_text(raw: &str) -> Option<Self> {
        Some(raw.to_string())
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

impl FromArgument for i32 {
    const TYPE_NAME: &'static str = "integer";

    fn from_text(raw: &str) -> Option<Self> {
        raw.parse().ok()
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().and_then(|n| i32::try_from(n).ok()),
            Value::String(s) => Self::from_text(s),
            _ => None,
        }
    }
}

impl FromArgument for i64 {
    const TYPE_NAME: &'static str = "long";

    fn from_text(raw: &str) -> Option<Self> {
        raw.parse().ok()
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => Self::from_text(s),
            _ => None,
        }
    }
}

impl FromArgument for f32 {
    const TYPE_NAME: &'static str = "float";

    fn from_text(raw: &str) -> Option<Self> {
        raw.parse().ok()
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_f64().map(|n| n as f32),
            Value::String(s) => Self::from_text(s),
            _ => None,
        }
    }
}

impl FromArgument for f64 {
    const TYPE_NAME: &'static str = "double";

    fn from_text(raw: &str) -> Option<Self> {
        raw.parse().ok()
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => Self::from_text(s),
            _ => None,
        }
    }
}

impl FromArgument for bool {
    const TYPE_NAME: &'static str = "boolean";

    fn from_text(raw: &str) -> Option<Self> {
        raw.parse().ok()
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(*b),
            Value::String(s) => Self::from_text(s),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde::Deserialize;
    use serde_json::json;

    fn rest_params(
        method: Method,
        uri: &str,
        content_type: Option<&str>,
        body: &str,
    ) -> Parameters {
        let mut builder = axum::http::Request::builder().method(method).uri(uri);
        if let Some(content_type) = content_type {
            builder = builder.header(header::CONTENT_TYPE, content_type);
        }
        let (parts, ()) = builder.body(()).unwrap().into_parts();
        Parameters::rest(&parts, HashMap::new(), Bytes::from(body.to_string()))
    }

    fn query(uri: &str) -> Parameters {
        rest_params(Method::GET, uri, None, "")
    }

    #[test]
    fn test_query_string_argument() {
        let params = query("/hello?name=Ada");
        assert_eq!(
            params
                .get_argument::<String>("name", ArgumentLocation::Query)
                .unwrap(),
            Some("Ada".to_string())
        );
    }

    #[test]
    fn test_absent_argument_and_default() {
        let params = query("/hello");
        assert_eq!(
            params
                .get_argument::<String>("name", ArgumentLocation::Query)
                .unwrap(),
            None
        );
        assert_eq!(
            params
                .get_argument_or_default("name", "World".to_string(), ArgumentLocation::Query)
                .unwrap(),
            "World"
        );
    }

    #[test]
    fn test_integer_coercion() {
        let params = query("/person?age=42&bad=abc");
        assert_eq!(
            params
                .get_argument::<i32>("age", ArgumentLocation::Query)
                .unwrap(),
            Some(42)
        );

        let err = params
            .get_argument::<i32>("bad", ArgumentLocation::Query)
            .unwrap_err();
        assert_eq!(err.kind(), "ArgumentTypeError");
    }

    #[test]
    fn test_default_does_not_mask_coercion_failure() {
        let params = query("/person?age=abc");
        assert!(params
            .get_argument_or_default("age", 7, ArgumentLocation::Query)
            .is_err());
    }

    #[rstest]
    #[case("true", Some(true))]
    #[case("false", Some(false))]
    #[case("True", None)]
    #[case("1", None)]
    fn test_boolean_is_case_sensitive(#[case] raw: &str, #[case] expected: Option<bool>) {
        let params = query(&format!("/x?flag={raw}"));
        let result = params.get_argument::<bool>("flag", ArgumentLocation::Query);
        match expected {
            Some(value) => assert_eq!(result.unwrap(), Some(value)),
            None => assert!(result.is_err()),
        }
    }

    #[test]
    fn test_numeric_coercions() {
        let params = query("/x?long=9007199254740993&double=2.5&float=1e3&big=3000000000");
        assert_eq!(
            params
                .get_argument::<i64>("long", ArgumentLocation::Query)
                .unwrap(),
            Some(9_007_199_254_740_993)
        );
        assert_eq!(
            params
                .get_argument::<f64>("double", ArgumentLocation::Query)
                .unwrap(),
            Some(2.5)
        );
        assert_eq!(
            params
                .get_argument::<f32>("float", ArgumentLocation::Query)
                .unwrap(),
            Some(1000.0)
        );
        assert!(params
            .get_argument::<i32>("big", ArgumentLocation::Query)
            .is_err());
    }

    #[test]
    fn test_locations_are_separate() {
        let mut path_params = HashMap::new();
        path_params.insert("id".to_string(), "7".to_string());
        let (parts, ()) = axum::http::Request::builder()
            .method(Method::POST)
            .uri("/items/7?id=8")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(())
            .unwrap()
            .into_parts();
        let params = Parameters::rest(&parts, path_params, Bytes::from_static(b"id=9&name=a+b"));

        let get = |location| params.get_argument::<i32>("id", location).unwrap();
        assert_eq!(get(ArgumentLocation::Path), Some(7));
        assert_eq!(get(ArgumentLocation::Query), Some(8));
        assert_eq!(get(ArgumentLocation::Form), Some(9));
        assert_eq!(get(ArgumentLocation::GraphQLArgument), None);
        assert_eq!(
            params
                .get_argument::<String>("name", ArgumentLocation::Form)
                .unwrap(),
            Some("a b".to_string())
        );
    }

    #[test]
    fn test_graphql_arguments_keep_their_type() {
        let args = json!({
            "name": "Ada",
            "age": 42,
            "ratio": 0.5,
            "admin": true,
            "nothing": null
        });
        let serde_json::Value::Object(args) = args else {
            unreachable!()
        };
        let params = Parameters::graphql(None, args);

        assert_eq!(params.source(), RequestSource::GraphQL);
        // Location is irrelevant for GraphQL-sourced requests
        assert_eq!(
            params
                .get_argument::<String>("name", ArgumentLocation::Query)
                .unwrap(),
            Some("Ada".to_string())
        );
        assert_eq!(
            params
                .get_argument::<i32>("age", ArgumentLocation::GraphQLArgument)
                .unwrap(),
            Some(42)
        );
        assert_eq!(
            params
                .get_argument::<f64>("ratio", ArgumentLocation::GraphQLArgument)
                .unwrap(),
            Some(0.5)
        );
        assert_eq!(
            params
                .get_argument::<bool>("admin", ArgumentLocation::GraphQLArgument)
                .unwrap(),
            Some(true)
        );
        assert_eq!(
            params
                .get_argument::<String>("age", ArgumentLocation::GraphQLArgument)
                .unwrap(),
            Some("42".to_string())
        );
        assert_eq!(
            params
                .get_argument::<i32>("nothing", ArgumentLocation::GraphQLArgument)
                .unwrap(),
            None
        );
        assert!(params
            .get_argument::<i32>("name", ArgumentLocation::GraphQLArgument)
            .is_err());
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Pet {
        name: String,
    }

    #[rstest]
    #[case(Method::POST)]
    #[case(Method::PUT)]
    #[case(Method::PATCH)]
    fn test_request_body_on_body_methods(#[case] method: Method) {
        let params = rest_params(method, "/pets", Some("application/json"), r#"{"name":"Rex"}"#);
        assert_eq!(
            params.get_request_body::<Pet>().unwrap(),
            Pet {
                name: "Rex".to_string()
            }
        );
    }

    #[rstest]
    #[case(Method::GET)]
    #[case(Method::DELETE)]
    fn test_request_body_rejected_without_body_method(#[case] method: Method) {
        let params = rest_params(method, "/pets", Some("application/json"), r#"{"name":"Rex"}"#);
        let err = params.get_request_body::<Pet>().unwrap_err();
        assert_eq!(err.kind(), "UnsupportedMethodError");
    }

    #[test]
    fn test_request_body_rejected_for_graphql() {
        let params = Parameters::graphql(None, serde_json::Map::new());
        let err = params.get_request_body::<Pet>().unwrap_err();
        assert_eq!(err.kind(), "UnsupportedMethodError");
    }

    #[test]
    fn test_client_metadata() {
        let (mut parts, ()) = axum::http::Request::builder()
            .uri("/")
            .header(header::USER_AGENT, "vp-app/2.1")
            .body(())
            .unwrap()
            .into_parts();
        parts
            .extensions
            .insert(ConnectInfo(SocketAddr::from(([10, 0, 0, 5], 4711))));
        let params = Parameters::rest(&parts, HashMap::new(), Bytes::new());
        assert_eq!(params.user_agent(), Some("vp-app/2.1"));
        assert_eq!(params.remote_ip(), Some(IpAddr::from([10, 0, 0, 5])));

        parts
            .headers
            .insert("x-forwarded-for", "192.168.1.20, 10.0.0.1".parse().unwrap());
        let params = Parameters::rest(&parts, HashMap::new(), Bytes::new());
        assert_eq!(params.remote_ip(), Some(IpAddr::from([192, 168, 1, 20])));
    }
}
