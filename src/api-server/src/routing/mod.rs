//! HTTP and WebSocket routing for discovered endpoints

pub mod route_table;
pub mod websocket;

pub use route_table::{RouteEntry, RouteSummary, RouteTable, RouteTarget};
pub use websocket::{WebSocketBinding, WsCloseReason, WsSession};
