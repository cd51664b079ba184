//! WebSocket sessions
//!
//! Each upgraded socket is split into a reader loop driving the handler
//! callbacks and a writer task fed through an unbounded channel, so handlers
//! can push messages from anywhere through their [`WsSession`].

use std::borrow::Cow;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
    http::{header, HeaderMap},
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::discovery::WebSocketHandler;

const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle to one connected client
#[derive(Debug, Clone)]
pub struct WsSession {
    id: Uuid,
    host: String,
    sender: mpsc::UnboundedSender<Message>,
}

impl WsSession {
    /// Create a session whose outgoing messages end up in the returned receiver
    pub fn channel(host: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<Message>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let session = Self {
            id: Uuid::new_v4(),
            host: host.into(),
            sender,
        };
        (session, receiver)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Value of the `Host` header of the upgrade request, or the peer address
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Queue a text frame; `false` once the connection is gone
    pub fn send(&self, text: impl Into<String>) -> bool {
        self.sender.send(Message::Text(text.into())).is_ok()
    }

    pub fn send_binary(&self, data: impl Into<Vec<u8>>) -> bool {
        self.sender.send(Message::Binary(data.into())).is_ok()
    }

    pub fn close(&self, code: u16, reason: impl Into<String>) -> bool {
        let frame = CloseFrame {
            code,
            reason: Cow::Owned(reason.into()),
        };
        self.sender.send(Message::Close(Some(frame))).is_ok()
    }
}

/// Close code and reason sent by the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WsCloseReason {
    pub code: u16,
    pub reason: String,
}

impl From<CloseFrame<'static>> for WsCloseReason {
    fn from(frame: CloseFrame<'static>) -> Self {
        Self {
            code: frame.code,
            reason: frame.reason.into_owned(),
        }
    }
}

/// Route target for a discovered WebSocket endpoint
pub struct WebSocketBinding {
    handler: Arc<dyn WebSocketHandler>,
    handler_type: &'static str,
}

impl WebSocketBinding {
    pub fn new(handler: Arc<dyn WebSocketHandler>, handler_type: &'static str) -> Self {
        Self {
            handler,
            handler_type,
        }
    }

    pub fn handler_type(&self) -> &'static str {
        self.handler_type
    }

    /// Accept the upgrade and run the session on its own task
    pub fn upgrade(
        self: Arc<Self>,
        ws: WebSocketUpgrade,
        headers: &HeaderMap,
        remote_addr: Option<SocketAddr>,
    ) -> Response {
        let host = headers
            .get(header::HOST)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .or_else(|| remote_addr.map(|addr| addr.to_string()))
            .unwrap_or_else(|| "unknown".to_string());

        ws.on_upgrade(move |socket| async move { self.run(socket, host).await })
    }

    async fn run(&self, socket: WebSocket, host: String) {
        let (mut sink, mut stream) = socket.split();
        let (session, mut outgoing) = WsSession::channel(host);

        let mut writer = tokio::spawn(async move {
            while let Some(message) = outgoing.recv().await {
                if sink.send(message).await.is_err() {
                    break;
                }
            }
        });

        info!(
            handler = self.handler_type,
            session = %session.id(),
            host = session.host(),
            "WebSocket connected"
        );
        self.handler.on_connect(&session).await;

        let mut close_reason = None;
        while let Some(frame) = stream.next().await {
            match frame {
                Ok(Message::Text(text)) => self.handler.on_message(&session, text).await,
                Ok(Message::Binary(data)) => self.handler.on_binary_message(&session, data).await,
                Ok(Message::Close(frame)) => {
                    close_reason = frame.map(WsCloseReason::from);
                    break;
                }
                // Pings are answered by the protocol layer
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
                Err(err) => {
                    warn!(
                        handler = self.handler_type,
                        session = %session.id(),
                        error = %err,
                        "WebSocket error"
                    );
                    self.handler.on_error(&session, &err).await;
                    break;
                }
            }
        }

        self.handler.on_close(&session, close_reason).await;
        debug!(handler = self.handler_type, session = %session.id(), "WebSocket closed");

        drop(session);
        if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer)
            .await
            .is_err()
        {
            writer.abort();
        }
    }
}
