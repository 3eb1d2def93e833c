//! Client connections as seen by the protocol core.
//!
//! The transport layer owns every connection. The core only needs to read
//! the connection's identity, write reply frames to it and remember which
//! session it authenticated as.

use std::fmt;

use async_trait::async_trait;
use futures::Sink;
use parking_lot::Mutex;
use rand::Rng;
use tokio::task::JoinHandle;

use crate::auth::SessionToken;
use crate::error::Result;
use crate::writer::{spawn_writer_task, OutboundFrame, WriterConfig, WriterHandle};

/// Tenant/application context a connection was accepted for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct App {
    /// Application id used to scope channels.
    pub id: String,
    /// Human-readable name, if the transport knows one.
    pub name: Option<String>,
}

impl App {
    /// App with an id only.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
        }
    }

    /// Set the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Capabilities the protocol core uses on a client connection.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Unique id of this socket within the gateway.
    fn socket_id(&self) -> &str;

    /// App the connection was accepted for.
    fn app(&self) -> &App;

    /// Write one text frame to the client.
    ///
    /// Fails with [`ProtocolError::DeliveryFailure`](crate::ProtocolError::DeliveryFailure)
    /// when the client can no longer be written to.
    async fn send(&self, text: String) -> Result<()>;

    /// Remember the session this connection authenticated as.
    ///
    /// Called by `login` on success. Later frames on the same connection
    /// read it back through [`session`](Self::session), so implementations
    /// must keep it for the connection's lifetime.
    fn bind_session(&self, token: SessionToken);

    /// Session bound by a previous login, if any.
    fn session(&self) -> Option<SessionToken>;
}

/// Generate a Pusher-style socket id (`"<n>.<n>"`).
pub fn generate_socket_id() -> String {
    let mut rng = rand::rng();
    format!(
        "{}.{}",
        rng.random_range(1..=1_000_000_000u32),
        rng.random_range(1..=1_000_000_000u32)
    )
}

/// A [`Connection`] backed by a dedicated writer task.
///
/// Created by the transport at accept time with the outbound half of the
/// websocket. Replies are queued and delivered in order, one message per
/// frame.
pub struct ConnectionHandle {
    socket_id: String,
    app: App,
    writer: WriterHandle,
    session: Mutex<Option<SessionToken>>,
}

impl ConnectionHandle {
    /// Create a connection around an existing writer handle.
    pub fn new(socket_id: impl Into<String>, app: App, writer: WriterHandle) -> Self {
        Self {
            socket_id: socket_id.into(),
            app,
            writer,
            session: Mutex::new(None),
        }
    }

    /// Spawn a writer task for `sink` and wrap it in a new connection
    /// with a freshly generated socket id.
    pub fn spawn<S>(app: App, sink: S, config: WriterConfig) -> (Self, JoinHandle<Result<()>>)
    where
        S: Sink<String> + Unpin + Send + 'static,
        S::Error: fmt::Display,
    {
        let (writer, task) = spawn_writer_task(sink, config);
        (Self::new(generate_socket_id(), app, writer), task)
    }

    /// Writer handle for this connection.
    pub fn writer(&self) -> &WriterHandle {
        &self.writer
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("socket_id", &self.socket_id)
            .field("app", &self.app)
            .field("pending", &self.writer.pending_count())
            .finish()
    }
}

#[async_trait]
impl Connection for ConnectionHandle {
    fn socket_id(&self) -> &str {
        &self.socket_id
    }

    fn app(&self) -> &App {
        &self.app
    }

    async fn send(&self, text: String) -> Result<()> {
        self.writer.send(OutboundFrame::text(text)).await
    }

    fn bind_session(&self, token: SessionToken) {
        *self.session.lock() = Some(token);
    }

    fn session(&self) -> Option<SessionToken> {
        self.session.lock().clone()
    }
}
