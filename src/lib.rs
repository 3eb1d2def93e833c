//! # pusher-protocol
//!
//! Protocol core for Pusher-compatible websocket gateways.
//!
//! The transport layer accepts sockets and hands every inbound text frame
//! to a [`Router`]. The router parses the frame, resolves its event name to
//! a dispatch key and runs the registered operation, which writes its
//! replies straight back to the connection.
//!
//! ## Built-in operations
//!
//! - `pusher:ping` - keepalive, replies `pusher:pong`
//! - `pusher:login` - email/password login, replies with a bearer token
//! - `pusher:subscribe` / `pusher:unsubscribe` - channel membership
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use pusher_protocol::auth::MemoryCredentialStore;
//! use pusher_protocol::channel::MemoryChannelManager;
//! use pusher_protocol::{App, ConnectionHandle, Router};
//!
//! #[tokio::main]
//! async fn main() -> pusher_protocol::Result<()> {
//!     let router = Router::builder()
//!         .credential_store(Arc::new(MemoryCredentialStore::new()))
//!         .channel_manager(Arc::new(MemoryChannelManager::new()))
//!         .build();
//!
//!     let (connection, _writer) =
//!         ConnectionHandle::spawn(App::new("app-1"), socket_sink, Default::default());
//!     router.serve(Arc::new(connection), inbound_frames).await
//! }
//! ```

pub mod auth;
pub mod channel;
pub mod codec;
pub mod config;
pub mod connection;
pub mod error;
pub mod handler;
pub mod operations;
pub mod protocol;
pub mod writer;

mod router;

pub use config::{AuthConfig, RouterConfig};
pub use connection::{App, Connection, ConnectionHandle};
pub use error::{ProtocolError, Result};
pub use handler::RequestContext;
pub use router::{Router, RouterBuilder};
