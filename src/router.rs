//! Router builder and per-connection serve loop.
//!
//! The [`RouterBuilder`] collects collaborators and extra operations, then
//! freezes them into a [`Router`]. The [`Router`] handles one raw frame at a
//! time:
//! 1. Parse the envelope
//! 2. Resolve the dispatch key
//! 3. Look up the operation (unknown keys are dropped)
//! 4. Await the operation, which writes its own replies
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use pusher_protocol::auth::MemoryCredentialStore;
//! use pusher_protocol::channel::MemoryChannelManager;
//! use pusher_protocol::Router;
//!
//! let router = Router::builder()
//!     .credential_store(Arc::new(MemoryCredentialStore::new()))
//!     .channel_manager(Arc::new(MemoryChannelManager::new()))
//!     .handle("typing", |data: serde_json::Value, ctx| async move {
//!         ctx.respond(&data).await
//!     })
//!     .build();
//!
//! router.serve(connection, inbound).await?;
//! ```

use std::future::Future;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::auth::{CredentialStore, SessionAuthenticator};
use crate::channel::ChannelManager;
use crate::config::{AuthConfig, RouterConfig};
use crate::connection::Connection;
use crate::error::Result;
use crate::handler::{HandlerRegistry, HandlerResult, RequestContext};
use crate::operations;
use crate::protocol::Envelope;

/// Builder for a [`Router`].
///
/// `ping` is always registered. `login` needs a credential store (or a
/// ready authenticator) and `subscribe`/`unsubscribe` need a channel
/// manager; without them those events are ignored like any unknown event.
pub struct RouterBuilder {
    registry: HandlerRegistry,
    config: RouterConfig,
    store: Option<Arc<dyn CredentialStore>>,
    authenticator: Option<SessionAuthenticator>,
    channels: Option<Arc<dyn ChannelManager>>,
}

impl RouterBuilder {
    /// Create a new router builder.
    pub fn new() -> Self {
        Self {
            registry: HandlerRegistry::new(),
            config: RouterConfig::default(),
            store: None,
            authenticator: None,
            channels: None,
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: RouterConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the prefix of control events on the wire.
    ///
    /// Default: `pusher`
    pub fn vendor_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.vendor_prefix = prefix.into();
        self
    }

    /// Set the login settings used with [`credential_store`](Self::credential_store).
    pub fn auth_config(mut self, auth: AuthConfig) -> Self {
        self.config.auth = auth;
        self
    }

    /// Enable `login` against `store`.
    pub fn credential_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Enable `login` with a prebuilt authenticator.
    ///
    /// Takes precedence over [`credential_store`](Self::credential_store).
    pub fn authenticator(mut self, authenticator: SessionAuthenticator) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    /// Enable `subscribe` and `unsubscribe` against `channels`.
    ///
    /// The same manager is used for cleanup when a served connection ends.
    pub fn channel_manager(mut self, channels: Arc<dyn ChannelManager>) -> Self {
        self.channels = Some(channels);
        self
    }

    /// Register an additional operation under a dispatch key.
    ///
    /// The key is the resolved form: `client:typing-start` dispatches to
    /// `typingStart`. A key that collides with a built-in operation
    /// replaces it.
    pub fn handle<F, T, Fut>(mut self, key: &str, handler: F) -> Self
    where
        F: Fn(T, RequestContext) -> Fut + Send + Sync + 'static,
        T: DeserializeOwned + Send + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.registry.register(key, handler);
        self
    }

    /// Freeze the registry and build the router.
    pub fn build(self) -> Router {
        let RouterBuilder {
            registry: extra,
            config,
            store,
            authenticator,
            channels,
        } = self;

        let mut registry = HandlerRegistry::new();
        operations::register_ping(&mut registry);

        let authenticator =
            authenticator.or_else(|| store.map(|s| SessionAuthenticator::new(s, config.auth.clone())));
        if let Some(auth) = authenticator {
            operations::register_login(&mut registry, auth);
        }

        if let Some(channels) = &channels {
            operations::register_channel_operations(&mut registry, channels.clone());
        }

        registry.extend(extra);

        Router {
            registry: Arc::new(registry),
            vendor_prefix: Arc::from(config.vendor_prefix.as_str()),
            config: Arc::new(config),
            channels,
        }
    }
}

impl Default for RouterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Routes inbound frames to protocol operations.
///
/// Holds no per-connection state; clone it freely and share it across
/// connection tasks.
#[derive(Clone)]
pub struct Router {
    registry: Arc<HandlerRegistry>,
    config: Arc<RouterConfig>,
    vendor_prefix: Arc<str>,
    channels: Option<Arc<dyn ChannelManager>>,
}

impl Router {
    /// Create a new router builder.
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    /// Handle one raw frame received on `connection`.
    ///
    /// Frames whose event resolves to an unregistered key are dropped
    /// without a reply.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::MalformedEvent`](crate::ProtocolError::MalformedEvent)
    ///   when the frame cannot be parsed, its event has no prefix, or its
    ///   payload does not fit the operation. No operation runs.
    /// - [`ProtocolError::DeliveryFailure`](crate::ProtocolError::DeliveryFailure)
    ///   when a reply cannot be written. Built-in operations turn every
    ///   other failure into a reply frame.
    pub async fn handle(&self, connection: Arc<dyn Connection>, raw: &str) -> Result<()> {
        let envelope = Envelope::parse(raw)?;
        let key = envelope.dispatch_key()?;

        let Some(handler) = self.registry.get_handler(&key) else {
            debug!(
                socket_id = %connection.socket_id(),
                event = %envelope.event(),
                key = %key,
                "no operation for event, ignoring"
            );
            return Ok(());
        };

        debug!(
            socket_id = %connection.socket_id(),
            app_id = %connection.app().id,
            event = %envelope.event(),
            "dispatching"
        );

        let ctx = RequestContext::new(connection, envelope.event(), &key, &self.vendor_prefix);
        handler.call(envelope.into_data(), ctx).await
    }

    /// Handle every frame from `frames` in arrival order until the stream
    /// ends or the connection can no longer be written to.
    ///
    /// Malformed frames are logged and skipped. When the loop stops, the
    /// connection is removed from every channel of its app.
    ///
    /// # Errors
    ///
    /// Returns the delivery failure that ended the loop.
    pub async fn serve(
        &self,
        connection: Arc<dyn Connection>,
        mut frames: mpsc::Receiver<String>,
    ) -> Result<()> {
        let mut outcome = Ok(());

        while let Some(raw) = frames.recv().await {
            match self.handle(connection.clone(), &raw).await {
                Ok(()) => {}
                Err(e) if e.is_malformed() => {
                    warn!(socket_id = %connection.socket_id(), error = %e, "dropping malformed frame");
                }
                Err(e) if e.is_delivery_failure() => {
                    warn!(socket_id = %connection.socket_id(), error = %e, "connection unwritable, closing");
                    outcome = Err(e);
                    break;
                }
                Err(e) => {
                    error!(socket_id = %connection.socket_id(), error = %e, "operation failed");
                }
            }
        }

        self.disconnect(connection.as_ref()).await;
        outcome
    }

    /// Remove `connection` from every channel it joined.
    ///
    /// Called by [`serve`](Self::serve); transports that drive
    /// [`handle`](Self::handle) themselves call it on close.
    pub async fn disconnect(&self, connection: &dyn Connection) {
        let Some(channels) = &self.channels else {
            return;
        };

        if let Err(e) = channels.remove_from_all_channels(connection).await {
            warn!(
                socket_id = %connection.socket_id(),
                app_id = %connection.app().id,
                error = %e,
                "channel cleanup failed"
            );
        }
    }

    /// Whether an operation is registered for the dispatch key.
    pub fn has_operation(&self, key: &str) -> bool {
        self.registry.contains(key)
    }

    /// All registered dispatch keys, sorted.
    pub fn operations(&self) -> Vec<&str> {
        self.registry.keys()
    }

    /// Configuration the router was built with.
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }
}
