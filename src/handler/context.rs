//! Request context for operations.
//!
//! Provides methods for replying on the connection a frame arrived on:
//! - `respond` - send any serializable value as one frame
//! - `respond_data` - send `{"data": ...}`
//! - `respond_event` - send a bare control event (`{"event":"pusher:pong"}`)
//! - `respond_error` - send `{"event":"pusher:error", ...}`
//!
//! Replies go straight to the connection; nothing is returned to the router.

use std::sync::Arc;

use serde::Serialize;

use crate::codec::JsonCodec;
use crate::connection::Connection;
use crate::error::Result;
use crate::protocol::reply;

/// Context passed to every operation.
///
/// `RequestContext` is `Clone` and cheap to move into an operation's future.
#[derive(Clone)]
pub struct RequestContext {
    connection: Arc<dyn Connection>,
    event: Arc<str>,
    dispatch_key: Arc<str>,
    vendor_prefix: Arc<str>,
}

impl RequestContext {
    /// Create a context for one inbound frame.
    pub fn new(
        connection: Arc<dyn Connection>,
        event: &str,
        dispatch_key: &str,
        vendor_prefix: &str,
    ) -> Self {
        Self {
            connection,
            event: Arc::from(event),
            dispatch_key: Arc::from(dispatch_key),
            vendor_prefix: Arc::from(vendor_prefix),
        }
    }

    /// The connection the frame arrived on.
    #[inline]
    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }

    /// App id of the connection.
    #[inline]
    pub fn app_id(&self) -> &str {
        &self.connection.app().id
    }

    /// Socket id of the connection.
    #[inline]
    pub fn socket_id(&self) -> &str {
        self.connection.socket_id()
    }

    /// Raw wire event name of the frame.
    #[inline]
    pub fn event(&self) -> &str {
        &self.event
    }

    /// Dispatch key the frame resolved to.
    #[inline]
    pub fn dispatch_key(&self) -> &str {
        &self.dispatch_key
    }

    /// Vendor prefix for control replies.
    #[inline]
    pub fn vendor_prefix(&self) -> &str {
        &self.vendor_prefix
    }

    /// Send a value as one JSON frame.
    pub async fn respond<T: Serialize>(&self, payload: &T) -> Result<()> {
        let text = JsonCodec::encode(payload)?;
        self.connection.send(text).await
    }

    /// Send `{"data": payload}`.
    pub async fn respond_data<T: Serialize>(&self, payload: &T) -> Result<()> {
        let frame = reply::data_frame(payload)?;
        self.respond(&frame).await
    }

    /// Send `{"event":"<prefix>:error","data":{"message","code"}}`.
    pub async fn respond_error(&self, message: &str, code: Option<u16>) -> Result<()> {
        let frame = reply::error(&self.vendor_prefix, message, code);
        self.respond(&frame).await
    }

    /// Send `{"event":"<prefix>:<name>"}`.
    pub async fn respond_event(&self, name: &str) -> Result<()> {
        let frame = serde_json::json!({
            "event": reply::control_event(&self.vendor_prefix, name),
        });
        self.respond(&frame).await
    }
}
