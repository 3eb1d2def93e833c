//! Channel-manager collaborator interface.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::connection::Connection;
use crate::error::Result;

/// Payload of a subscribe frame.
///
/// Only `channel` is interpreted by the router; everything else is handed
/// to the channel untouched.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SubscribeRequest {
    /// Channel to join.
    pub channel: String,
    /// Signature for private and presence channels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<String>,
    /// Member information for presence channels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_data: Option<String>,
    /// Any other fields the client sent.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SubscribeRequest {
    /// Subscribe request with a channel name only.
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            auth: None,
            channel_data: None,
            extra: Map::new(),
        }
    }
}

/// Payload of an unsubscribe frame.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct UnsubscribeRequest {
    /// Channel to leave.
    pub channel: String,
}

/// One channel's membership and authorization policy.
///
/// Both operations must be idempotent: joining twice leaves one entry,
/// leaving a channel never joined is a no-op.
#[async_trait]
pub trait ChannelHandle: Send + Sync {
    /// App the channel belongs to.
    fn app_id(&self) -> &str;

    /// Channel name.
    fn name(&self) -> &str;

    /// Run the subscribe protocol for `connection` (authorization,
    /// acknowledgement, presence bookkeeping).
    async fn subscribe(&self, connection: Arc<dyn Connection>, request: &SubscribeRequest)
        -> Result<()>;

    /// Remove `connection` from the subscriber set.
    async fn unsubscribe(&self, connection: &dyn Connection) -> Result<()>;
}

/// Registry of channels, scoped per app.
#[async_trait]
pub trait ChannelManager: Send + Sync {
    /// Return the channel `(app_id, channel)`, creating it if needed.
    async fn find_or_create(&self, app_id: &str, channel: &str) -> Result<Arc<dyn ChannelHandle>>;

    /// Drop `connection` from every channel of its app.
    async fn remove_from_all_channels(&self, connection: &dyn Connection) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_subscribe_request_keeps_extra_fields() {
        let req: SubscribeRequest = serde_json::from_value(json!({
            "channel": "presence-room",
            "auth": "key:signature",
            "channel_data": "{\"user_id\":1}",
            "shared_secret": "s",
        }))
        .unwrap();

        assert_eq!(req.channel, "presence-room");
        assert_eq!(req.auth.as_deref(), Some("key:signature"));
        assert_eq!(req.channel_data.as_deref(), Some("{\"user_id\":1}"));
        assert_eq!(req.extra.get("shared_secret"), Some(&json!("s")));
    }

    #[test]
    fn test_subscribe_request_requires_channel() {
        let result: serde_json::Result<SubscribeRequest> =
            serde_json::from_value(json!({ "auth": "x" }));
        assert!(result.is_err());
    }

    #[test]
    fn test_subscribe_request_new() {
        let req = SubscribeRequest::new("news");
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({ "channel": "news" })
        );
    }
}
