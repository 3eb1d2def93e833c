//! In-memory channel manager.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use super::manager::{ChannelHandle, ChannelManager, SubscribeRequest};
use crate::codec::JsonCodec;
use crate::connection::Connection;
use crate::error::Result;
use crate::protocol::{reply, DEFAULT_VENDOR_PREFIX};

type ChannelKey = (String, String);
type ChannelIndex = RwLock<HashMap<ChannelKey, Arc<MemoryChannel>>>;

/// A public channel whose subscribers live in process memory.
///
/// A handle stays usable after its manager pruned the channel: joining
/// through it re-registers the channel, or joins whichever channel now
/// holds its name.
pub struct MemoryChannel {
    app_id: String,
    name: String,
    vendor_prefix: String,
    subscribers: Mutex<HashMap<String, Arc<dyn Connection>>>,
    this: Weak<MemoryChannel>,
    index: Weak<ChannelIndex>,
}

impl MemoryChannel {
    fn new(
        app_id: &str,
        name: &str,
        vendor_prefix: &str,
        this: Weak<MemoryChannel>,
        index: Weak<ChannelIndex>,
    ) -> Self {
        Self {
            app_id: app_id.to_string(),
            name: name.to_string(),
            vendor_prefix: vendor_prefix.to_string(),
            subscribers: Mutex::new(HashMap::new()),
            this,
            index,
        }
    }

    /// Number of subscribed connections.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Whether the socket is subscribed.
    pub fn has_connection(&self, socket_id: &str) -> bool {
        self.subscribers.lock().contains_key(socket_id)
    }

    /// Socket ids of all subscribers, sorted.
    pub fn socket_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.subscribers.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    fn key(&self) -> ChannelKey {
        (self.app_id.clone(), self.name.clone())
    }

    fn remove(&self, socket_id: &str) -> bool {
        self.subscribers.lock().remove(socket_id).is_some()
    }

    /// Add `connection` to the channel registered under this name.
    ///
    /// Runs under the index write lock, as pruning does, so a join never
    /// lands in a channel that was just dropped from the index.
    fn join(&self, connection: Arc<dyn Connection>) -> bool {
        let socket_id = connection.socket_id().to_string();
        let (Some(index), Some(this)) = (self.index.upgrade(), self.this.upgrade()) else {
            return self.subscribers.lock().insert(socket_id, connection).is_none();
        };

        let mut channels = index.write();
        let live = channels.entry(self.key()).or_insert(this);
        let joined = live.subscribers.lock().insert(socket_id, connection).is_none();
        joined
    }

    fn leave(&self, socket_id: &str) -> bool {
        let live = match self.index.upgrade() {
            Some(index) => {
                let channels = index.read();
                channels.get(&self.key()).cloned()
            }
            None => None,
        };

        let left_live = match &live {
            Some(live) if !std::ptr::eq(Arc::as_ptr(live), self) => live.remove(socket_id),
            _ => false,
        };
        self.remove(socket_id) || left_live
    }
}

#[async_trait]
impl ChannelHandle for MemoryChannel {
    fn app_id(&self) -> &str {
        &self.app_id
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn subscribe(
        &self,
        connection: Arc<dyn Connection>,
        _request: &SubscribeRequest,
    ) -> Result<()> {
        let joined = self.join(connection.clone());

        debug!(
            app_id = %self.app_id,
            channel = %self.name,
            socket_id = %connection.socket_id(),
            joined,
            "subscribe"
        );

        let ack = reply::subscription_succeeded(&self.vendor_prefix, &self.name, None);
        connection.send(JsonCodec::encode(&ack)?).await
    }

    async fn unsubscribe(&self, connection: &dyn Connection) -> Result<()> {
        let left = self.leave(connection.socket_id());
        debug!(
            app_id = %self.app_id,
            channel = %self.name,
            socket_id = %connection.socket_id(),
            left,
            "unsubscribe"
        );
        Ok(())
    }
}

/// Channel manager keeping every channel in process memory.
///
/// Channels left empty by [`remove_from_all_channels`](ChannelManager::remove_from_all_channels)
/// are dropped from the index.
pub struct MemoryChannelManager {
    vendor_prefix: String,
    channels: Arc<ChannelIndex>,
}

impl MemoryChannelManager {
    /// Manager using the default `pusher` prefix for acknowledgements.
    pub fn new() -> Self {
        Self::with_vendor_prefix(DEFAULT_VENDOR_PREFIX)
    }

    /// Manager using a custom vendor prefix for acknowledgements.
    pub fn with_vendor_prefix(prefix: impl Into<String>) -> Self {
        Self {
            vendor_prefix: prefix.into(),
            channels: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Look up an existing channel without creating it.
    pub fn channel(&self, app_id: &str, name: &str) -> Option<Arc<MemoryChannel>> {
        self.channels
            .read()
            .get(&(app_id.to_string(), name.to_string()))
            .cloned()
    }

    /// Number of channels of one app.
    pub fn channel_count(&self, app_id: &str) -> usize {
        self.channels
            .read()
            .keys()
            .filter(|(app, _)| app == app_id)
            .count()
    }

    fn find_or_create_memory(&self, app_id: &str, name: &str) -> Arc<MemoryChannel> {
        let key = (app_id.to_string(), name.to_string());
        if let Some(channel) = self.channels.read().get(&key) {
            return channel.clone();
        }

        let index = Arc::downgrade(&self.channels);
        self.channels
            .write()
            .entry(key)
            .or_insert_with(|| {
                Arc::new_cyclic(|this| {
                    MemoryChannel::new(app_id, name, &self.vendor_prefix, this.clone(), index)
                })
            })
            .clone()
    }
}

impl Default for MemoryChannelManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChannelManager for MemoryChannelManager {
    async fn find_or_create(&self, app_id: &str, channel: &str) -> Result<Arc<dyn ChannelHandle>> {
        let handle: Arc<dyn ChannelHandle> = self.find_or_create_memory(app_id, channel);
        Ok(handle)
    }

    async fn remove_from_all_channels(&self, connection: &dyn Connection) -> Result<()> {
        let app_id = connection.app().id.as_str();
        let socket_id = connection.socket_id();

        let mut channels = self.channels.write();
        for ((app, _), channel) in channels.iter() {
            if app == app_id {
                channel.remove(socket_id);
            }
        }
        channels.retain(|(app, _), channel| app != app_id || channel.subscriber_count() > 0);

        debug!(app_id, socket_id, "removed connection from all channels");
        Ok(())
    }
}
