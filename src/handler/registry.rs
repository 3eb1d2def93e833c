//! Operation registry keyed by dispatch key.
//!
//! The registry is filled while the router is being built and is only
//! read afterwards: a running router cannot gain or lose operations.

use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::RequestContext;
use crate::codec::JsonCodec;
use crate::error::Result;

/// Result type for operations.
pub type HandlerResult = Result<()>;

/// Boxed future for operation results.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A protocol operation.
pub trait Handler: Send + Sync + 'static {
    /// Run the operation with the frame's data payload.
    fn call(&self, data: Value, ctx: RequestContext) -> BoxFuture<'static, HandlerResult>;
}

/// Wrapper that decodes the payload into `T` before calling the operation.
///
/// A payload that does not fit `T` fails with
/// [`ProtocolError::MalformedEvent`](crate::ProtocolError::MalformedEvent)
/// and the operation is not called.
pub struct TypedHandler<F, T, Fut>
where
    F: Fn(T, RequestContext) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    handler: F,
    _phantom: PhantomData<fn(T) -> Fut>,
}

impl<F, T, Fut> TypedHandler<F, T, Fut>
where
    F: Fn(T, RequestContext) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    /// Create a new typed handler.
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            _phantom: PhantomData,
        }
    }
}

impl<F, T, Fut> Handler for TypedHandler<F, T, Fut>
where
    F: Fn(T, RequestContext) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, data: Value, ctx: RequestContext) -> BoxFuture<'static, HandlerResult> {
        let parsed: T = match JsonCodec::decode_payload(data) {
            Ok(v) => v,
            Err(e) => return Box::pin(async move { Err(e) }),
        };

        Box::pin((self.handler)(parsed, ctx))
    }
}

/// Registry mapping dispatch keys to operations.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Box<dyn Handler>>,
}

impl HandlerRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a typed operation under `key`.
    ///
    /// Registering a key twice replaces the earlier operation.
    pub fn register<F, T, Fut>(&mut self, key: &str, handler: F)
    where
        F: Fn(T, RequestContext) -> Fut + Send + Sync + 'static,
        T: DeserializeOwned + Send + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.register_handler(key, Box::new(TypedHandler::new(handler)));
    }

    /// Register an already-boxed operation under `key`.
    pub fn register_handler(&mut self, key: &str, handler: Box<dyn Handler>) {
        if self.handlers.insert(key.to_string(), handler).is_some() {
            tracing::warn!(key, "operation registered twice, keeping the last one");
        }
    }

    /// Move every operation of `other` into this registry.
    ///
    /// Keys present in both end up with `other`'s operation.
    pub fn extend(&mut self, other: HandlerRegistry) {
        for (key, handler) in other.handlers {
            self.register_handler(&key, handler);
        }
    }

    /// Get the operation for a dispatch key.
    pub fn get_handler(&self, key: &str) -> Option<&dyn Handler> {
        self.handlers.get(key).map(|h| h.as_ref())
    }

    /// Whether an operation is registered for `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.handlers.contains_key(key)
    }

    /// All registered dispatch keys, sorted.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::SessionToken;
    use crate::connection::{App, Connection};
    use crate::error::ProtocolError;
    use async_trait::async_trait;
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Silent(App);

    #[async_trait]
    impl Connection for Silent {
        fn socket_id(&self) -> &str {
            "1.1"
        }
        fn app(&self) -> &App {
            &self.0
        }
        async fn send(&self, _text: String) -> Result<()> {
            Ok(())
        }
        fn bind_session(&self, _token: SessionToken) {}
        fn session(&self) -> Option<SessionToken> {
            None
        }
    }

    fn ctx(key: &str) -> RequestContext {
        RequestContext::new(Arc::new(Silent(App::new("app"))), key, key, "pusher")
    }

    #[derive(Deserialize)]
    struct Channel {
        channel: String,
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = HandlerRegistry::new();
        registry.register("ping", |_: Value, _ctx| async { Ok(()) });
        registry.register("subscribe", |_: Channel, _ctx| async { Ok(()) });

        assert!(registry.get_handler("ping").is_some());
        assert!(registry.contains("subscribe"));
        assert_eq!(registry.keys(), vec!["ping", "subscribe"]);
        assert_eq!(registry.keys().len(), 2);
    }

    #[test]
    fn test_lookup_is_exact() {
        let mut registry = HandlerRegistry::new();
        registry.register("subscribe", |_: Value, _ctx| async { Ok(()) });

        assert!(registry.get_handler("Subscribe").is_none());
        assert!(registry.get_handler("sub").is_none());
        assert!(registry.get_handler("subscribe ").is_none());
    }

    #[tokio::test]
    async fn test_call_decodes_payload() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();

        let mut registry = HandlerRegistry::new();
        registry.register("subscribe", move |data: Channel, _ctx| {
            let seen = seen.clone();
            async move {
                assert_eq!(data.channel, "news");
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        let handler = registry.get_handler("subscribe").unwrap();
        handler
            .call(json!({ "channel": "news" }), ctx("subscribe"))
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_call_bad_payload_is_malformed() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();

        let mut registry = HandlerRegistry::new();
        registry.register("subscribe", move |_: Channel, _ctx| {
            let seen = seen.clone();
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        let handler = registry.get_handler("subscribe").unwrap();
        let result = handler.call(json!({}), ctx("subscribe")).await;
        assert!(matches!(result, Err(ProtocolError::MalformedEvent(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_register_twice_replaces() {
        let mut registry = HandlerRegistry::new();
        registry.register("ping", |_: Value, _ctx| async { Ok(()) });
        registry.register("ping", |_: Value, _ctx| async { Ok(()) });
        assert_eq!(registry.keys(), vec!["ping"]);
    }

    #[test]
    fn test_extend_merges_and_overrides() {
        let mut base = HandlerRegistry::new();
        base.register("ping", |_: Value, _ctx| async { Ok(()) });
        base.register("login", |_: Value, _ctx| async { Ok(()) });

        let mut extra = HandlerRegistry::new();
        extra.register("ping", |_: Value, _ctx| async { Ok(()) });
        extra.register("typing", |_: Value, _ctx| async { Ok(()) });

        base.extend(extra);
        assert_eq!(base.keys(), vec!["login", "ping", "typing"]);
    }
}
