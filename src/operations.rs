//! Built-in protocol operations.
//!
//! | wire event           | dispatch key  | operation      |
//! |----------------------|---------------|----------------|
//! | `pusher:ping`        | `ping`        | [`ping`]        |
//! | `pusher:login`       | `login`       | [`login`]       |
//! | `pusher:subscribe`   | `subscribe`   | [`subscribe`]   |
//! | `pusher:unsubscribe` | `unsubscribe` | [`unsubscribe`] |

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::auth::{LoginReply, LoginRequest, SessionAuthenticator};
use crate::channel::{ChannelManager, SubscribeRequest, UnsubscribeRequest};
use crate::error::ProtocolError;
use crate::handler::{HandlerRegistry, HandlerResult, RequestContext};
use crate::protocol::reply;

/// Dispatch key of the keepalive operation.
pub const PING: &str = "ping";
/// Dispatch key of the login operation.
pub const LOGIN: &str = "login";
/// Dispatch key of the subscribe operation.
pub const SUBSCRIBE: &str = "subscribe";
/// Dispatch key of the unsubscribe operation.
pub const UNSUBSCRIBE: &str = "unsubscribe";

/// Reply `{"event":"<prefix>:pong"}`. The payload is ignored.
pub async fn ping(_data: Value, ctx: RequestContext) -> HandlerResult {
    ctx.respond_event(reply::PONG).await
}

/// Check credentials and reply with a token or a `401`.
///
/// Credential problems never leave this function as errors: they become
/// an `{"data": {"result": "error", ...}}` reply. Only a failed write is
/// returned.
pub async fn login(
    auth: &SessionAuthenticator,
    request: LoginRequest,
    ctx: RequestContext,
) -> HandlerResult {
    let body = match auth.login(&request).await {
        Ok(token) => {
            let body = LoginReply::success(&token);
            ctx.connection().bind_session(token);
            body
        }
        Err(ProtocolError::Unauthorized) => {
            debug!(socket_id = %ctx.socket_id(), "login rejected");
            LoginReply::unauthorized()
        }
        Err(e) => {
            warn!(socket_id = %ctx.socket_id(), error = %e, "credential store failed during login");
            LoginReply::server_error()
        }
    };

    ctx.respond_data(&body).await
}

/// Join `(app_id, channel)`; the channel runs the rest of the protocol.
///
/// Collaborator failures become a `<prefix>:error` reply. Only a failed
/// write is returned.
pub async fn subscribe(
    channels: &dyn ChannelManager,
    request: SubscribeRequest,
    ctx: RequestContext,
) -> HandlerResult {
    if request.channel.is_empty() {
        return Err(ProtocolError::malformed("subscribe without a channel name"));
    }

    let result = async {
        let channel = channels
            .find_or_create(ctx.app_id(), &request.channel)
            .await?;
        channel.subscribe(ctx.connection().clone(), &request).await
    }
    .await;

    match result {
        Ok(()) => Ok(()),
        Err(e) => reply_failure(SUBSCRIBE, &request.channel, e, &ctx).await,
    }
}

/// Leave `(app_id, channel)`. Leaving a channel never joined is a no-op.
pub async fn unsubscribe(
    channels: &dyn ChannelManager,
    request: UnsubscribeRequest,
    ctx: RequestContext,
) -> HandlerResult {
    if request.channel.is_empty() {
        return Err(ProtocolError::malformed("unsubscribe without a channel name"));
    }

    let result = async {
        let channel = channels
            .find_or_create(ctx.app_id(), &request.channel)
            .await?;
        channel.unsubscribe(ctx.connection().as_ref()).await
    }
    .await;

    match result {
        Ok(()) => Ok(()),
        Err(e) => reply_failure(UNSUBSCRIBE, &request.channel, e, &ctx).await,
    }
}

/// Report a channel failure to the client instead of the router.
async fn reply_failure(
    operation: &str,
    channel: &str,
    error: ProtocolError,
    ctx: &RequestContext,
) -> HandlerResult {
    if error.is_delivery_failure() {
        return Err(error);
    }

    warn!(
        socket_id = %ctx.socket_id(),
        app_id = %ctx.app_id(),
        channel,
        operation,
        error = %error,
        "channel operation failed"
    );

    let code = match &error {
        ProtocolError::Unauthorized => reply::ERROR_CODE_UNAUTHORIZED,
        _ => reply::ERROR_CODE_TRY_AGAIN,
    };
    ctx.respond_error(&error.to_string(), Some(code)).await
}

/// Register [`ping`].
pub fn register_ping(registry: &mut HandlerRegistry) {
    registry.register(PING, ping);
}

/// Register [`login`] backed by `auth`.
pub fn register_login(registry: &mut HandlerRegistry, auth: SessionAuthenticator) {
    registry.register(LOGIN, move |request: LoginRequest, ctx| {
        let auth = auth.clone();
        async move { login(&auth, request, ctx).await }
    });
}

/// Register [`subscribe`] and [`unsubscribe`] backed by `channels`.
pub fn register_channel_operations(
    registry: &mut HandlerRegistry,
    channels: Arc<dyn ChannelManager>,
) {
    let manager = channels.clone();
    registry.register(SUBSCRIBE, move |request: SubscribeRequest, ctx| {
        let manager = manager.clone();
        async move { subscribe(manager.as_ref(), request, ctx).await }
    });

    registry.register(UNSUBSCRIBE, move |request: UnsubscribeRequest, ctx| {
        let manager = channels.clone();
        async move { unsubscribe(manager.as_ref(), request, ctx).await }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryCredentialStore;
    use crate::channel::MemoryChannelManager;
    use crate::config::AuthConfig;
    use crate::connection::{App, Connection};
    use crate::error::Result;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;

    #[derive(Default)]
    struct Recorder {
        app: Option<App>,
        sent: Mutex<Vec<serde_json::Value>>,
        session: Mutex<Option<crate::auth::SessionToken>>,
    }

    impl Recorder {
        fn new(app_id: &str) -> Arc<Self> {
            Arc::new(Self {
                app: Some(App::new(app_id)),
                ..Self::default()
            })
        }

        fn sent(&self) -> Vec<serde_json::Value> {
            self.sent.lock().clone()
        }
    }

    #[async_trait]
    impl Connection for Recorder {
        fn socket_id(&self) -> &str {
            "10.20"
        }
        fn app(&self) -> &App {
            self.app.as_ref().unwrap()
        }
        async fn send(&self, text: String) -> Result<()> {
            self.sent.lock().push(serde_json::from_str(&text).unwrap());
            Ok(())
        }
        fn bind_session(&self, token: crate::auth::SessionToken) {
            *self.session.lock() = Some(token);
        }
        fn session(&self) -> Option<crate::auth::SessionToken> {
            self.session.lock().clone()
        }
    }

    fn ctx(conn: &Arc<Recorder>, key: &str) -> RequestContext {
        RequestContext::new(conn.clone(), &format!("pusher:{key}"), key, "pusher")
    }

    #[tokio::test]
    async fn test_ping_replies_pong() {
        let conn = Recorder::new("app-1");
        ping(json!({ "ignored": true }), ctx(&conn, PING)).await.unwrap();
        assert_eq!(conn.sent(), vec![json!({ "event": "pusher:pong" })]);
    }

    #[tokio::test]
    async fn test_login_success_binds_session() {
        let store = Arc::new(MemoryCredentialStore::new());
        store.add_user("alice@example.com", "wonderland").unwrap();
        let auth = SessionAuthenticator::new(store.clone(), AuthConfig::default());
        let conn = Recorder::new("app-1");

        let request = LoginRequest {
            email: "alice@example.com".into(),
            password: "wonderland".into(),
            remember: None,
        };
        login(&auth, request, ctx(&conn, LOGIN)).await.unwrap();

        let sent = conn.sent();
        assert_eq!(sent.len(), 1);
        let data = &sent[0]["data"];
        assert_eq!(data["result"], "ok");
        assert_eq!(data["status"], 200);

        let session = conn.session().unwrap();
        assert_eq!(data["token"], session.value.as_str());
        assert!(store.find_token(&session.value).is_some());
    }

    #[tokio::test]
    async fn test_login_failure_replies_401() {
        let store = Arc::new(MemoryCredentialStore::new());
        let auth = SessionAuthenticator::new(store.clone(), AuthConfig::default());
        let conn = Recorder::new("app-1");

        let request = LoginRequest {
            email: "nobody@example.com".into(),
            password: "x".into(),
            remember: None,
        };
        login(&auth, request, ctx(&conn, LOGIN)).await.unwrap();

        let data = &conn.sent()[0]["data"];
        assert_eq!(data["result"], "error");
        assert_eq!(data["status"], 401);
        assert_eq!(data["errors"], "Unauthorised");
        assert!(conn.session().is_none());
        assert_eq!(store.token_count(), 0);
    }

    #[tokio::test]
    async fn test_login_store_failure_replies_500() {
        struct BrokenStore;

        #[async_trait]
        impl crate::auth::CredentialStore for BrokenStore {
            async fn authenticate(
                &self,
                _email: &str,
                _password: &str,
            ) -> Result<crate::auth::Identity> {
                Err(ProtocolError::Credential("database unavailable".into()))
            }
            async fn issue_token(
                &self,
                _identity: &crate::auth::Identity,
                _name: &str,
                _ttl: chrono::Duration,
            ) -> Result<crate::auth::SessionToken> {
                unreachable!()
            }
            async fn persist(&self, _token: &crate::auth::SessionToken) -> Result<()> {
                unreachable!()
            }
        }

        let auth = SessionAuthenticator::new(Arc::new(BrokenStore), AuthConfig::default());
        let conn = Recorder::new("app-1");
        let request = LoginRequest {
            email: "a@b.c".into(),
            password: "x".into(),
            remember: None,
        };

        login(&auth, request, ctx(&conn, LOGIN)).await.unwrap();

        let data = &conn.sent()[0]["data"];
        assert_eq!(data["result"], "error");
        assert_eq!(data["status"], 500);
    }

    #[tokio::test]
    async fn test_subscribe_uses_connection_app() {
        let manager = MemoryChannelManager::new();
        let conn = Recorder::new("app-7");

        subscribe(&manager, SubscribeRequest::new("news"), ctx(&conn, SUBSCRIBE))
            .await
            .unwrap();

        assert!(manager.channel("app-7", "news").unwrap().has_connection("10.20"));
        assert!(manager.channel("app-1", "news").is_none());
    }

    #[tokio::test]
    async fn test_subscribe_empty_channel_is_malformed() {
        let manager = MemoryChannelManager::new();
        let conn = Recorder::new("app-1");

        let result = subscribe(&manager, SubscribeRequest::new(""), ctx(&conn, SUBSCRIBE)).await;

        assert!(matches!(result, Err(ProtocolError::MalformedEvent(_))));
        assert_eq!(manager.channel_count("app-1"), 0);
    }

    #[tokio::test]
    async fn test_unsubscribe_removes_membership() {
        let manager = MemoryChannelManager::new();
        let conn = Recorder::new("app-1");

        subscribe(&manager, SubscribeRequest::new("news"), ctx(&conn, SUBSCRIBE))
            .await
            .unwrap();
        unsubscribe(
            &manager,
            UnsubscribeRequest {
                channel: "news".into(),
            },
            ctx(&conn, UNSUBSCRIBE),
        )
        .await
        .unwrap();

        assert_eq!(manager.channel("app-1", "news").unwrap().subscriber_count(), 0);
    }

    struct FailingChannels {
        unauthorized: bool,
    }

    #[async_trait]
    impl ChannelManager for FailingChannels {
        async fn find_or_create(
            &self,
            _app_id: &str,
            _channel: &str,
        ) -> Result<Arc<dyn crate::channel::ChannelHandle>> {
            if self.unauthorized {
                Err(ProtocolError::Unauthorized)
            } else {
                Err(ProtocolError::Channel("backend down".into()))
            }
        }

        async fn remove_from_all_channels(&self, _connection: &dyn Connection) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_subscribe_backend_failure_replies_error() {
        let channels = FailingChannels { unauthorized: false };
        let conn = Recorder::new("app-1");

        subscribe(&channels, SubscribeRequest::new("news"), ctx(&conn, SUBSCRIBE))
            .await
            .unwrap();

        let sent = conn.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["event"], "pusher:error");
        assert_eq!(sent[0]["data"]["code"], reply::ERROR_CODE_TRY_AGAIN);
        assert!(sent[0]["data"]["message"].as_str().unwrap().contains("backend down"));
    }

    #[tokio::test]
    async fn test_subscribe_unauthorized_replies_4009() {
        let channels = FailingChannels { unauthorized: true };
        let conn = Recorder::new("app-1");

        subscribe(&channels, SubscribeRequest::new("private-news"), ctx(&conn, SUBSCRIBE))
            .await
            .unwrap();

        assert_eq!(conn.sent()[0]["data"]["code"], reply::ERROR_CODE_UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unsubscribe_backend_failure_replies_error() {
        let channels = FailingChannels { unauthorized: false };
        let conn = Recorder::new("app-1");

        unsubscribe(
            &channels,
            UnsubscribeRequest {
                channel: "news".into(),
            },
            ctx(&conn, UNSUBSCRIBE),
        )
        .await
        .unwrap();

        assert_eq!(conn.sent()[0]["event"], "pusher:error");
    }

    #[test]
    fn test_register_all() {
        let mut registry = HandlerRegistry::new();
        let store = Arc::new(MemoryCredentialStore::new());

        register_ping(&mut registry);
        register_login(&mut registry, SessionAuthenticator::new(store, AuthConfig::default()));
        register_channel_operations(&mut registry, Arc::new(MemoryChannelManager::new()));

        assert_eq!(registry.keys(), vec![LOGIN, PING, SUBSCRIBE, UNSUBSCRIBE]);
    }
}
