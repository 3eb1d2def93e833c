//! Login: credential check, token minting and the login reply.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::store::CredentialStore;
use super::token::{SessionToken, TokenLifetime};
use crate::config::AuthConfig;
use crate::error::Result;

/// Payload of a login frame.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    /// Login email.
    pub email: String,
    /// Plain-text password.
    pub password: String,
    /// Ask for a long-lived token. Falls back to
    /// [`AuthConfig::remember_by_default`] when absent.
    #[serde(default)]
    pub remember: Option<bool>,
}

/// Checks credentials and issues session tokens.
///
/// The credential store is passed in explicitly; the authenticator keeps
/// no state of its own.
#[derive(Clone)]
pub struct SessionAuthenticator {
    store: Arc<dyn CredentialStore>,
    config: AuthConfig,
}

impl SessionAuthenticator {
    /// Create an authenticator over `store`.
    pub fn new(store: Arc<dyn CredentialStore>, config: AuthConfig) -> Self {
        Self { store, config }
    }

    /// The authenticator's configuration.
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Lifetime a token for `request` will get.
    pub fn lifetime_for(&self, request: &LoginRequest) -> TokenLifetime {
        TokenLifetime::from_remember(request.remember.unwrap_or(self.config.remember_by_default))
    }

    /// Verify the request's credentials and issue a persisted token.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::Unauthorized`](crate::ProtocolError::Unauthorized) on
    /// bad credentials; store failures are passed through.
    pub async fn login(&self, request: &LoginRequest) -> Result<SessionToken> {
        let identity = self
            .store
            .authenticate(&request.email, &request.password)
            .await?;

        let lifetime = self.lifetime_for(request);
        let ttl = lifetime.ttl_from(Utc::now());

        let mut token = self
            .store
            .issue_token(&identity, &self.config.token_name, ttl)
            .await?;
        // Expiry is pinned to the store's issue time, not ours.
        token.expires_at = lifetime.expires_at(token.issued_at);
        self.store.persist(&token).await?;

        debug!(
            identity = %identity.id,
            ?lifetime,
            expires_at = %token.expires_at,
            "issued session token"
        );
        Ok(token)
    }
}

/// Reply body of the login operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginReply {
    /// `"ok"` or `"error"`.
    pub result: &'static str,
    /// HTTP-style status code.
    pub status: u16,
    /// Human-readable failure message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Failure category.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<&'static str>,
    /// Token scheme, on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<&'static str>,
    /// Opaque bearer token, on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Token expiry as ISO-8601, on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
}

impl LoginReply {
    /// `200 ok` carrying the issued token.
    pub fn success(token: &SessionToken) -> Self {
        Self {
            result: "ok",
            status: 200,
            message: None,
            errors: None,
            token_type: Some(token.token_type.as_str()),
            token: Some(token.value.clone()),
            expires_at: Some(token.expires_at_iso()),
        }
    }

    /// `401` for rejected credentials.
    pub fn unauthorized() -> Self {
        Self::error(401, "You cannot sign with those credentials", "Unauthorised")
    }

    /// `500` for a credential store that could not answer.
    pub fn server_error() -> Self {
        Self::error(500, "Unable to sign in right now", "ServerError")
    }

    fn error(status: u16, message: &str, errors: &'static str) -> Self {
        Self {
            result: "error",
            status,
            message: Some(message.to_string()),
            errors: Some(errors),
            token_type: None,
            token: None,
            expires_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryCredentialStore;
    use crate::error::ProtocolError;
    use chrono::{Duration, Months};
    use serde_json::json;

    fn setup() -> (Arc<MemoryCredentialStore>, SessionAuthenticator) {
        let store = Arc::new(MemoryCredentialStore::new());
        store.add_user("alice@example.com", "wonderland").unwrap();
        let auth = SessionAuthenticator::new(store.clone(), AuthConfig::default());
        (store, auth)
    }

    fn request(password: &str, remember: Option<bool>) -> LoginRequest {
        LoginRequest {
            email: "alice@example.com".into(),
            password: password.into(),
            remember,
        }
    }

    #[tokio::test]
    async fn test_login_issues_one_day_token() {
        let (store, auth) = setup();

        let token = auth.login(&request("wonderland", None)).await.unwrap();

        assert!(!token.value.is_empty());
        assert_eq!(token.expires_at - token.issued_at, Duration::days(1));
        assert_eq!(token.name, "pusher-protocol");
        assert_eq!(store.find_token(&token.value).unwrap(), token);
    }

    #[tokio::test]
    async fn test_login_remember_issues_one_month_token() {
        let (_store, auth) = setup();

        let token = auth.login(&request("wonderland", Some(true))).await.unwrap();

        assert_eq!(
            Some(token.expires_at),
            token.issued_at.checked_add_months(Months::new(1))
        );
    }

    #[tokio::test]
    async fn test_remember_by_default() {
        let store = Arc::new(MemoryCredentialStore::new());
        let auth = SessionAuthenticator::new(
            store,
            AuthConfig {
                remember_by_default: true,
                ..AuthConfig::default()
            },
        );

        assert_eq!(
            auth.lifetime_for(&request("x", None)),
            TokenLifetime::Remembered
        );
        assert_eq!(
            auth.lifetime_for(&request("x", Some(false))),
            TokenLifetime::Session
        );
    }

    #[tokio::test]
    async fn test_login_bad_password() {
        let (store, auth) = setup();

        let result = auth.login(&request("wrong", None)).await;

        assert!(matches!(result, Err(ProtocolError::Unauthorized)));
        assert_eq!(store.token_count(), 0);
    }

    #[test]
    fn test_login_request_remember_is_optional() {
        let req: LoginRequest =
            serde_json::from_value(json!({ "email": "a@b.c", "password": "p" })).unwrap();
        assert_eq!(req.remember, None);

        let req: LoginRequest = serde_json::from_value(
            json!({ "email": "a@b.c", "password": "p", "remember": true }),
        )
        .unwrap();
        assert_eq!(req.remember, Some(true));
    }

    #[test]
    fn test_reply_shapes() {
        let value = serde_json::to_value(LoginReply::unauthorized()).unwrap();
        assert_eq!(
            value,
            json!({
                "result": "error",
                "status": 401,
                "message": "You cannot sign with those credentials",
                "errors": "Unauthorised",
            })
        );

        let now = Utc::now();
        let token = SessionToken::bearer("abc", "1", "app", now, now + Duration::days(1));
        let value = serde_json::to_value(LoginReply::success(&token)).unwrap();
        assert_eq!(value["result"], "ok");
        assert_eq!(value["status"], 200);
        assert_eq!(value["token_type"], "Bearer");
        assert_eq!(value["token"], "abc");
        assert_eq!(value["expires_at"], token.expires_at_iso());
        assert!(value.get("message").is_none());
    }
}
