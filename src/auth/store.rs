//! Credential-store collaborator interface.

use async_trait::async_trait;
use chrono::Duration;
use serde::{Deserialize, Serialize};

use super::token::SessionToken;
use crate::error::Result;

/// An authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Stable user id.
    pub id: String,
    /// Login email.
    pub email: String,
}

/// Where credentials are checked and tokens are kept.
///
/// Implementations own their concurrency; the authenticator calls them
/// from many connections at once.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Check an email/password pair.
    ///
    /// Returns [`ProtocolError::Unauthorized`](crate::ProtocolError::Unauthorized)
    /// on a mismatch and [`ProtocolError::Credential`](crate::ProtocolError::Credential)
    /// when the backend itself fails.
    async fn authenticate(&self, email: &str, password: &str) -> Result<Identity>;

    /// Mint a new token for `identity`, valid for `ttl`.
    ///
    /// The token is not usable until [`persist`](Self::persist) is called.
    async fn issue_token(&self, identity: &Identity, name: &str, ttl: Duration)
        -> Result<SessionToken>;

    /// Save a token (including its final expiry).
    async fn persist(&self, token: &SessionToken) -> Result<()>;
}
