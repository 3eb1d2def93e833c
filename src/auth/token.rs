//! Bearer session tokens.

use chrono::{DateTime, Duration, Months, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Token scheme. Only bearer tokens are issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenType {
    /// `Authorization: Bearer <token>`
    Bearer,
}

impl TokenType {
    /// Wire name of the scheme.
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Bearer => "Bearer",
        }
    }
}

/// How long a freshly issued token stays valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenLifetime {
    /// One day.
    Session,
    /// One calendar month ("remember me").
    Remembered,
}

impl TokenLifetime {
    /// Pick the lifetime for a login request's `remember` flag.
    pub fn from_remember(remember: bool) -> Self {
        if remember {
            TokenLifetime::Remembered
        } else {
            TokenLifetime::Session
        }
    }

    /// Expiry for a token issued at `issued_at`.
    pub fn expires_at(self, issued_at: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            TokenLifetime::Session => issued_at + Duration::days(1),
            TokenLifetime::Remembered => issued_at
                .checked_add_months(Months::new(1))
                .unwrap_or_else(|| issued_at + Duration::days(30)),
        }
    }

    /// Time to live for a token issued at `issued_at`.
    pub fn ttl_from(self, issued_at: DateTime<Utc>) -> Duration {
        self.expires_at(issued_at) - issued_at
    }
}

/// A bearer token issued after a successful login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionToken {
    /// Opaque token string handed to the client.
    pub value: String,
    /// Token scheme.
    pub token_type: TokenType,
    /// Id of the identity the token was issued to.
    pub identity_id: String,
    /// Name the token was issued under.
    pub name: String,
    /// Issue time.
    pub issued_at: DateTime<Utc>,
    /// Expiry time.
    pub expires_at: DateTime<Utc>,
}

impl SessionToken {
    /// Create a bearer token.
    pub fn bearer(
        value: impl Into<String>,
        identity_id: impl Into<String>,
        name: impl Into<String>,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            value: value.into(),
            token_type: TokenType::Bearer,
            identity_id: identity_id.into(),
            name: name.into(),
            issued_at,
            expires_at,
        }
    }

    /// Whether the token is expired at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Expiry as ISO-8601 (`2024-01-02T03:04:05Z`).
    pub fn expires_at_iso(&self) -> String {
        self.expires_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}
