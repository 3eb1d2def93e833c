//! Router configuration.
//!
//! Plain structs with defaults; set them through
//! [`RouterBuilder`](crate::RouterBuilder) or construct them directly.

use crate::protocol::DEFAULT_VENDOR_PREFIX;

/// Default name tokens are issued under.
pub const DEFAULT_TOKEN_NAME: &str = "pusher-protocol";

/// Configuration for the login operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    /// Name recorded on every issued token.
    pub token_name: String,
    /// Lifetime used when a login request carries no `remember` flag.
    /// `false` issues one-day tokens, `true` one-month tokens.
    pub remember_by_default: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_name: DEFAULT_TOKEN_NAME.to_string(),
            remember_by_default: false,
        }
    }
}

/// Configuration for the protocol router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterConfig {
    /// Prefix of control events on the wire (`pusher` → `pusher:pong`).
    pub vendor_prefix: String,
    /// Login settings.
    pub auth: AuthConfig,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            vendor_prefix: DEFAULT_VENDOR_PREFIX.to_string(),
            auth: AuthConfig::default(),
        }
    }
}
