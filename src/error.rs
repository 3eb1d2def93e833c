//! Error types for pusher-protocol.

use thiserror::Error;

/// Main error type for all protocol operations.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// I/O error while writing to the underlying transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Unparsable frame, missing required field or event name without a prefix.
    #[error("Malformed event: {0}")]
    MalformedEvent(String),

    /// Credentials were rejected by the credential store.
    #[error("Unauthorized")]
    Unauthorized,

    /// Writing a reply frame to the connection failed.
    #[error("Delivery failure: {0}")]
    DeliveryFailure(String),

    /// Credential store backend failure (not a credential mismatch).
    #[error("Credential store error: {0}")]
    Credential(String),

    /// Channel manager failure.
    #[error("Channel error: {0}")]
    Channel(String),
}

impl ProtocolError {
    /// Build a [`ProtocolError::MalformedEvent`] from anything displayable.
    pub fn malformed(reason: impl std::fmt::Display) -> Self {
        Self::MalformedEvent(reason.to_string())
    }

    /// True when the frame was rejected before any operation ran.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedEvent(_))
    }

    /// True when the connection can no longer accept frames.
    ///
    /// The transport layer should close and clean up the connection.
    pub fn is_delivery_failure(&self) -> bool {
        matches!(self, Self::DeliveryFailure(_) | Self::Io(_))
    }
}

/// Result type alias using ProtocolError.
pub type Result<T> = std::result::Result<T, ProtocolError>;
