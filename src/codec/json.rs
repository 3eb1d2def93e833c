//! JSON codec using `serde_json`.
//!
//! Encoding always produces compact, single-line text.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{ProtocolError, Result};

/// JSON codec for frames and operation payloads.
pub struct JsonCodec;

impl JsonCodec {
    /// Encode a value to compact JSON text.
    ///
    /// # Errors
    ///
    /// Returns error if the value cannot be serialized.
    #[inline]
    pub fn encode<T: Serialize>(value: &T) -> Result<String> {
        Ok(serde_json::to_string(value)?)
    }

    /// Decode JSON text to a value.
    ///
    /// # Errors
    ///
    /// Returns error if the text is not valid JSON for type T.
    #[inline]
    pub fn decode<T: DeserializeOwned>(text: &str) -> Result<T> {
        Ok(serde_json::from_str(text)?)
    }

    /// Decode an operation payload from an already-parsed value.
    ///
    /// A payload that does not match `T` (missing required field, wrong
    /// type) is a [`ProtocolError::MalformedEvent`], not a JSON error:
    /// the frame itself parsed fine, the client just sent the wrong shape.
    pub fn decode_payload<T: DeserializeOwned>(value: Value) -> Result<T> {
        serde_json::from_value(value).map_err(ProtocolError::malformed)
    }
}
