//! Envelope - one parsed inbound frame.
//!
//! # Example
//!
//! ```
//! use pusher_protocol::protocol::Envelope;
//!
//! let envelope = Envelope::parse(r#"{"event":"pusher:subscribe","data":{"channel":"news"}}"#).unwrap();
//! assert_eq!(envelope.event(), "pusher:subscribe");
//! assert_eq!(envelope.data()["channel"], "news");
//! assert_eq!(envelope.dispatch_key().unwrap(), "subscribe");
//! ```

use serde::Deserialize;
use serde_json::{Map, Value};

use super::event::resolve_event;
use crate::error::{ProtocolError, Result};

/// Wire shape of an inbound frame.
#[derive(Deserialize)]
struct RawEnvelope {
    event: String,
    #[serde(default)]
    data: Option<Value>,
}

/// A parsed inbound frame.
///
/// `event` is never empty. `data` is an empty object when the frame had
/// no `data` member or an explicit `null`.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    event: String,
    data: Value,
}

impl Envelope {
    /// Create an envelope from its parts.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::MalformedEvent`] if `event` is empty.
    pub fn new(event: impl Into<String>, data: Option<Value>) -> Result<Self> {
        let event = event.into();
        if event.is_empty() {
            return Err(ProtocolError::malformed("event name is empty"));
        }

        let data = match data {
            None | Some(Value::Null) => Value::Object(Map::new()),
            Some(v) => v,
        };

        Ok(Self { event, data })
    }

    /// Parse one raw text frame.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::MalformedEvent`] if the frame is not a JSON
    /// object with a non-empty string `event`.
    pub fn parse(raw: &str) -> Result<Self> {
        let parsed: RawEnvelope = serde_json::from_str(raw).map_err(ProtocolError::malformed)?;
        Self::new(parsed.event, parsed.data)
    }

    /// The raw wire event name.
    #[inline]
    pub fn event(&self) -> &str {
        &self.event
    }

    /// The opaque data payload.
    #[inline]
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Consume the envelope, keeping only the payload.
    #[inline]
    pub fn into_data(self) -> Value {
        self.data
    }

    /// Resolve the dispatch key for this envelope's event.
    pub fn dispatch_key(&self) -> Result<String> {
        resolve_event(&self.event)
    }
}
