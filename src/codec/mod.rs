//! Codec module - JSON serialization for envelopes and replies.
//!
//! Every frame on a Pusher-compatible socket is a JSON text message.
//! [`JsonCodec`] is the single place where values become wire text and
//! wire text becomes values.
//!
//! # Example
//!
//! ```
//! use pusher_protocol::codec::JsonCodec;
//! use serde_json::json;
//!
//! let text = JsonCodec::encode(&json!({ "event": "pusher:pong" })).unwrap();
//! assert_eq!(text, r#"{"event":"pusher:pong"}"#);
//!
//! let value: serde_json::Value = JsonCodec::decode(&text).unwrap();
//! assert_eq!(value["event"], "pusher:pong");
//! ```

mod json;

pub use json::JsonCodec;
