//! Protocol module - wire vocabulary for Pusher-compatible sockets.
//!
//! - [`Envelope`] - one parsed inbound frame (`{ "event", "data"? }`)
//! - [`resolve_event`] - wire event name to dispatch key
//! - [`reply`] - outbound frame builders and event names

mod envelope;
mod event;
pub mod reply;

pub use envelope::Envelope;
pub use event::{resolve_event, to_camel_case};

/// Default vendor prefix for control events (`pusher:ping`, `pusher:pong`).
pub const DEFAULT_VENDOR_PREFIX: &str = "pusher";
