//! Handler module - operation registry and per-frame context.
//!
//! Provides:
//! - [`HandlerRegistry`] - maps dispatch keys to operations
//! - [`RequestContext`] - lets an operation reply on the connection
//!
//! # Example
//!
//! ```
//! use pusher_protocol::handler::{HandlerRegistry, RequestContext};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct Typing {
//!     channel: String,
//! }
//!
//! let mut registry = HandlerRegistry::new();
//!
//! registry.register("typing", |data: Typing, ctx: RequestContext| async move {
//!     tracing::debug!(channel = %data.channel, socket_id = %ctx.socket_id(), "typing");
//!     Ok(())
//! });
//!
//! assert!(registry.contains("typing"));
//! ```

mod context;
mod registry;

pub use context::RequestContext;
pub use registry::{BoxFuture, Handler, HandlerRegistry, HandlerResult, TypedHandler};
