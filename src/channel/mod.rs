//! Channel membership.
//!
//! The channel manager is an external collaborator: it owns channel state,
//! authorization policy and broadcast. The protocol core only finds or
//! creates a channel and asks it to add or remove a connection.
//!
//! [`MemoryChannelManager`] keeps membership in process memory and treats
//! every channel as public.

mod manager;
mod memory;

pub use manager::{ChannelHandle, ChannelManager, SubscribeRequest, UnsubscribeRequest};
pub use memory::{MemoryChannel, MemoryChannelManager};
