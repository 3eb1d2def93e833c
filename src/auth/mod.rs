//! Session authentication.
//!
//! - [`CredentialStore`] - the credential-store collaborator
//! - [`SessionAuthenticator`] - checks credentials, mints and persists tokens
//! - [`SessionToken`] - bearer token with a bounded lifetime
//! - [`MemoryCredentialStore`] - in-process store for tests and single-node setups

mod authenticator;
mod memory;
mod store;
mod token;

pub use authenticator::{LoginReply, LoginRequest, SessionAuthenticator};
pub use memory::MemoryCredentialStore;
pub use store::{CredentialStore, Identity};
pub use token::{SessionToken, TokenLifetime, TokenType};
