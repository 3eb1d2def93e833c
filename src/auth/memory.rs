//! In-memory credential store.

use std::collections::HashMap;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{Duration, Utc};
use parking_lot::RwLock;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::RngCore;

use super::store::{CredentialStore, Identity};
use super::token::SessionToken;
use crate::error::{ProtocolError, Result};

/// Bytes of randomness in an issued token.
const TOKEN_BYTES: usize = 40;

/// Bytes of salt per password.
const SALT_BYTES: usize = 16;

struct UserRecord {
    identity: Identity,
    /// Argon2id hash in PHC string form.
    phc: String,
}

/// Credential store that keeps users and tokens in process memory.
///
/// Passwords are stored as Argon2id PHC strings with a per-user salt.
#[derive(Default)]
pub struct MemoryCredentialStore {
    users: RwLock<HashMap<String, UserRecord>>,
    tokens: RwLock<HashMap<String, SessionToken>>,
}

impl MemoryCredentialStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a user and return its identity.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::Credential`] if the password cannot be hashed.
    pub fn add_user(&self, email: &str, password: &str) -> Result<Identity> {
        let phc = hash_password(password)?;

        let mut users = self.users.write();
        let id = users
            .get(email)
            .map(|existing| existing.identity.id.clone())
            .unwrap_or_else(|| (users.len() + 1).to_string());
        let identity = Identity {
            id,
            email: email.to_string(),
        };

        users.insert(
            email.to_string(),
            UserRecord {
                identity: identity.clone(),
                phc,
            },
        );
        Ok(identity)
    }

    /// Look up a persisted, unexpired token.
    pub fn find_token(&self, value: &str) -> Option<SessionToken> {
        self.tokens
            .read()
            .get(value)
            .filter(|t| !t.is_expired_at(Utc::now()))
            .cloned()
    }

    /// Number of persisted tokens (expired ones included).
    pub fn token_count(&self) -> usize {
        self.tokens.read().len()
    }

    /// All persisted tokens of one identity.
    pub fn tokens_for(&self, identity_id: &str) -> Vec<SessionToken> {
        self.tokens
            .read()
            .values()
            .filter(|t| t.identity_id == identity_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn authenticate(&self, email: &str, password: &str) -> Result<Identity> {
        let (identity, phc) = {
            let users = self.users.read();
            let record = users.get(email).ok_or(ProtocolError::Unauthorized)?;
            (record.identity.clone(), record.phc.clone())
        };

        if !verify_password(password, &phc)? {
            return Err(ProtocolError::Unauthorized);
        }
        Ok(identity)
    }

    async fn issue_token(
        &self,
        identity: &Identity,
        name: &str,
        ttl: Duration,
    ) -> Result<SessionToken> {
        let mut bytes = [0u8; TOKEN_BYTES];
        rand::rng().fill_bytes(&mut bytes);

        let issued_at = Utc::now();
        Ok(SessionToken::bearer(
            URL_SAFE_NO_PAD.encode(bytes),
            identity.id.clone(),
            name,
            issued_at,
            issued_at + ttl,
        ))
    }

    async fn persist(&self, token: &SessionToken) -> Result<()> {
        self.tokens.write().insert(token.value.clone(), token.clone());
        Ok(())
    }
}

fn hash_password(password: &str) -> Result<String> {
    let mut bytes = [0u8; SALT_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    let salt = SaltString::encode_b64(&bytes).map_err(credential_error)?;

    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(credential_error)?;
    Ok(hash.to_string())
}

/// `Ok(false)` on a mismatch, `Err` if the stored hash is unreadable.
fn verify_password(password: &str, phc: &str) -> Result<bool> {
    let parsed = PasswordHash::new(phc).map_err(credential_error)?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

fn credential_error(e: argon2::password_hash::Error) -> ProtocolError {
    ProtocolError::Credential(e.to_string())
}
