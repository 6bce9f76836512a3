//! Authentication module
//!
//! Provides:
//! - Flat-file credential store (`store`)
//! - Username/password checks against that store (`accounts`)
//! - Pluggable credential verification and session token generation

pub mod accounts;
pub mod store;

use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub use accounts::{AccountService, AuthError};
pub use store::{CredentialStore, UserRecord};

/// Prefix marking a salted SHA-256 stored password
const SHA256_PREFIX: &str = "sha256";

/// Generate a secure random session token
pub fn generate_token() -> String {
    let random_bytes: [u8; 32] = rand::rng().random();
    let mut hasher = Sha256::new();
    hasher.update(random_bytes);
    hasher.update(
        chrono::Utc::now()
            .timestamp_nanos_opt()
            .unwrap_or(0)
            .to_le_bytes(),
    );
    hex::encode(hasher.finalize())
}

/// Generate a random salt for password hashing
pub fn generate_salt() -> String {
    let random_bytes: [u8; 16] = rand::rng().random();
    hex::encode(random_bytes)
}

/// Hash a password with a salt
pub fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// Compares a supplied secret against the value kept in the store.
///
/// Lookup logic never inspects stored passwords directly, so a hashing
/// scheme can replace plaintext storage without touching it.
pub trait CredentialVerifier: Send + Sync {
    /// Check a supplied password against the stored value
    fn verify(&self, stored: &str, supplied: &str) -> bool;

    /// Turn a new password into the form written to the store
    fn seal(&self, password: &str) -> String;
}

/// Exact string equality against a plaintext stored value
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaintextVerifier;

impl CredentialVerifier for PlaintextVerifier {
    fn verify(&self, stored: &str, supplied: &str) -> bool {
        stored == supplied
    }

    fn seal(&self, password: &str) -> String {
        password.to_string()
    }
}

/// Salted SHA-256, stored as `sha256$<salt>$<hash>`
#[derive(Debug, Clone, Copy, Default)]
pub struct SaltedSha256Verifier;

impl CredentialVerifier for SaltedSha256Verifier {
    fn verify(&self, stored: &str, supplied: &str) -> bool {
        let mut parts = stored.splitn(3, '$');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(SHA256_PREFIX), Some(salt), Some(hash)) => hash_password(supplied, salt) == hash,
            _ => false,
        }
    }

    fn seal(&self, password: &str) -> String {
        let salt = generate_salt();
        format!(
            "{}${}${}",
            SHA256_PREFIX,
            salt,
            hash_password(password, &salt)
        )
    }
}

/// How stored passwords are compared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PasswordScheme {
    #[default]
    Plaintext,
    Sha256,
}

impl PasswordScheme {
    /// Build the verifier for this scheme
    pub fn verifier(&self) -> Arc<dyn CredentialVerifier> {
        match self {
            PasswordScheme::Plaintext => Arc::new(PlaintextVerifier),
            PasswordScheme::Sha256 => Arc::new(SaltedSha256Verifier),
        }
    }

    /// Parse from string
    pub fn from_str(s: &str) -> Option<PasswordScheme> {
        match s.to_lowercase().as_str() {
            "plaintext" | "plain" => Some(PasswordScheme::Plaintext),
            "sha256" | "hashed" => Some(PasswordScheme::Sha256),
            _ => None,
        }
    }
}
