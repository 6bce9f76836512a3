//! Account service
//!
//! Handles credential checks and user upserts against the flat-file store.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use super::store::CredentialStore;
use super::{CredentialVerifier, PlaintextVerifier};

/// Account data returned on successful authentication
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub username: String,
    pub display_name: Option<String>,
}

impl Account {
    /// Name to greet the user with
    pub fn greeting_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.username)
    }
}

/// Authentication errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("username and password must not be empty")]
    InvalidInput,

    #[error("user '{0}' does not exist")]
    UnknownUser(String),

    #[error("wrong password")]
    WrongCredential,

    #[error("failed to save user data: {0}")]
    Persistence(#[from] std::io::Error),
}

/// Account service over a credential store file
#[derive(Clone)]
pub struct AccountService {
    store_path: PathBuf,
    verifier: Arc<dyn CredentialVerifier>,
}

impl AccountService {
    /// Create a new account service
    pub fn new(store_path: impl Into<PathBuf>, verifier: Arc<dyn CredentialVerifier>) -> Self {
        Self {
            store_path: store_path.into(),
            verifier,
        }
    }

    /// Account service comparing plaintext passwords
    pub fn plaintext(store_path: impl Into<PathBuf>) -> Self {
        Self::new(store_path, Arc::new(PlaintextVerifier))
    }

    pub fn store_path(&self) -> &Path {
        &self.store_path
    }

    /// Load the current store snapshot
    pub fn load_store(&self) -> CredentialStore {
        CredentialStore::load(&self.store_path)
    }

    /// Check a username/password pair against the store
    pub fn authenticate(&self, username: &str, password: &str) -> Result<Account, AuthError> {
        if username.is_empty() || password.is_empty() {
            return Err(AuthError::InvalidInput);
        }

        let store = self.load_store();
        let record = store
            .get(username)
            .ok_or_else(|| AuthError::UnknownUser(username.to_string()))?;

        if !self.verifier.verify(&record.password, password) {
            debug!("Password mismatch for '{}'", username);
            return Err(AuthError::WrongCredential);
        }

        info!("User '{}' authenticated", username);
        Ok(Account {
            username: username.to_string(),
            display_name: record.display_name.clone(),
        })
    }

    /// Insert or replace a user, returning true if the user is new
    ///
    /// Fields of an existing record other than the password and display name
    /// are kept.
    pub fn upsert_user(
        &self,
        username: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<bool, AuthError> {
        if username.is_empty() || password.is_empty() {
            return Err(AuthError::InvalidInput);
        }

        let mut store = self.load_store();
        let mut record = store.get(username).cloned().unwrap_or_default();
        record.password = self.verifier.seal(password);
        if let Some(name) = display_name {
            record.display_name = Some(name.to_string());
        }

        let created = store.insert(username, record).is_none();
        store.save(&self.store_path)?;

        info!(
            "{} user '{}' in {}",
            if created { "Created" } else { "Updated" },
            username,
            self.store_path.display()
        );
        Ok(created)
    }
}

/// Demo account shipped with fresh installs
pub const DEMO_USERNAME: &str = "demo_user";
pub const DEMO_PASSWORD: &str = "demo123";
