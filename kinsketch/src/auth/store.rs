//! Flat-file credential store
//!
//! Users live in a single JSON object mapping username to record:
//!
//! ```json
//! { "demo_user": { "password": "demo123", "display_name": "Demo" } }
//! ```
//!
//! A missing or unparsable file reads as an empty store. A single malformed
//! record only affects that user: its string fields are salvaged and a
//! non-string password reads as empty, so it matches nothing. Writes replace the
//! whole file through a temp file and rename, so a crash mid-write leaves
//! the previous snapshot intact.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use super::AuthError;

/// Stored fields for one user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Stored password, in whatever form the configured verifier expects
    #[serde(default)]
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Fields this service doesn't interpret, written back untouched
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl UserRecord {
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            password: password.into(),
            ..Default::default()
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Read one record, keeping whatever parts of it are usable
    fn from_value(username: &str, value: Value) -> Self {
        match serde_json::from_value(value.clone()) {
            Ok(record) => record,
            Err(e) => {
                warn!("User record '{}' is malformed: {}", username, e);
                let mut extra: BTreeMap<String, Value> = match value {
                    Value::Object(fields) => fields.into_iter().collect(),
                    _ => BTreeMap::new(),
                };
                let password = extra
                    .remove("password")
                    .and_then(|v| v.as_str().map(str::to_string))
                    .unwrap_or_default();
                let display_name = extra
                    .remove("display_name")
                    .and_then(|v| v.as_str().map(str::to_string));
                Self {
                    password,
                    display_name,
                    extra,
                }
            }
        }
    }
}

/// Username -> record mapping persisted as one JSON file
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CredentialStore {
    users: BTreeMap<String, UserRecord>,
}

impl<'de> Deserialize<'de> for CredentialStore {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, Value>::deserialize(deserializer)?;
        let users = raw
            .into_iter()
            .map(|(username, value)| {
                let record = UserRecord::from_value(&username, value);
                (username, record)
            })
            .collect();
        Ok(Self { users })
    }
}

impl CredentialStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the store from disk, degrading to empty on any read or parse failure
    pub fn load(path: &Path) -> Self {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                debug!("No readable user store at {}: {}", path.display(), e);
                return Self::new();
            }
        };

        match serde_json::from_str(&content) {
            Ok(store) => store,
            Err(e) => {
                warn!(
                    "User store {} is malformed, treating as empty: {}",
                    path.display(),
                    e
                );
                Self::new()
            }
        }
    }

    /// Persist a full snapshot, replacing whatever is on disk
    pub fn save(&self, path: &Path) -> Result<(), AuthError> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, self).map_err(std::io::Error::from)?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;

        debug!("Saved {} users to {}", self.users.len(), path.display());
        Ok(())
    }

    pub fn get(&self, username: &str) -> Option<&UserRecord> {
        self.users.get(username)
    }

    /// Insert or replace a user, returning the previous record
    pub fn insert(&mut self, username: impl Into<String>, record: UserRecord) -> Option<UserRecord> {
        self.users.insert(username.into(), record)
    }

    pub fn contains(&self, username: &str) -> bool {
        self.users.contains_key(username)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn usernames(&self) -> impl Iterator<Item = &str> {
        self.users.keys().map(String::as_str)
    }
}
