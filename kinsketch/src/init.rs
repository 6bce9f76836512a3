//! User store seeding
//!
//! Backs the kinsketch_init tool.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use tracing::info;

use crate::auth::accounts::{AccountService, DEMO_PASSWORD, DEMO_USERNAME};
use crate::auth::PasswordScheme;
use crate::config::Config;

/// Where and how the tool writes users
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    pub users_path: PathBuf,
    pub scheme: PasswordScheme,
}

/// Resolve the user store path and password scheme the server would use,
/// letting command-line values win over the layered config
pub fn store_settings(
    config_file: Option<&Path>,
    users: Option<PathBuf>,
    scheme: Option<PasswordScheme>,
) -> Result<StoreSettings> {
    let config = Config::load(config_file)?;
    Ok(StoreSettings {
        users_path: users.unwrap_or(config.users_path),
        scheme: scheme.unwrap_or(config.password_scheme),
    })
}

/// Add or update one user in the store at `path`
///
/// # Errors
/// * Empty username or password
/// * The store can't be written
pub fn add_user(
    path: &Path,
    scheme: PasswordScheme,
    username: &str,
    password: &str,
    display_name: Option<&str>,
) -> Result<()> {
    if username.trim().is_empty() {
        bail!("Username must not be empty");
    }
    if password.is_empty() {
        bail!("Password must not be empty");
    }

    let service = AccountService::new(path, scheme.verifier());
    let created = service.upsert_user(username, password, display_name)?;
    info!(
        "{} '{}' in {} ({} users total)",
        if created { "Added" } else { "Updated" },
        username,
        path.display(),
        service.load_store().len()
    );
    Ok(())
}

/// Write the demo account into the store at `path`, keeping other users
pub fn seed_demo(path: &Path, scheme: PasswordScheme) -> Result<()> {
    add_user(path, scheme, DEMO_USERNAME, DEMO_PASSWORD, None)?;
    info!(
        "Demo account ready: {} / {}",
        DEMO_USERNAME, DEMO_PASSWORD
    );
    Ok(())
}
