//! Server configuration
//!
//! Layered with figment: built-in defaults, then an optional TOML file,
//! then `KINSKETCH_*` environment variables. `GEMINI_API_KEY` is honoured
//! as well since that's where most setups already keep the key.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::auth::PasswordScheme;
use crate::gemini::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::images::{GenerateOptions, DEFAULT_CONTEXT_WINDOW};

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "kinsketch.toml";

/// Server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub bind_addr: SocketAddr,
    /// Path to the JSON user store
    pub users_path: PathBuf,
    pub gemini_api_key: Option<String>,
    pub gemini_base_url: String,
    pub model_name: String,
    /// Trailing conversation turns sent with each prompt
    pub context_window: usize,
    pub request_timeout_secs: u64,
    pub password_scheme: PasswordScheme,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8501)),
            users_path: PathBuf::from("data/users.json"),
            gemini_api_key: None,
            gemini_base_url: DEFAULT_BASE_URL.to_string(),
            model_name: DEFAULT_MODEL.to_string(),
            context_window: DEFAULT_CONTEXT_WINDOW,
            request_timeout_secs: 60,
            password_scheme: PasswordScheme::default(),
        }
    }
}

impl Config {
    /// Figment with every layer except CLI overrides
    pub fn figment(config_file: Option<&Path>) -> Figment {
        let file = config_file
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(file))
            .merge(Env::raw().only(&["GEMINI_API_KEY"]).map(|_| "gemini_api_key".into()))
            .merge(Env::prefixed("KINSKETCH_"))
    }

    /// Load and validate configuration
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        Self::from_figment(Self::figment(config_file))
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.context_window == 0 {
            bail!("context_window must be a positive integer");
        }
        if self.request_timeout_secs == 0 {
            bail!("request_timeout_secs must be a positive integer");
        }
        if self.model_name.trim().is_empty() {
            bail!("model_name must not be empty");
        }
        Ok(())
    }

    /// API key, if one is set and non-blank
    pub fn api_key(&self) -> Option<&str> {
        self.gemini_api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn generate_options(&self) -> GenerateOptions {
        GenerateOptions::default()
            .with_window_size(self.context_window)
            .with_model(self.model_name.clone())
    }
}
