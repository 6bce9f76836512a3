//! kinsketch_init - Seed the user store
//!
//! Adds or updates one account in the JSON user store. The store path and
//! password scheme come from the server's config unless given here.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use kinsketch::auth::PasswordScheme;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// kinsketch user store tool
#[derive(Parser, Debug)]
#[command(name = "kinsketch_init", version, about = "Add a user to the kinsketch user store")]
struct Args {
    /// TOML config file (defaults to ./kinsketch.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to the JSON user store
    #[arg(short, long)]
    users: Option<PathBuf>,

    /// Display name shown after login
    #[arg(long)]
    display_name: Option<String>,

    /// Seed the demo account (demo_user / demo123) instead of reading credentials
    #[arg(long)]
    demo: bool,

    /// Password storage scheme: plaintext or sha256
    #[arg(long, value_parser = parse_scheme)]
    scheme: Option<PasswordScheme>,
}

fn parse_scheme(s: &str) -> Result<PasswordScheme, String> {
    PasswordScheme::from_str(s).ok_or_else(|| format!("unknown password scheme '{}'", s))
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kinsketch=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let settings = kinsketch::init::store_settings(args.config.as_deref(), args.users, args.scheme)?;

    if args.demo {
        kinsketch::init::seed_demo(&settings.users_path, settings.scheme)?;
        return Ok(());
    }

    // Read credentials from environment
    let username = std::env::var("KINSKETCH_USERNAME")
        .map_err(|_| anyhow::anyhow!("KINSKETCH_USERNAME environment variable is required"))?;

    let password = std::env::var("KINSKETCH_PASSWORD")
        .map_err(|_| anyhow::anyhow!("KINSKETCH_PASSWORD environment variable is required"))?;

    kinsketch::init::add_user(
        &settings.users_path,
        settings.scheme,
        &username,
        &password,
        args.display_name.as_deref(),
    )?;

    Ok(())
}
