//! kinsketch - family reflection sketchboard server

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use kinsketch::{Config, Server};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Family reflection sketchboard server
#[derive(Parser, Debug)]
#[command(name = "kinsketch", version, about = "Turn short reflections into AI images")]
struct Args {
    /// TOML config file (defaults to ./kinsketch.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// Path to the JSON user store
    #[arg(short, long)]
    users: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "kinsketch=info,tower_http=debug".into());
    if args.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(users) = args.users {
        config.users_path = users;
    }

    // Create and run server
    let server = Server::new(config)?;
    server.run().await?;

    Ok(())
}
