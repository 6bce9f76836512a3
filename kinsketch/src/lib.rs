//! kinsketch - family reflection sketchboard
//!
//! Users log in against a flat-file credential store, type a short
//! reflection, and get back an image generated by a remote model.

pub mod api;
pub mod auth;
pub mod config;
pub mod gemini;
pub mod images;
pub mod init;
pub mod session;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

pub use config::Config;

use api::AppState;
use gemini::{GeminiClient, TextGenerator};

/// The kinsketch server instance
pub struct Server {
    state: AppState,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Server {
    /// Create a new server talking to the configured Gemini endpoint
    pub fn new(config: Config) -> Result<Self> {
        let client = GeminiClient::new(config.gemini_base_url.clone(), config.request_timeout())?;
        Ok(Self::with_generator(config, Arc::new(client)))
    }

    /// Create a server with a custom text generator
    pub fn with_generator(config: Config, generator: Arc<dyn TextGenerator>) -> Self {
        if config.api_key().is_none() {
            warn!("No Gemini API key configured; image generation will be refused");
        }
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            state: AppState::new(config, generator),
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Shared application state
    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Build the router
    fn router(&self) -> Router {
        api::router(self.state.clone())
    }

    /// Run the server until shutdown
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.state.config.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        info!("kinsketch listening on {}", local_addr);
        info!(
            "User store: {}",
            self.state.accounts.store_path().display()
        );

        let router = self.router();
        let mut shutdown_rx = self.shutdown_rx.clone();

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown_rx.changed().await.ok();
            })
            .await?;

        info!("kinsketch shutdown complete");
        Ok(())
    }

    /// Signal the server to shutdown
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Get the configured bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.state.config.bind_addr
    }
}
