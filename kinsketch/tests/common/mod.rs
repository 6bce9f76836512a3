//! Common test utilities - KinsketchTest harness for end-to-end testing

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use kinsketch::gemini::test_utils::ScriptedGenerator;
use kinsketch::{Config, Server};
use reqwest::Client;
use tempfile::TempDir;
use tokio::task::JoinHandle;

/// Users every test server starts with
pub const TEST_USERS: &str = r#"{
  "demo_user": { "password": "demo123" },
  "grandma": { "password": "dumplings", "display_name": "外婆" }
}"#;

/// Test harness that runs a real kinsketch server on a random port
pub struct KinsketchTest {
    pub addr: SocketAddr,
    pub client: Client,
    pub generator: Arc<ScriptedGenerator>,
    pub users_path: PathBuf,
    server: Arc<Server>,
    _handle: JoinHandle<()>,
    /// Temp directory for the user store (cleaned up on drop)
    _temp_dir: TempDir,
}

impl KinsketchTest {
    /// Start a server with an API key and no scripted replies
    pub async fn start() -> Result<Self> {
        Self::start_with(Some("test-key"), ScriptedGenerator::new()).await
    }

    /// Start a server with the given API key and generator script
    pub async fn start_with(api_key: Option<&str>, generator: ScriptedGenerator) -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let users_path = temp_dir.path().join("data").join("users.json");
        std::fs::create_dir_all(temp_dir.path().join("data"))?;
        std::fs::write(&users_path, TEST_USERS)?;

        // Find a random available port
        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        let addr = listener.local_addr()?;
        drop(listener);

        let config = Config {
            bind_addr: addr,
            users_path: users_path.clone(),
            gemini_api_key: api_key.map(str::to_string),
            ..Config::default()
        };

        let generator = Arc::new(generator);
        let server = Arc::new(Server::with_generator(config, generator.clone()));
        let server_clone = server.clone();

        // Spawn the server in a background task
        let handle = tokio::spawn(async move {
            if let Err(e) = server_clone.run().await {
                eprintln!("Server error: {}", e);
            }
        });

        let client = Client::builder().timeout(Duration::from_secs(5)).build()?;

        // Poll until server is ready (max 2 seconds)
        let mut ready = false;
        for _ in 0..20 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if client
                .get(format!("http://{}/health", addr))
                .send()
                .await
                .is_ok()
            {
                ready = true;
                break;
            }
        }

        if !ready {
            panic!("Server failed to start within 2 seconds");
        }

        Ok(Self {
            addr,
            client,
            generator,
            users_path,
            server,
            _handle: handle,
            _temp_dir: temp_dir,
        })
    }

    /// Get the base URL for the server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> Result<reqwest::Response> {
        Ok(self.client.get(self.url(path)).send().await?)
    }

    /// Make an authenticated GET request
    pub async fn get_auth(&self, path: &str, token: &str) -> Result<reqwest::Response> {
        Ok(self
            .client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await?)
    }

    /// Make a POST request with JSON body
    pub async fn post<T: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<reqwest::Response> {
        Ok(self.client.post(self.url(path)).json(body).send().await?)
    }

    /// Make an authenticated POST request with JSON body
    pub async fn post_auth<T: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        token: &str,
        body: &T,
    ) -> Result<reqwest::Response> {
        Ok(self
            .client
            .post(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await?)
    }

    /// Make an authenticated DELETE request
    pub async fn delete_auth(&self, path: &str, token: &str) -> Result<reqwest::Response> {
        Ok(self
            .client
            .delete(self.url(path))
            .bearer_auth(token)
            .send()
            .await?)
    }

    /// Log in and return the session token
    pub async fn login(&self, username: &str, password: &str) -> Result<String> {
        let resp = self
            .post(
                "/auth/login",
                &serde_json::json!({ "username": username, "password": password }),
            )
            .await?;
        if !resp.status().is_success() {
            anyhow::bail!("login failed: {}", resp.status());
        }
        let body: serde_json::Value = resp.json().await?;
        body["token"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("no token in login response"))
    }

    /// Shutdown the server gracefully
    pub fn shutdown(&self) {
        self.server.shutdown();
    }
}

impl Drop for KinsketchTest {
    fn drop(&mut self) {
        self.server.shutdown();
    }
}
