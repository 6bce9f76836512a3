//! Login sessions
//!
//! Each login gets an explicit `SessionContext` holding the conversation and
//! the images generated so far. `SessionManager` maps bearer tokens to
//! contexts; logging out drops the context and everything in it.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::auth::accounts::Account;
use crate::auth::generate_token;
use crate::gemini::TextGenerator;
use crate::images::{
    generate_image, ConversationTurn, Gallery, GenerateError, GenerateOptions, ImageSummary,
};

/// Assistant turn recorded after a successful generation
pub fn reflection_reply(text: &str) -> String {
    format!("已为你生成了一张关于'{}'的图片", text)
}

/// State of one logged-in user
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub username: String,
    pub display_name: Option<String>,
    pub history: Vec<ConversationTurn>,
    pub gallery: Gallery,
    pub created_at: DateTime<Utc>,
}

impl SessionContext {
    pub fn new(account: &Account) -> Self {
        Self {
            username: account.username.clone(),
            display_name: account.display_name.clone(),
            history: Vec::new(),
            gallery: Gallery::new(),
            created_at: Utc::now(),
        }
    }

    /// Add a reflection and turn the conversation into an image
    ///
    /// The user turn stays in the history even when generation fails.
    pub async fn reflect(
        &mut self,
        generator: &dyn TextGenerator,
        api_key: &str,
        options: &GenerateOptions,
        text: &str,
    ) -> Result<ImageSummary, GenerateError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(GenerateError::InvalidInput(
                "reflection text cannot be empty",
            ));
        }

        self.history.push(ConversationTurn::user(text));
        let generated = generate_image(generator, &self.history, api_key, options).await?;

        let summary = self
            .gallery
            .store(&generated)
            .map_err(|e| GenerateError::Storage(format!("failed to encode image: {}", e)))?
            .summary();
        self.history
            .push(ConversationTurn::assistant(&reflection_reply(text)));

        info!("Generated image {} for '{}'", summary.hash, self.username);
        Ok(summary)
    }

    /// Forget the conversation and images, keeping the login
    pub fn clear(&mut self) {
        self.history.clear();
        self.gallery.clear();
    }
}

/// Shared handle to one session
pub type SessionHandle = Arc<Mutex<SessionContext>>;

/// Token -> session registry
#[derive(Debug, Default)]
pub struct SessionManager {
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a session for an authenticated account, returning its token
    pub fn create(&self, account: &Account) -> String {
        let token = generate_token();
        self.sessions.write().insert(
            token.clone(),
            Arc::new(Mutex::new(SessionContext::new(account))),
        );
        debug!("Session created for '{}'", account.username);
        token
    }

    pub fn get(&self, token: &str) -> Option<SessionHandle> {
        self.sessions.read().get(token).cloned()
    }

    /// End a session, returning true if it existed
    pub fn remove(&self, token: &str) -> bool {
        self.sessions.write().remove(token).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}
