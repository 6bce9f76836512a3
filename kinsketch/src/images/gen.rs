//! Reflection image generation
//!
//! Three steps:
//! 1. Render the tail of the conversation into a text prompt
//! 2. Ask the text model for a reply containing an image data URL
//! 3. Scrape the base64 payload out of the reply and decode it

use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine,
};
use chrono::{DateTime, Utc};
use image::DynamicImage;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::gemini::{RemoteError, TextGenerator, DEFAULT_MODEL};

/// Default number of trailing turns sent to the model
pub const DEFAULT_CONTEXT_WINDOW: usize = 6;

/// Appended after the rendered conversation
pub const IMAGE_INSTRUCTION: &str =
    "根据以上对话内容，生成一张相关的图片。请返回base64编码的图片数据。";

static DATA_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"data:image/(?:png|jpeg|jpg);base64,([^)"\s]+)"#).expect("valid data URL pattern")
});

/// Standard alphabet, tolerant of missing padding
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Speaker of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One message of the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: &str) -> Self {
        Self {
            role: Role::User,
            content: content.to_string(),
        }
    }

    pub fn assistant(content: &str) -> Self {
        Self {
            role: Role::Assistant,
            content: content.to_string(),
        }
    }
}

/// A decoded image and where it came from
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub image: DynamicImage,
    pub prompt: String,
    pub created_at: DateTime<Utc>,
}

/// Image generation errors
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),

    #[error("empty response from API")]
    EmptyResponse,

    #[error("no image found in response")]
    NoImageFound,

    #[error("failed to decode image: {0}")]
    DecodeError(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("API error: {0}")]
    RemoteApi(String),

    #[error("failed to store image: {0}")]
    Storage(String),
}

impl GenerateError {
    /// True for failures worth retrying once connectivity is back
    pub fn is_network(&self) -> bool {
        matches!(self, GenerateError::Network(_))
    }
}

impl From<RemoteError> for GenerateError {
    fn from(e: RemoteError) -> Self {
        match e {
            RemoteError::Connectivity(msg) => GenerateError::Network(msg),
            // Some providers only report connectivity trouble as text
            RemoteError::Api(msg) if msg.contains("Network") || msg.contains("Connection") => {
                GenerateError::Network(msg)
            }
            RemoteError::Api(msg) => GenerateError::RemoteApi(msg),
        }
    }
}

/// Options for one generation call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateOptions {
    pub window_size: usize,
    pub model_name: String,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_CONTEXT_WINDOW,
            model_name: DEFAULT_MODEL.to_string(),
        }
    }
}

impl GenerateOptions {
    pub fn with_window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size;
        self
    }

    pub fn with_model(mut self, model_name: impl Into<String>) -> Self {
        self.model_name = model_name.into();
        self
    }
}

/// The last `window_size` turns, oldest first
pub fn context_window(history: &[ConversationTurn], window_size: usize) -> &[ConversationTurn] {
    let start = history.len().saturating_sub(window_size);
    &history[start..]
}

/// Render turns as `role: content` lines followed by the image instruction
pub fn build_prompt(turns: &[ConversationTurn]) -> String {
    let mut prompt = turns
        .iter()
        .map(|turn| format!("{}: {}", turn.role.as_str(), turn.content))
        .collect::<Vec<_>>()
        .join("\n");
    prompt.push_str("\n\n");
    prompt.push_str(IMAGE_INSTRUCTION);
    prompt
}

/// Base64 payload of the first image data URL in `text`
pub fn extract_base64_image(text: &str) -> Option<&str> {
    DATA_URL
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Decode a base64 payload into an image
pub fn decode_image(payload: &str) -> Result<DynamicImage, GenerateError> {
    let bytes = PAYLOAD_ENGINE
        .decode(payload)
        .map_err(|e| GenerateError::DecodeError(format!("invalid base64: {}", e)))?;
    image::load_from_memory(&bytes)
        .map_err(|e| GenerateError::DecodeError(format!("invalid image data: {}", e)))
}

/// Generate an image from the tail of a conversation
pub async fn generate_image(
    generator: &dyn TextGenerator,
    history: &[ConversationTurn],
    api_key: &str,
    options: &GenerateOptions,
) -> Result<GeneratedImage, GenerateError> {
    if history.is_empty() {
        return Err(GenerateError::InvalidInput(
            "conversation history cannot be empty",
        ));
    }
    if options.window_size == 0 {
        return Err(GenerateError::InvalidInput(
            "context window must be a positive integer",
        ));
    }
    if api_key.is_empty() {
        return Err(GenerateError::InvalidInput("API key is not configured"));
    }

    let window = context_window(history, options.window_size);
    let prompt = build_prompt(window);
    debug!(
        "Built prompt from {} of {} turns: {}",
        window.len(),
        history.len(),
        prompt
    );

    let text = generator
        .generate_text(api_key, &options.model_name, &prompt)
        .await
        .map_err(|e| {
            warn!("Text generation failed: {}", e);
            GenerateError::from(e)
        })?
        .filter(|t| !t.is_empty())
        .ok_or(GenerateError::EmptyResponse)?;

    let payload = extract_base64_image(&text).ok_or_else(|| {
        debug!("No image data URL in response: {}", text);
        GenerateError::NoImageFound
    })?;

    let image = decode_image(payload)?;
    info!(
        "Decoded {}x{} image from {} model response",
        image.width(),
        image.height(),
        options.model_name
    );

    let reflection = window
        .iter()
        .rev()
        .find(|turn| turn.role == Role::User)
        .map(|turn| turn.content.clone())
        .unwrap_or(prompt);

    Ok(GeneratedImage {
        image,
        prompt: reflection,
        created_at: Utc::now(),
    })
}
