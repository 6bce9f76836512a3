//! Scripted text generator for tests
//!
//! Replays queued responses in order and records every prompt it receives,
//! so bridge and API tests can run without a network.

use std::collections::VecDeque;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use parking_lot::Mutex;

use super::{RemoteError, TextGenerator};

/// A recorded call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub api_key: String,
    pub model: String,
    pub prompt: String,
}

/// Text generator answering from a queue
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    responses: Mutex<VecDeque<Result<Option<String>, RemoteError>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a text reply
    pub fn reply(self, text: impl Into<String>) -> Self {
        self.responses.lock().push_back(Ok(Some(text.into())));
        self
    }

    /// Queue a reply carrying no text
    pub fn reply_empty(self) -> Self {
        self.responses.lock().push_back(Ok(None));
        self
    }

    /// Queue a failure
    pub fn fail(self, error: RemoteError) -> Self {
        self.responses.lock().push_back(Err(error));
        self
    }

    /// Queue a reply embedding a PNG as a data URL
    pub fn reply_with_png(self, png: &[u8]) -> Self {
        self.reply(png_reply(png))
    }

    pub fn push(&self, response: Result<Option<String>, RemoteError>) {
        self.responses.lock().push_back(response);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.calls.lock().last().map(|c| c.prompt.clone())
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate_text(
        &self,
        api_key: &str,
        model: &str,
        prompt: &str,
    ) -> Result<Option<String>, RemoteError> {
        self.calls.lock().push(RecordedCall {
            api_key: api_key.to_string(),
            model: model.to_string(),
            prompt: prompt.to_string(),
        });
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(RemoteError::Api("no scripted response left".to_string())))
    }
}

/// Model-style reply text wrapping a PNG data URL
pub fn png_reply(png: &[u8]) -> String {
    format!(
        "Here is your picture:\n![sketch](data:image/png;base64,{})\nHope you like it!",
        BASE64.encode(png)
    )
}

/// Encode a small deterministic RGBA test pattern as PNG
pub fn sample_png(width: u32, height: u32) -> (image::RgbaImage, Vec<u8>) {
    let bitmap = image::RgbaImage::from_fn(width, height, |x, y| {
        image::Rgba([(x * 40) as u8, (y * 60) as u8, ((x + y) * 25) as u8, 255])
    });
    let mut bytes = std::io::Cursor::new(Vec::new());
    // Writing a PNG into memory only fails on encoder bugs
    image::DynamicImage::ImageRgba8(bitmap.clone())
        .write_to(&mut bytes, image::ImageFormat::Png)
        .expect("encode test PNG");
    (bitmap, bytes.into_inner())
}
