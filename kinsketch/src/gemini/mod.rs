//! Gemini integration
//!
//! Provides:
//! - The `TextGenerator` seam the image bridge calls through
//! - `GeminiClient`, an HTTP implementation over the `generateContent` API

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Default model for image generation prompts
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Default API base URL
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Failure of a remote text generation call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The service could not be reached (connect failure, timeout)
    #[error("connection failed: {0}")]
    Connectivity(String),

    /// The service answered with an error, or the answer was unusable
    #[error("{0}")]
    Api(String),
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() {
            RemoteError::Connectivity(e.to_string())
        } else {
            RemoteError::Api(format!("Request failed: {}", e))
        }
    }
}

/// Converts a prompt into a text response
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Send one prompt, returning the response text (`None` when the reply carries no text)
    async fn generate_text(
        &self,
        api_key: &str,
        model: &str,
        prompt: &str,
    ) -> Result<Option<String>, RemoteError>;
}

/// A content part
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

/// generateContent request
#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

/// generateContent response
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

/// Error envelope returned by Google APIs
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

impl GenerateResponse {
    /// Text of the first candidate, parts concatenated
    fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

/// Gemini API client
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
}

impl GeminiClient {
    /// Create a new client with a per-request timeout
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            base_url,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate_text(
        &self,
        api_key: &str,
        model: &str,
        prompt: &str,
    ) -> Result<Option<String>, RemoteError> {
        let request = GenerateRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some(prompt.to_string()),
                }],
            }],
        };

        debug!("Sending generateContent request for model {}", model);

        let response = self
            .client
            .post(self.endpoint(model))
            .header("x-goog-api-key", api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("Gemini API error: {} - {}", status, body);
            let detail = match serde_json::from_str::<ErrorResponse>(&body) {
                Ok(err) => match err.error.status {
                    Some(code) => format!("{} ({})", err.error.message, code),
                    None => err.error.message,
                },
                Err(_) => body,
            };
            return Err(RemoteError::Api(format!("API error: {} - {}", status, detail)));
        }

        // Body read errors (a timeout mid-stream included) go through From<reqwest::Error>
        let body = response.bytes().await?;
        let parsed: GenerateResponse = serde_json::from_slice(&body)
            .map_err(|e| RemoteError::Api(format!("Failed to parse response: {}", e)))?;

        Ok(parsed.text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let request = GenerateRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some("hello".to_string()),
                }],
            }],
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["contents"][0]["role"], "user");
        assert_eq!(value["contents"][0]["parts"][0]["text"], "hello");
    }

    #[test]
    fn test_response_text_concatenates_parts() {
        let body = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"a"},{"text":"b"}]}}]}"#;
        let parsed: GenerateResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.text().as_deref(), Some("ab"));
    }

    #[test]
    fn test_response_without_text() {
        let blocked = r#"{"candidates":[],"promptFeedback":{"blockReason":"SAFETY"}}"#;
        let parsed: GenerateResponse = serde_json::from_str(blocked).unwrap();
        assert!(parsed.text().is_none());

        let no_content = r#"{"candidates":[{"finishReason":"SAFETY"}]}"#;
        let parsed: GenerateResponse = serde_json::from_str(no_content).unwrap();
        assert!(parsed.text().is_none());

        let empty_text = r#"{"candidates":[{"content":{"parts":[{"text":""}]}}]}"#;
        let parsed: GenerateResponse = serde_json::from_str(empty_text).unwrap();
        assert!(parsed.text().is_none());
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let client = GeminiClient::new("http://localhost:9999/v1beta/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            client.endpoint("gemini-1.5-flash"),
            "http://localhost:9999/v1beta/models/gemini-1.5-flash:generateContent"
        );
    }

    #[tokio::test]
    async fn test_unreachable_host_is_connectivity_error() {
        // Bind then drop to get a port nothing listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = GeminiClient::new(format!("http://{}", addr), Duration::from_secs(2)).unwrap();
        let result = client.generate_text("key", DEFAULT_MODEL, "prompt").await;
        assert!(matches!(result, Err(RemoteError::Connectivity(_))));
    }
}
