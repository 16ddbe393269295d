//! Multimodal inference client.
//!
//! [`VisionClient`] is the seam between the enrichment pipeline and the
//! model endpoint: production code talks to Gemini through [`GeminiClient`],
//! tests swap in [`MockVisionClient`] with scripted replies. The client
//! returns the raw reply text untouched; decoding belongs to
//! [`crate::attrs::parse_attributes`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::prompt::ImagePayload;

/// Model used when none is configured explicitly.
pub const DEFAULT_MODEL: &str = "gemini-3-flash-preview";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum VisionError {
    #[error("GEMINI_API_KEY environment variable not set")]
    MissingApiKey,

    /// Transport-level failure before any HTTP status was received.
    #[error("inference request failed: {0}")]
    Http(String),

    /// The endpoint answered with a non-success status.
    #[error("inference endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The endpoint answered 200 but the body was not the expected shape.
    #[error("inference response decode error: {0}")]
    Parse(String),

    /// The reply carried no text parts at all.
    #[error("inference reply contained no text")]
    EmptyResponse,
}

// ============================================================================
// Client Trait
// ============================================================================

/// Raw text reply from the inference endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
}

/// A client that can describe a garment image.
///
/// `describe` sends one prompt plus one encoded image and returns the
/// model's reply text verbatim, markdown fences and all.
#[async_trait]
pub trait VisionClient: Send + Sync {
    async fn describe(
        &self,
        prompt: &str,
        image: &ImagePayload,
    ) -> Result<Completion, VisionError>;
}

// ============================================================================
// Gemini Client
// ============================================================================

/// [`VisionClient`] backed by the Gemini `generateContent` REST endpoint.
pub struct GeminiClient {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl GeminiClient {
    /// Build a client from the `GEMINI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self, VisionError> {
        let api_key = std::env::var("GEMINI_API_KEY").map_err(|_| VisionError::MissingApiKey)?;
        Ok(Self::new(api_key))
    }

    pub fn new(api_key: String) -> Self {
        Self::with_model(api_key, DEFAULT_MODEL.to_string())
    }

    pub fn with_model(api_key: String, model: String) -> Self {
        Self {
            api_key,
            model,
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
            self.model
        )
    }
}

#[async_trait]
impl VisionClient for GeminiClient {
    async fn describe(
        &self,
        prompt: &str,
        image: &ImagePayload,
    ) -> Result<Completion, VisionError> {
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text { text: prompt },
                    Part::Inline {
                        inline_data: InlineData {
                            mime_type: image.mime_type,
                            data: &image.data,
                        },
                    },
                ],
            }],
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| VisionError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(VisionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let reply: GenerateResponse = response
            .json()
            .await
            .map_err(|e| VisionError::Parse(e.to_string()))?;

        extract_text(reply)
    }
}

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: &'a str },
    Inline { inline_data: InlineData<'a> },
}

#[derive(Serialize)]
struct InlineData<'a> {
    mime_type: &'static str,
    data: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ReplyPart>,
}

#[derive(Deserialize)]
struct ReplyPart {
    text: Option<String>,
}

/// Pull the reply text out of the first candidate, joining multiple text
/// parts in order.
fn extract_text(reply: GenerateResponse) -> Result<Completion, VisionError> {
    let text = reply
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    if text.is_empty() {
        return Err(VisionError::EmptyResponse);
    }
    Ok(Completion { text })
}

// ============================================================================
// Mock Client (test support)
// ============================================================================

#[cfg(test)]
pub struct MockVisionClient {
    results: std::sync::Mutex<std::collections::VecDeque<Result<String, VisionError>>>,
}

#[cfg(test)]
impl MockVisionClient {
    pub fn new(replies: Vec<String>) -> Self {
        Self::with_results(replies.into_iter().map(Ok).collect())
    }

    pub fn with_results(results: Vec<Result<String, VisionError>>) -> Self {
        Self {
            results: std::sync::Mutex::new(results.into()),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl VisionClient for MockVisionClient {
    async fn describe(
        &self,
        _prompt: &str,
        _image: &ImagePayload,
    ) -> Result<Completion, VisionError> {
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .map(|r| r.map(|text| Completion { text }))
            .expect("MockVisionClient ran out of scripted replies")
    }
}

// ============================================================================
// Tests
// ============================================================================
