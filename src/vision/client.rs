//! Core [`GenerativeModel`] trait and the [`GeminiClient`] implementation.
//!
//! `GeminiClient` calls the Gemini `models/{model}:generateContent` REST
//! endpoint.  All connection details come from [`GeminiConfig`].

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::config::GeminiConfig;
use crate::media::{Image, ImageData};
use crate::vision::prompt::scene_schema;

// ---------------------------------------------------------------------------
// GenAiError
// ---------------------------------------------------------------------------

/// Errors that can occur while calling a generative model.
#[derive(Debug, Error)]
pub enum GenAiError {
    /// No credential configured for this provider.
    #[error("generative model API key is not configured")]
    MissingApiKey,

    /// HTTP transport or connection error.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("generative model request timed out")]
    Timeout,

    /// The provider answered with a non-success status.
    #[error("generative model returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The HTTP response could not be parsed as expected JSON.
    #[error("failed to parse model response: {0}")]
    Parse(String),

    /// The response contained no usable content.
    #[error("model returned an empty response")]
    EmptyResponse,
}

impl From<reqwest::Error> for GenAiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            GenAiError::Timeout
        } else {
            GenAiError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// ContentPart
// ---------------------------------------------------------------------------

/// One ordered part of a multimodal response.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentPart {
    Image(ImageData),
    Text(String),
}

// ---------------------------------------------------------------------------
// GenerativeModel trait
// ---------------------------------------------------------------------------

/// Async interface to a vision-capable generative model.
///
/// Implementors must be `Send + Sync` so they can be shared as
/// `Arc<dyn GenerativeModel>`.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// `false` when the credential is missing; callers skip the model.
    fn is_configured(&self) -> bool;

    /// Describe `image` following `instruction`, answering in
    /// [`SceneSound`](crate::vision::SceneSound) JSON.
    async fn describe_image(&self, image: &Image, instruction: &str)
        -> Result<String, GenAiError>;

    /// Plain text completion.
    async fn generate_text(&self, prompt: &str) -> Result<String, GenAiError>;

    /// Image + text generation from an input image and a prompt.
    async fn generate_image_and_text(
        &self,
        image: &Image,
        prompt: &str,
    ) -> Result<Vec<ContentPart>, GenAiError>;
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    text: Option<String>,
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

impl GenerateResponse {
    /// Parts of the first candidate, in order.  Undecodable inline images
    /// are dropped with a warning.
    fn into_parts(self) -> Result<Vec<ContentPart>, GenAiError> {
        let candidate = self
            .candidates
            .into_iter()
            .next()
            .ok_or(GenAiError::EmptyResponse)?;
        let parts = candidate.content.map(|c| c.parts).unwrap_or_default();

        let mut out = Vec::with_capacity(parts.len());
        for part in parts {
            if let Some(inline) = part.inline_data {
                match ImageData::from_base64(inline.mime_type, &inline.data) {
                    Ok(image) => out.push(ContentPart::Image(image)),
                    Err(e) => log::warn!("gemini: dropping undecodable inline image: {e}"),
                }
            } else if let Some(text) = part.text {
                out.push(ContentPart::Text(text));
            }
        }
        Ok(out)
    }

    /// Concatenated text of the first candidate.
    fn into_text(self) -> Result<String, GenAiError> {
        let text: String = self
            .into_parts()?
            .into_iter()
            .filter_map(|p| match p {
                ContentPart::Text(t) => Some(t),
                ContentPart::Image(_) => None,
            })
            .collect();
        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(GenAiError::EmptyResponse);
        }
        Ok(text)
    }
}

// ---------------------------------------------------------------------------
// GeminiClient
// ---------------------------------------------------------------------------

/// Calls the Gemini `generateContent` endpoint.
pub struct GeminiClient {
    client: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiClient {
    /// Build a client from config.  The HTTP client carries the per-request
    /// timeout from `config.timeout_secs`.
    pub fn from_config(config: &GeminiConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
        }
    }

    fn api_key(&self) -> Result<&str, GenAiError> {
        self.config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(GenAiError::MissingApiKey)
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            model
        )
    }

    async fn image_part(&self, image: &Image) -> Result<serde_json::Value, GenAiError> {
        let data = image
            .resolve(&self.client)
            .await
            .map_err(|e| GenAiError::Request(e.to_string()))?;
        Ok(json!({
            "inline_data": { "mime_type": data.mime_type, "data": data.to_base64() }
        }))
    }

    async fn generate(
        &self,
        model: &str,
        body: serde_json::Value,
    ) -> Result<GenerateResponse, GenAiError> {
        let key = self.api_key()?;

        let response = self
            .client
            .post(self.endpoint(model))
            .header("x-goog-api-key", key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenAiError::Http {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<GenerateResponse>()
            .await
            .map_err(|e| GenAiError::Parse(e.to_string()))
    }
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    fn is_configured(&self) -> bool {
        self.api_key().is_ok()
    }

    async fn describe_image(
        &self,
        image: &Image,
        instruction: &str,
    ) -> Result<String, GenAiError> {
        let body = json!({
            "systemInstruction": { "parts": [{ "text": instruction }] },
            "contents": [{ "parts": [self.image_part(image).await?] }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": scene_schema()
            }
        });
        self.generate(&self.config.analysis_model, body)
            .await?
            .into_text()
    }

    async fn generate_text(&self, prompt: &str) -> Result<String, GenAiError> {
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });
        self.generate(&self.config.analysis_model, body)
            .await?
            .into_text()
    }

    async fn generate_image_and_text(
        &self,
        image: &Image,
        prompt: &str,
    ) -> Result<Vec<ContentPart>, GenAiError> {
        let body = json!({
            "contents": [{ "parts": [self.image_part(image).await?, { "text": prompt }] }],
            "generationConfig": { "responseModalities": ["IMAGE", "TEXT"] }
        });
        let parts = self
            .generate(&self.config.image_model, body)
            .await?
            .into_parts()?;
        if parts.is_empty() {
            return Err(GenAiError::EmptyResponse);
        }
        Ok(parts)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
