//! Speech and sound-effect synthesis.
//!
//! [`Synthesizer`] is the seam the [`AudioOrchestrator`](crate::audio::AudioOrchestrator)
//! talks to; [`ElevenLabsClient`] is the production implementation
//! (text-to-speech and sound-generation endpoints, both answering MP3).

use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;

use crate::config::ElevenLabsConfig;

// ---------------------------------------------------------------------------
// SynthError
// ---------------------------------------------------------------------------

/// Errors that can occur while synthesizing audio.
#[derive(Debug, Error)]
pub enum SynthError {
    #[error("synthesis API key is not configured")]
    MissingApiKey,

    #[error("nothing to synthesize: empty text")]
    EmptyText,

    #[error("HTTP request failed: {0}")]
    Request(String),

    #[error("synthesis request timed out")]
    Timeout,

    #[error("synthesis failed with HTTP {status}")]
    Http { status: u16 },
}

impl From<reqwest::Error> for SynthError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SynthError::Timeout
        } else {
            SynthError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// SoundRequest
// ---------------------------------------------------------------------------

/// Shape of a sound-generation request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoundRequest {
    /// Ask for a seamlessly loopable clip.
    pub looping: bool,
    /// Requested clip length; `None` lets the provider decide.
    pub duration_secs: Option<f32>,
}

impl SoundRequest {
    pub fn one_shot() -> Self {
        Self {
            looping: false,
            duration_secs: None,
        }
    }

    pub fn looping(duration_secs: f32) -> Self {
        Self {
            looping: true,
            duration_secs: Some(duration_secs),
        }
    }
}

// ---------------------------------------------------------------------------
// Synthesizer trait
// ---------------------------------------------------------------------------

/// Turns text into playable, encoded audio bytes.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// `false` when no credential is configured.
    fn is_configured(&self) -> bool;

    /// Spoken narration of `text`.
    async fn speech(&self, text: &str) -> Result<Vec<u8>, SynthError>;

    /// A generated sound matching the description `text`.
    async fn sound(&self, text: &str, request: SoundRequest) -> Result<Vec<u8>, SynthError>;
}

// ---------------------------------------------------------------------------
// ElevenLabsClient
// ---------------------------------------------------------------------------

/// ElevenLabs REST client.
pub struct ElevenLabsClient {
    client: reqwest::Client,
    config: ElevenLabsConfig,
}

impl ElevenLabsClient {
    pub fn from_config(config: &ElevenLabsConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
        }
    }

    fn api_key(&self) -> Result<&str, SynthError> {
        self.config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(SynthError::MissingApiKey)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn sound_body(&self, text: &str, request: SoundRequest) -> serde_json::Value {
        let mut body = json!({
            "text": text,
            "model_id": self.config.sound_model,
        });
        if request.looping {
            body["loop"] = json!(true);
        }
        if let Some(secs) = request.duration_secs {
            body["duration_seconds"] = json!(secs);
        }
        body
    }

    async fn post_audio(&self, url: String, body: serde_json::Value) -> Result<Vec<u8>, SynthError> {
        let key = self.api_key()?;
        let response = self
            .client
            .post(url)
            .header(reqwest::header::ACCEPT, "audio/mpeg")
            .header("xi-api-key", key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SynthError::Http {
                status: status.as_u16(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl Synthesizer for ElevenLabsClient {
    fn is_configured(&self) -> bool {
        self.api_key().is_ok()
    }

    async fn speech(&self, text: &str) -> Result<Vec<u8>, SynthError> {
        if text.trim().is_empty() {
            return Err(SynthError::EmptyText);
        }
        let body = json!({
            "text": text,
            "model_id": self.config.speech_model,
            "voice_settings": {
                "stability": self.config.stability,
                "similarity_boost": self.config.similarity_boost
            }
        });
        let url = self.url(&format!("/v1/text-to-speech/{}", self.config.voice_id));
        self.post_audio(url, body).await
    }

    async fn sound(&self, text: &str, request: SoundRequest) -> Result<Vec<u8>, SynthError> {
        if text.trim().is_empty() {
            return Err(SynthError::EmptyText);
        }
        let body = self.sound_body(text, request);
        self.post_audio(self.url("/v1/sound-generation"), body).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
