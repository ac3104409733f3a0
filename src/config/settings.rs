//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across tasks.
//!
//! Provider credentials are optional.  A missing key never fails startup; it
//! only disables the provider that needs it (see
//! [`TransformationOrchestrator`](crate::transform::TransformationOrchestrator)).

use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;
use crate::vision::Mood;

// ---------------------------------------------------------------------------
// ProviderKind
// ---------------------------------------------------------------------------

/// One link of the image-transformation fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// fal queue model with the full status-polling loop.
    Primary,
    /// fal queue model with a single delayed result poll.
    Secondary,
    /// Gemini image+text generation (transform and analysis in one call).
    Multimodal,
}

// ---------------------------------------------------------------------------
// GeminiConfig
// ---------------------------------------------------------------------------

/// Settings for the Gemini vision / multimodal provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    /// API key: `None` disables scene analysis and the multimodal fallback.
    pub api_key: Option<String>,
    /// REST base URL.
    pub base_url: String,
    /// Model used for scene analysis and effect regeneration.
    pub analysis_model: String,
    /// Model used for the image+text transformation fallback.
    pub image_model: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://generativelanguage.googleapis.com".into(),
            analysis_model: "gemini-2.5-flash".into(),
            image_model: "gemini-2.5-flash-image-preview".into(),
            timeout_secs: 60,
        }
    }
}

// ---------------------------------------------------------------------------
// FalConfig
// ---------------------------------------------------------------------------

/// Settings for the fal queue image-edit models.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FalConfig {
    /// API key: `None` disables both fal links of the chain.
    pub api_key: Option<String>,
    /// Queue base URL.
    pub base_url: String,
    /// Model path of the primary (fully polled) provider.
    pub primary_model: String,
    /// Model path of the secondary (single-poll) provider.
    pub secondary_model: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for FalConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://queue.fal.run".into(),
            primary_model: "fal-ai/gemini-25-flash-image/edit".into(),
            secondary_model: "fal-ai/flux/dev".into(),
            timeout_secs: 30,
        }
    }
}

// ---------------------------------------------------------------------------
// ElevenLabsConfig
// ---------------------------------------------------------------------------

/// Settings for ElevenLabs speech and sound-effect synthesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ElevenLabsConfig {
    /// API key: `None` leaves every audio channel silent.
    pub api_key: Option<String>,
    /// REST base URL.
    pub base_url: String,
    /// Voice used for narration.
    pub voice_id: String,
    /// Text-to-speech model.
    pub speech_model: String,
    /// Text-to-sound model.
    pub sound_model: String,
    /// Voice stability (0.0 – 1.0).
    pub stability: f32,
    /// Voice similarity boost (0.0 – 1.0).
    pub similarity_boost: f32,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ElevenLabsConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.elevenlabs.io".into(),
            voice_id: "Xb7hH8MSUJpSbSDYk0k2".into(),
            speech_model: "eleven_monolingual_v1".into(),
            sound_model: "eleven_text_to_sound_v2".into(),
            stability: 0.5,
            similarity_boost: 0.5,
            timeout_secs: 60,
        }
    }
}

// ---------------------------------------------------------------------------
// TransformConfig
// ---------------------------------------------------------------------------

/// Fallback-chain order and job-polling parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    /// Providers tried in order until one yields an image.
    pub chain: Vec<ProviderKind>,
    /// Wait before each status poll of the primary provider.
    pub poll_interval_ms: u64,
    /// Status polls before the primary job is declared timed out.
    pub max_poll_attempts: u32,
    /// Wait before the one result poll of the secondary provider.
    pub single_shot_delay_ms: u64,
}

impl TransformConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn single_shot_delay(&self) -> Duration {
        Duration::from_millis(self.single_shot_delay_ms)
    }
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            chain: vec![
                ProviderKind::Primary,
                ProviderKind::Secondary,
                ProviderKind::Multimodal,
            ],
            poll_interval_ms: 2_000,
            max_poll_attempts: 30,
            single_shot_delay_ms: 3_000,
        }
    }
}

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Playback settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Requested length of the looping ambience track.
    pub ambience_duration_secs: f32,
    /// Ambience channel volume at startup (0 – 100).
    pub initial_ambience_volume: u8,
    /// Effect channel volume at startup (0 – 100).
    pub initial_effect_volume: u8,
    /// Output device name: `None` means the system default.
    pub output_device: Option<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            ambience_duration_secs: 10.0,
            initial_ambience_volume: 100,
            initial_effect_volume: 100,
            output_device: None,
        }
    }
}

// ---------------------------------------------------------------------------
// UiConfig
// ---------------------------------------------------------------------------

/// Timings of the status surfaces shown to the UI layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// How long an error banner stays up.
    pub banner_secs: u64,
    /// Interval between loading-message changes while busy.
    pub loading_interval_ms: u64,
}

impl UiConfig {
    pub fn banner_duration(&self) -> Duration {
        Duration::from_secs(self.banner_secs)
    }

    pub fn loading_interval(&self) -> Duration {
        Duration::from_millis(self.loading_interval_ms)
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            banner_secs: 4,
            loading_interval_ms: 2_000,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use sound_snapper::config::AppConfig;
///
/// // Load (returns Default when file is missing), then let the
/// // environment supply credentials.
/// let mut config = AppConfig::load().unwrap();
/// config.apply_env();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Mood selected at startup.
    pub mood: Mood,
    /// Gemini settings.
    pub gemini: GeminiConfig,
    /// fal settings.
    pub fal: FalConfig,
    /// ElevenLabs settings.
    pub elevenlabs: ElevenLabsConfig,
    /// Transformation chain settings.
    pub transform: TransformConfig,
    /// Playback settings.
    pub audio: AudioConfig,
    /// Status-surface timings.
    pub ui: UiConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path.
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Override credentials from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|name| std::env::var(name).ok());
    }

    /// Override credentials using `lookup` in place of the environment.
    ///
    /// `GEMINI_API_KEY` wins over the legacy `API_KEY`.  Empty values are
    /// ignored, and an empty key already in the file counts as missing.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty("GEMINI_API_KEY").or_else(|| non_empty("API_KEY")) {
            self.gemini.api_key = Some(key);
        }
        if let Some(key) = non_empty("FAL_API_KEY") {
            self.fal.api_key = Some(key);
        }
        if let Some(key) = non_empty("ELEVENLABS_API_KEY") {
            self.elevenlabs.api_key = Some(key);
        }

        for key in [
            &mut self.gemini.api_key,
            &mut self.fal.api_key,
            &mut self.elevenlabs.api_key,
        ] {
            if key.as_deref().is_some_and(|k| k.trim().is_empty()) {
                *key = None;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
