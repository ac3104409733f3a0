//! [`SoundPipeline`]: image + mood → [`SceneSound`] → three audio channels.
//!
//! # Flow
//!
//! ```text
//! analyze(image, mood)
//!   └─▶ GenerativeModel::describe_image (JSON mode)
//!         ├─ Ok + valid SceneSound → present: narration, ambience, effect
//!         └─ Err / invalid JSON    → fallback SceneSound, narration only
//! ```
//!
//! Each synthesis request starts only after the previous one has started;
//! nothing here waits for a clip to finish.

use std::sync::Arc;

use thiserror::Error;

use crate::audio::{AudioOrchestrator, ChannelKind, ChannelOutcome, PlayOptions, PlaybackTicket};
use crate::media::Image;
use crate::vision::{parse_scene_sound, GenAiError, GenerativeModel, Mood, PromptBuilder, SceneError, SceneSound};

// ---------------------------------------------------------------------------
// AnalysisError
// ---------------------------------------------------------------------------

/// Why an analysis call did not yield a [`SceneSound`].
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Model(#[from] GenAiError),

    #[error("analysis response rejected: {0}")]
    Schema(#[from] SceneError),
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Result of [`SoundPipeline::analyze`].  Never an error: a failed analysis
/// is reported as [`AnalysisOutcome::Fallback`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisOutcome {
    Analyzed(SceneSound),
    Fallback(SceneSound),
}

impl AnalysisOutcome {
    pub fn scene(&self) -> &SceneSound {
        match self {
            AnalysisOutcome::Analyzed(scene) | AnalysisOutcome::Fallback(scene) => scene,
        }
    }

    pub fn into_scene(self) -> SceneSound {
        match self {
            AnalysisOutcome::Analyzed(scene) | AnalysisOutcome::Fallback(scene) => scene,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, AnalysisOutcome::Fallback(_))
    }
}

/// An analysis together with the playback it issued.
#[derive(Debug)]
pub struct Analysis {
    pub outcome: AnalysisOutcome,
    pub playback: Vec<PlaybackTicket>,
}

impl Analysis {
    /// Wait until every issued clip has started (or given up).
    pub async fn settled(self) -> (AnalysisOutcome, Vec<ChannelOutcome>) {
        let mut outcomes = Vec::with_capacity(self.playback.len());
        for ticket in self.playback {
            outcomes.push(ticket.wait().await);
        }
        (self.outcome, outcomes)
    }
}

/// A regenerated effect description and its playback.
#[derive(Debug)]
pub struct RegeneratedEffect {
    pub description: String,
    pub playback: PlaybackTicket,
}

// ---------------------------------------------------------------------------
// SoundPipeline
// ---------------------------------------------------------------------------

/// Derives a [`SceneSound`] from an image and plays it.
pub struct SoundPipeline {
    model: Arc<dyn GenerativeModel>,
    audio: Arc<AudioOrchestrator>,
    prompts: PromptBuilder,
}

impl SoundPipeline {
    pub fn new(model: Arc<dyn GenerativeModel>, audio: Arc<AudioOrchestrator>) -> Self {
        Self {
            model,
            audio,
            prompts: PromptBuilder::new(),
        }
    }

    pub fn audio(&self) -> &Arc<AudioOrchestrator> {
        &self.audio
    }

    /// Analyze `image` in `mood` and play the result.
    ///
    /// On any failure the fixed fallback scene is returned and only its
    /// narration is spoken.
    pub async fn analyze(&self, image: &Image, mood: Mood) -> Analysis {
        match self.describe(image, mood).await {
            Ok(scene) => {
                log::info!("scene: {}", scene.scene_description);
                let playback = self.present(&scene).await;
                Analysis {
                    outcome: AnalysisOutcome::Analyzed(scene),
                    playback,
                }
            }
            Err(e) => {
                log::warn!("analysis failed, using fallback scene: {e}");
                let scene = SceneSound::fallback();
                let narration = self.audio.play(
                    ChannelKind::Narration,
                    scene.scene_description.clone(),
                    PlayOptions::default(),
                );
                Analysis {
                    outcome: AnalysisOutcome::Fallback(scene),
                    playback: vec![narration],
                }
            }
        }
    }

    async fn describe(&self, image: &Image, mood: Mood) -> Result<SceneSound, AnalysisError> {
        let instruction = self.prompts.analysis_instruction(mood);
        let text = self.model.describe_image(image, &instruction).await?;
        Ok(parse_scene_sound(&text)?)
    }

    /// Issue narration, ambience and effect playback for `scene`, in that
    /// order.
    pub async fn present(&self, scene: &SceneSound) -> Vec<PlaybackTicket> {
        self.audio
            .play_in_order(vec![
                (ChannelKind::Narration, scene.scene_description.clone()),
                (ChannelKind::Ambience, scene.ambience.clone()),
                (ChannelKind::Effect, scene.sound_effect.clone()),
            ])
            .await
    }

    /// Ask for a new effect that fits `scene_description`, then play it.
    pub async fn regenerate_effect(
        &self,
        scene_description: &str,
        mood: Mood,
    ) -> Result<RegeneratedEffect, GenAiError> {
        let prompt = self.prompts.effect_prompt(scene_description, mood);
        let text = self.model.generate_text(&prompt).await?;
        let description = text.trim().trim_matches('"').trim().to_string();
        if description.is_empty() {
            return Err(GenAiError::EmptyResponse);
        }

        log::info!("new effect: {description}");
        let playback = self
            .audio
            .play(ChannelKind::Effect, description.clone(), PlayOptions::default());
        Ok(RegeneratedEffect {
            description,
            playback,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
