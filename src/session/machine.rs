//! [`Session`]: drives the capture → analyze → transform → re-analyze loop.
//!
//! # Flow
//!
//! ```text
//! capture(image)
//!   └─▶ Capturing ─▶ Analyzing ── SoundPipeline::analyze ──────────▶ Ready
//!
//! request_transform(instruction)
//!   └─▶ Transforming ── TransformationOrchestrator::transform
//!         ├─ Ok, scene embedded → present(scene)                 ──▶ Ready
//!         ├─ Ok, no scene       → Analyzing (spawned follow-up)  ──▶ Ready
//!         └─ Err                → banner, prior image kept       ──▶ Ready
//!
//! reset()
//!   └─▶ stop ambience, clear images, epoch += 1 ──────────────────▶ Idle
//! ```
//!
//! Only one busy operation runs at a time.  A [`BusyGuard`] marks the phase
//! busy, runs the loading-message rotator and puts the phase back when it is
//! dropped, on every exit path.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;

use crate::audio::{ChannelKind, Volume, VolumeStep};
use crate::config::UiConfig;
use crate::media::Image;
use crate::session::state::{
    lock, new_shared_session, SessionPhase, SessionState, SharedSession, TransformInstruction,
};
use crate::session::status::{show_banner, LoadingRotator};
use crate::sound::{AnalysisOutcome, SoundPipeline};
use crate::transform::{TransformError, TransformationOrchestrator};
use crate::vision::{GenAiError, Mood, PromptBuilder, SceneSound, TRANSFORMATION_STYLES};

// ---------------------------------------------------------------------------
// SessionError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("another operation is in progress")]
    Busy,

    #[error("cannot {operation} while {}", .phase.label())]
    InvalidPhase {
        operation: &'static str,
        phase: SessionPhase,
    },

    #[error("no image captured")]
    NoImage,

    #[error("no transformation selected")]
    EmptyInstruction,

    #[error("unknown style: {0}")]
    UnknownStyle(String),

    #[error("transformation failed: {0}")]
    Transform(#[from] TransformError),

    #[error("effect generation failed: {0}")]
    Effect(#[from] GenAiError),
}

// ---------------------------------------------------------------------------
// BusyGuard
// ---------------------------------------------------------------------------

/// Holds the session in a busy phase until dropped.
struct BusyGuard {
    state: SharedSession,
    interval: Duration,
    rotator: Option<LoadingRotator>,
}

impl BusyGuard {
    /// Enter `phase` if the session is idle-enough and `check` accepts the
    /// current state.
    fn enter(
        state: &SharedSession,
        phase: SessionPhase,
        interval: Duration,
        check: impl FnOnce(&SessionState) -> Result<(), SessionError>,
    ) -> Result<Self, SessionError> {
        {
            let mut s = lock(state);
            if s.is_busy() {
                return Err(SessionError::Busy);
            }
            check(&s)?;
            s.phase = phase;
        }

        let mut guard = Self {
            state: SharedSession::clone(state),
            interval,
            rotator: None,
        };
        guard.rotate(phase);
        Ok(guard)
    }

    fn switch(&mut self, phase: SessionPhase) {
        lock(&self.state).phase = phase;
        self.rotate(phase);
    }

    /// Restart the rotator when the message set changes.
    fn rotate(&mut self, phase: SessionPhase) {
        let kind = phase.busy_kind();
        if self.rotator.as_ref().map(LoadingRotator::kind) == kind {
            return;
        }
        self.rotator = kind.map(|k| LoadingRotator::start(&self.state, k, self.interval));
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.rotator = None;
        let mut s = lock(&self.state);
        s.loading_message = None;
        s.phase = if s.displayed_image().is_some() {
            SessionPhase::Ready
        } else {
            SessionPhase::Idle
        };
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Result of a successful [`Session::request_transform`].
#[derive(Debug)]
pub struct TransformOutcome {
    pub image: Image,
    pub provider: String,
    /// Re-analysis of `image`, when the provider did not describe it.
    pub follow_up: Option<JoinHandle<()>>,
}

/// The application session.  Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Session {
    state: SharedSession,
    sound: Arc<SoundPipeline>,
    transformer: Arc<TransformationOrchestrator>,
    prompts: PromptBuilder,
    ui: UiConfig,
}

impl Session {
    pub fn new(
        sound: Arc<SoundPipeline>,
        transformer: Arc<TransformationOrchestrator>,
        mood: Mood,
        ui: UiConfig,
    ) -> Self {
        Self {
            state: new_shared_session(mood),
            sound,
            transformer,
            prompts: PromptBuilder::new(),
            ui,
        }
    }

    /// Shared state for the UI layer.
    pub fn state(&self) -> &SharedSession {
        &self.state
    }

    pub fn snapshot(&self) -> SessionState {
        lock(&self.state).clone()
    }

    fn enter(
        &self,
        phase: SessionPhase,
        check: impl FnOnce(&SessionState) -> Result<(), SessionError>,
    ) -> Result<BusyGuard, SessionError> {
        BusyGuard::enter(&self.state, phase, self.ui.loading_interval(), check)
    }

    /// Store a new scene unless a reset happened since `epoch`.
    fn apply_scene(&self, epoch: u64, scene: &SceneSound) {
        let mut s = lock(&self.state);
        if s.epoch != epoch {
            log::debug!("dropping scene from stale epoch {epoch}");
            return;
        }
        s.scene = scene.clone();
        s.effect_description = scene.sound_effect.clone();
    }

    // ---- capture -----------------------------------------------------------

    /// Show `image` and derive its sounds.
    ///
    /// Only valid while nothing is shown.  Always ends in `Ready`; a failed
    /// analysis leaves the fallback scene.
    pub async fn capture(&self, image: Image) -> Result<AnalysisOutcome, SessionError> {
        let mut guard = self.enter(SessionPhase::Capturing, |s| {
            let empty_ready = s.phase == SessionPhase::Ready && s.captured.is_none();
            if s.phase == SessionPhase::Idle || empty_ready {
                Ok(())
            } else {
                Err(SessionError::InvalidPhase {
                    operation: "capture",
                    phase: s.phase,
                })
            }
        })?;

        let (mood, epoch) = {
            let mut s = lock(&self.state);
            s.captured = Some(image.clone());
            s.transformed = None;
            (s.mood, s.epoch)
        };
        log::info!("captured {}", image.describe());

        guard.switch(SessionPhase::Analyzing);
        let analysis = self.sound.analyze(&image, mood).await;
        self.apply_scene(epoch, analysis.outcome.scene());
        Ok(analysis.outcome)
    }

    // ---- transform ---------------------------------------------------------

    /// Transform the captured image with the selected instruction.
    pub async fn transform_selected(&self) -> Result<TransformOutcome, SessionError> {
        let instruction = lock(&self.state).instruction.clone();
        match instruction {
            Some(instruction) => self.request_transform(instruction).await,
            None => Err(SessionError::EmptyInstruction),
        }
    }

    /// Transform the captured image.
    ///
    /// On success the result is displayed and, unless the provider already
    /// described it, a follow-up analysis runs on a spawned task; the session
    /// stays busy until it finishes.  On failure a banner is shown and the
    /// displayed image is unchanged.
    pub async fn request_transform(
        &self,
        instruction: TransformInstruction,
    ) -> Result<TransformOutcome, SessionError> {
        let text = instruction.text(&self.prompts);
        let mut guard = self.enter(SessionPhase::Transforming, |s| {
            if s.phase != SessionPhase::Ready {
                return Err(SessionError::InvalidPhase {
                    operation: "transform",
                    phase: s.phase,
                });
            }
            if s.captured.is_none() {
                return Err(SessionError::NoImage);
            }
            if text.is_empty() {
                return Err(SessionError::EmptyInstruction);
            }
            Ok(())
        })?;

        let (source, mood, epoch) = {
            let s = lock(&self.state);
            match &s.captured {
                Some(image) => (image.clone(), s.mood, s.epoch),
                None => return Err(SessionError::NoImage),
            }
        };

        let result = match self.transformer.transform(&source, &text, mood).await {
            Ok(result) => result,
            Err(e) => {
                log::warn!("transformation failed: {e}");
                show_banner(&self.state, e.category(), self.ui.banner_duration());
                return Err(SessionError::Transform(e));
            }
        };

        lock(&self.state).transformed = Some(result.image.clone());
        log::info!("{} transformed the image", result.provider);

        if let Some(scene) = &result.scene {
            self.sound.present(scene).await;
            self.apply_scene(epoch, scene);
            return Ok(TransformOutcome {
                image: result.image,
                provider: result.provider,
                follow_up: None,
            });
        }

        guard.switch(SessionPhase::Analyzing);
        let session = self.clone();
        let image = result.image.clone();
        let follow_up = tokio::spawn(async move {
            let _guard = guard;
            let analysis = session.sound.analyze(&image, mood).await;
            session.apply_scene(epoch, analysis.outcome.scene());
        });

        Ok(TransformOutcome {
            image: result.image,
            provider: result.provider,
            follow_up: Some(follow_up),
        })
    }

    // ---- reset -------------------------------------------------------------

    /// Stop ambience, clear both images and return to `Idle`.
    pub fn reset(&self) -> Result<(), SessionError> {
        {
            let mut s = lock(&self.state);
            if s.is_busy() {
                return Err(SessionError::Busy);
            }
            if s.phase != SessionPhase::Ready {
                return Err(SessionError::InvalidPhase {
                    operation: "reset",
                    phase: s.phase,
                });
            }
            let scene = SceneSound::fallback();
            s.captured = None;
            s.transformed = None;
            s.effect_description = scene.sound_effect.clone();
            s.scene = scene;
            s.epoch += 1;
            s.phase = SessionPhase::Idle;
        }
        self.sound.audio().stop(ChannelKind::Ambience);
        log::info!("session reset");
        Ok(())
    }

    // ---- effect ------------------------------------------------------------

    /// Ask for a new effect matching the current scene and play it.
    pub async fn regenerate_effect(&self) -> Result<String, SessionError> {
        let (description, mood, epoch) = {
            let s = lock(&self.state);
            if s.is_busy() {
                return Err(SessionError::Busy);
            }
            (s.scene.scene_description.clone(), s.mood, s.epoch)
        };

        let effect = self.sound.regenerate_effect(&description, mood).await?;

        let mut s = lock(&self.state);
        if s.epoch == epoch {
            s.effect_description = effect.description.clone();
        }
        Ok(effect.description)
    }

    // ---- settings ----------------------------------------------------------

    /// Applies to the next analysis.
    pub fn set_mood(&self, mood: Mood) {
        lock(&self.state).mood = mood;
    }

    pub fn mood(&self) -> Mood {
        lock(&self.state).mood
    }

    /// Select one of the preset styles (case-insensitive).  Replaces any
    /// custom instruction.
    pub fn select_preset(&self, style: &str) -> Result<(), SessionError> {
        let style = TRANSFORMATION_STYLES
            .iter()
            .find(|s| s.eq_ignore_ascii_case(style.trim()))
            .ok_or_else(|| SessionError::UnknownStyle(style.to_string()))?;
        lock(&self.state).instruction = Some(TransformInstruction::Preset((*style).to_string()));
        Ok(())
    }

    /// Use free text as the instruction.  Replaces any preset; blank text
    /// clears the selection.
    pub fn set_custom_instruction(&self, text: &str) {
        let text = text.trim();
        lock(&self.state).instruction =
            (!text.is_empty()).then(|| TransformInstruction::Custom(text.to_string()));
    }

    /// Step the volume of ambience or effect.
    pub fn adjust_volume(&self, kind: ChannelKind, step: VolumeStep) -> Option<Volume> {
        self.sound.audio().set_volume(kind, step)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::orchestrator::tests::{EchoSynth, RecordingBackend};
    use crate::audio::AudioOrchestrator;
    use crate::config::AudioConfig;
    use crate::media::ImageData;
    use crate::session::status::{SOUND_MESSAGES, TRANSFORM_MESSAGES};
    use crate::sound::pipeline::tests::{ScriptedModel, STREET};
    use crate::transform::orchestrator::tests::ScriptedProvider;
    use crate::transform::{ErrorCategory, TransformProvider, TransformedResult};
    use crate::vision::parse_scene_sound;
    use std::sync::Mutex;

    const CITY: &str =
        r#"{"sceneDescription":"A neon city.","ambience":"synth hum","soundEffect":"a laser"}"#;

    type Journal = Arc<Mutex<Vec<String>>>;

    struct Rig {
        session: Session,
        model: Arc<ScriptedModel>,
        backend: Arc<RecordingBackend>,
        journal: Journal,
    }

    fn rig(
        model: ScriptedModel,
        chain: impl FnOnce(&Journal) -> Vec<Arc<dyn TransformProvider>>,
    ) -> Rig {
        let model = Arc::new(model);
        let backend = Arc::new(RecordingBackend::default());
        let audio = Arc::new(AudioOrchestrator::new(
            Arc::new(EchoSynth::default()),
            backend.clone(),
            &AudioConfig::default(),
        ));
        let sound = Arc::new(SoundPipeline::new(model.clone(), audio));
        let journal: Journal = Arc::new(Mutex::new(Vec::new()));
        let transformer = Arc::new(TransformationOrchestrator::new(chain(&journal)));
        Rig {
            session: Session::new(sound, transformer, Mood::Real, UiConfig::default()),
            model,
            backend,
            journal,
        }
    }

    fn photo() -> Image {
        Image::Inline(ImageData::jpeg(vec![0xFF, 0xD8]))
    }

    fn busy_error(name: &str) -> TransformError {
        TransformError::ProviderUnavailable {
            provider: name.into(),
            reason: "HTTP 503".into(),
            status: Some(503),
        }
    }

    /// Let spawned playback tasks run until `prefix` shows up in the events.
    async fn settle(backend: &RecordingBackend, prefix: &str) {
        for _ in 0..100 {
            if backend
                .events
                .lock()
                .unwrap()
                .iter()
                .any(|e| e.starts_with(prefix))
            {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("no `{prefix}` event in {:?}", backend.events.lock().unwrap());
    }

    // ---- BusyGuard ---------------------------------------------------------

    #[tokio::test]
    async fn busy_guard_rotates_and_restores_the_phase() {
        let state = new_shared_session(Mood::Real);
        let mut guard = BusyGuard::enter(
            &state,
            SessionPhase::Capturing,
            Duration::from_secs(2),
            |_| Ok(()),
        )
        .unwrap();
        {
            let s = lock(&state);
            assert!(s.is_busy());
            assert!(SOUND_MESSAGES.contains(&s.loading_message.as_deref().unwrap()));
        }

        guard.switch(SessionPhase::Transforming);
        {
            let s = lock(&state);
            assert_eq!(s.phase, SessionPhase::Transforming);
            assert!(TRANSFORM_MESSAGES.contains(&s.loading_message.as_deref().unwrap()));
        }

        drop(guard);
        let s = lock(&state);
        assert_eq!(s.phase, SessionPhase::Idle);
        assert_eq!(s.loading_message, None);
    }

    #[tokio::test]
    async fn busy_guard_refuses_to_nest() {
        let state = new_shared_session(Mood::Real);
        let _guard =
            BusyGuard::enter(&state, SessionPhase::Analyzing, Duration::from_secs(2), |_| Ok(()))
                .unwrap();
        let second =
            BusyGuard::enter(&state, SessionPhase::Transforming, Duration::from_secs(2), |_| Ok(()));
        assert!(matches!(second, Err(SessionError::Busy)));
        assert_eq!(lock(&state).phase, SessionPhase::Analyzing);
    }

    // ---- capture -----------------------------------------------------------

    #[tokio::test]
    async fn capture_analyzes_and_becomes_ready() {
        let rig = rig(ScriptedModel::describing(vec![Ok(STREET.into())]), |_| Vec::new());

        let outcome = rig.session.capture(photo()).await.unwrap();
        assert!(!outcome.is_fallback());

        let s = rig.session.snapshot();
        assert_eq!(s.phase, SessionPhase::Ready);
        assert!(!s.is_busy());
        assert_eq!(s.loading_message, None);
        assert_eq!(s.displayed_image(), Some(&photo()));
        assert_eq!(s.scene.ambience, "city hum");
        assert_eq!(s.effect_description, "a car horn");

        settle(&rig.backend, "start ambience:city hum").await;
    }

    #[tokio::test]
    async fn capture_in_flight_is_visible_and_blocks_other_requests() {
        let gate = Arc::new(tokio::sync::Notify::new());
        let rig = rig(
            ScriptedModel {
                gate: Some(gate.clone()),
                ..ScriptedModel::describing(vec![Ok(STREET.into())])
            },
            |j| vec![ScriptedProvider::ok("primary", "X", j)],
        );

        let session = rig.session.clone();
        let capture = tokio::spawn(async move { session.capture(photo()).await });
        while rig.model.described.lock().unwrap().is_empty() {
            tokio::task::yield_now().await;
        }

        let s = rig.session.snapshot();
        assert_eq!(s.phase, SessionPhase::Analyzing);
        assert!(s.is_busy());
        assert!(SOUND_MESSAGES.contains(&s.loading_message.as_deref().unwrap()));
        assert_eq!(s.displayed_image(), Some(&photo()));

        assert!(matches!(rig.session.capture(photo()).await, Err(SessionError::Busy)));
        assert!(matches!(
            rig.session
                .request_transform(TransformInstruction::Custom("make it snow".into()))
                .await,
            Err(SessionError::Busy)
        ));
        assert!(rig.journal.lock().unwrap().is_empty());

        gate.notify_one();
        capture.await.unwrap().unwrap();
        let s = rig.session.snapshot();
        assert_eq!(s.phase, SessionPhase::Ready);
        assert_eq!(s.loading_message, None);
        assert_eq!(s.scene.ambience, "city hum");
    }

    #[tokio::test]
    async fn failed_analysis_still_reaches_ready_with_fallback() {
        let rig = rig(ScriptedModel::describing(vec![Ok("not json".into())]), |_| Vec::new());

        let outcome = rig.session.capture(photo()).await.unwrap();
        assert!(outcome.is_fallback());

        let s = rig.session.snapshot();
        assert_eq!(s.phase, SessionPhase::Ready);
        assert_eq!(s.scene, SceneSound::fallback());
    }

    #[tokio::test]
    async fn capture_is_rejected_while_an_image_is_shown() {
        let rig = rig(ScriptedModel::describing(vec![Ok(STREET.into())]), |_| Vec::new());
        rig.session.capture(photo()).await.unwrap();

        let err = rig.session.capture(photo()).await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::InvalidPhase {
                operation: "capture",
                phase: SessionPhase::Ready
            }
        ));
        assert_eq!(rig.model.described.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn busy_session_rejects_every_operation() {
        let rig = rig(ScriptedModel::default(), |_| Vec::new());
        {
            let mut s = lock(rig.session.state());
            s.captured = Some(photo());
            s.phase = SessionPhase::Transforming;
        }

        assert!(matches!(rig.session.capture(photo()).await, Err(SessionError::Busy)));
        assert!(matches!(
            rig.session
                .request_transform(TransformInstruction::Custom("x".into()))
                .await,
            Err(SessionError::Busy)
        ));
        assert!(matches!(rig.session.reset(), Err(SessionError::Busy)));
        assert!(matches!(rig.session.regenerate_effect().await, Err(SessionError::Busy)));
        assert_eq!(rig.session.snapshot().phase, SessionPhase::Transforming);
    }

    // ---- transform ---------------------------------------------------------

    #[tokio::test]
    async fn immediate_result_is_shown_and_reanalyzed() {
        let rig = rig(
            ScriptedModel::describing(vec![Ok(STREET.into()), Ok(CITY.into())]),
            |j| vec![ScriptedProvider::ok("primary", "X", j)],
        );
        rig.session.capture(photo()).await.unwrap();
        rig.session.select_preset("anime").unwrap();

        let outcome = rig.session.transform_selected().await.unwrap();
        assert_eq!(outcome.image, Image::Remote("X".into()));
        assert_eq!(outcome.provider, "primary");
        assert_eq!(
            *rig.journal.lock().unwrap(),
            vec!["primary: Transform this image in a Anime style"]
        );

        // Displayed right away; the follow-up analysis keeps the session busy.
        let s = rig.session.snapshot();
        assert_eq!(s.displayed_image(), Some(&Image::Remote("X".into())));
        assert_eq!(s.phase, SessionPhase::Analyzing);
        assert!(matches!(
            rig.session.transform_selected().await,
            Err(SessionError::Busy)
        ));

        outcome.follow_up.unwrap().await.unwrap();

        let described = rig.model.described.lock().unwrap().clone();
        assert_eq!(described, vec![photo(), Image::Remote("X".into())]);
        let s = rig.session.snapshot();
        assert_eq!(s.phase, SessionPhase::Ready);
        assert!(!s.is_busy());
        assert_eq!(s.scene.ambience, "synth hum");
        assert_eq!(s.effect_description, "a laser");
        assert_eq!(s.captured, Some(photo()));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_chain_keeps_the_image_and_shows_a_banner() {
        let rig = rig(ScriptedModel::describing(vec![Ok(STREET.into())]), |j| {
            vec![
                ScriptedProvider::failing("primary", busy_error("primary"), j),
                ScriptedProvider::failing("secondary", busy_error("secondary"), j),
            ]
        });
        rig.session.capture(photo()).await.unwrap();

        let err = rig
            .session
            .request_transform(TransformInstruction::Custom("make it snow".into()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::Transform(TransformError::AllProvidersExhausted { .. })
        ));

        let s = rig.session.snapshot();
        assert_eq!(s.displayed_image(), Some(&photo()));
        assert_eq!(s.transformed, None);
        assert!(!s.is_busy());
        assert_eq!(s.phase, SessionPhase::Ready);
        assert_eq!(s.banner.unwrap().category, ErrorCategory::ServiceBusy);

        tokio::time::sleep(Duration::from_millis(4100)).await;
        assert!(rig.session.snapshot().banner.is_none());
    }

    #[tokio::test]
    async fn embedded_scene_skips_the_second_analysis() {
        let rig = rig(ScriptedModel::describing(vec![Ok(STREET.into())]), |j| {
            vec![Arc::new(ScriptedProvider {
                name: "multimodal".into(),
                configured: true,
                answer: Ok(TransformedResult {
                    image: Image::Inline(ImageData::new("image/png", vec![7])),
                    provider: "multimodal".into(),
                    scene: Some(parse_scene_sound(CITY).unwrap()),
                }),
                journal: Arc::clone(j),
            }) as Arc<dyn TransformProvider>]
        });
        rig.session.capture(photo()).await.unwrap();

        let outcome = rig
            .session
            .request_transform(TransformInstruction::Preset("Cyberpunk".into()))
            .await
            .unwrap();
        assert!(outcome.follow_up.is_none());
        assert_eq!(rig.model.described.lock().unwrap().len(), 1);

        let s = rig.session.snapshot();
        assert_eq!(s.phase, SessionPhase::Ready);
        assert_eq!(s.scene.scene_description, "A neon city.");

        settle(&rig.backend, "start ambience:synth hum").await;
    }

    #[tokio::test]
    async fn transform_needs_a_shown_image_and_an_instruction() {
        let rig = rig(ScriptedModel::describing(vec![Ok(STREET.into())]), |j| {
            vec![ScriptedProvider::ok("primary", "X", j)]
        });

        let idle = rig
            .session
            .request_transform(TransformInstruction::Custom("x".into()))
            .await;
        assert!(matches!(
            idle,
            Err(SessionError::InvalidPhase {
                operation: "transform",
                phase: SessionPhase::Idle
            })
        ));

        rig.session.capture(photo()).await.unwrap();
        assert!(matches!(
            rig.session.transform_selected().await,
            Err(SessionError::EmptyInstruction)
        ));
        assert!(matches!(
            rig.session
                .request_transform(TransformInstruction::Custom("   ".into()))
                .await,
            Err(SessionError::EmptyInstruction)
        ));
        assert!(rig.journal.lock().unwrap().is_empty());
        assert_eq!(rig.session.snapshot().phase, SessionPhase::Ready);
    }

    #[tokio::test]
    async fn ready_without_image_cannot_transform() {
        let rig = rig(ScriptedModel::default(), |_| Vec::new());
        lock(rig.session.state()).phase = SessionPhase::Ready;

        let err = rig
            .session
            .request_transform(TransformInstruction::Custom("x".into()))
            .await;
        assert!(matches!(err, Err(SessionError::NoImage)));
    }

    // ---- reset -------------------------------------------------------------

    #[tokio::test]
    async fn reset_stops_ambience_and_allows_a_new_capture() {
        let rig = rig(
            ScriptedModel::describing(vec![Ok(STREET.into()), Ok(CITY.into())]),
            |_| Vec::new(),
        );
        rig.session.capture(photo()).await.unwrap();
        settle(&rig.backend, "start ambience:city hum").await;

        rig.session.reset().unwrap();
        assert!(rig
            .backend
            .events
            .lock()
            .unwrap()
            .contains(&"stop ambience:city hum".to_string()));

        let s = rig.session.snapshot();
        assert_eq!(s.phase, SessionPhase::Idle);
        assert_eq!(s.displayed_image(), None);
        assert_eq!(s.scene, SceneSound::fallback());
        assert_eq!(s.epoch, 1);

        rig.session.capture(photo()).await.unwrap();
        assert_eq!(rig.session.snapshot().scene.ambience, "synth hum");
    }

    #[tokio::test]
    async fn reset_from_idle_is_invalid() {
        let rig = rig(ScriptedModel::default(), |_| Vec::new());
        assert!(matches!(
            rig.session.reset(),
            Err(SessionError::InvalidPhase {
                operation: "reset",
                phase: SessionPhase::Idle
            })
        ));
    }

    // ---- effect ------------------------------------------------------------

    #[tokio::test]
    async fn regenerated_effect_replaces_the_description() {
        let model = ScriptedModel::describing(vec![Ok(STREET.into())]);
        model
            .text
            .lock()
            .unwrap()
            .push_back(Ok("\"a distant thunderclap\"".into()));
        let rig = rig(model, |_| Vec::new());
        rig.session.capture(photo()).await.unwrap();

        let effect = rig.session.regenerate_effect().await.unwrap();
        assert_eq!(effect, "a distant thunderclap");

        let s = rig.session.snapshot();
        assert_eq!(s.effect_description, "a distant thunderclap");
        assert_eq!(s.scene.sound_effect, "a car horn");
        let prompt = rig.model.prompts.lock().unwrap().last().cloned().unwrap();
        assert!(prompt.contains("A busy street."));
    }

    #[tokio::test]
    async fn failed_regeneration_keeps_the_old_effect() {
        let rig = rig(ScriptedModel::describing(vec![Ok(STREET.into())]), |_| Vec::new());
        rig.session.capture(photo()).await.unwrap();

        let err = rig.session.regenerate_effect().await.unwrap_err();
        assert!(matches!(err, SessionError::Effect(GenAiError::EmptyResponse)));
        assert_eq!(rig.session.snapshot().effect_description, "a car horn");
    }

    // ---- settings ----------------------------------------------------------

    #[tokio::test]
    async fn preset_and_custom_instruction_are_exclusive() {
        let rig = rig(ScriptedModel::default(), |_| Vec::new());

        rig.session.select_preset("low poly 3d").unwrap();
        assert_eq!(
            rig.session.snapshot().instruction,
            Some(TransformInstruction::Preset("Low Poly 3D".into()))
        );

        rig.session.set_custom_instruction("  make it snow ");
        assert_eq!(
            rig.session.snapshot().instruction,
            Some(TransformInstruction::Custom("make it snow".into()))
        );

        assert!(matches!(
            rig.session.select_preset("Oil Painting"),
            Err(SessionError::UnknownStyle(_))
        ));
        rig.session.set_custom_instruction("   ");
        assert_eq!(rig.session.snapshot().instruction, None);
    }

    #[tokio::test]
    async fn mood_applies_to_the_next_analysis() {
        let rig = rig(ScriptedModel::describing(vec![Ok(STREET.into())]), |_| Vec::new());
        rig.session.set_mood(Mood::SciFi);
        assert_eq!(rig.session.mood(), Mood::SciFi);

        rig.session.capture(photo()).await.unwrap();
        let prompt = rig.model.prompts.lock().unwrap()[0].clone();
        assert!(prompt.contains("in a sci-fi style"));
    }

    #[tokio::test]
    async fn volume_steps_reach_the_audio_channels() {
        let rig = rig(ScriptedModel::default(), |_| Vec::new());
        assert_eq!(
            rig.session.adjust_volume(ChannelKind::Ambience, VolumeStep::Decrease),
            Some(Volume::new(95))
        );
        assert_eq!(
            rig.session.adjust_volume(ChannelKind::Effect, VolumeStep::Increase),
            Some(Volume::MAX)
        );
        assert_eq!(rig.session.adjust_volume(ChannelKind::Narration, VolumeStep::Increase), None);
    }
}
