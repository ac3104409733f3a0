//! Session phases and the shared state the UI layer reads.
//!
//! [`SessionState`] is the single source of truth for everything the UI
//! shows: phase, busy flag, images, sound descriptions, loading message and
//! error banner.  [`SharedSession`] is an `Arc<Mutex<SessionState>>`; lock it
//! for short critical sections only and never across an `.await`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::media::Image;
use crate::transform::ErrorCategory;
use crate::vision::{Mood, PromptBuilder, SceneSound};

// ---------------------------------------------------------------------------
// SessionPhase
// ---------------------------------------------------------------------------

/// Phases of a capture/transform session.
///
/// ```text
/// Idle ──capture──▶ Capturing ──▶ Analyzing ──▶ Ready
/// Ready ──transform──▶ Transforming ──success──▶ Analyzing ──▶ Ready
///                                  ──failure──▶ Ready
/// Ready ──reset──▶ Idle
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    /// Nothing captured; waiting for a frame.
    #[default]
    Idle,
    /// A frame is being taken.
    Capturing,
    /// Sound analysis is running.
    Analyzing,
    /// An image is shown and its sounds are playing.
    Ready,
    /// The image is being transformed.
    Transforming,
}

impl SessionPhase {
    /// `true` while an operation is in flight.
    ///
    /// ```
    /// use sound_snapper::session::SessionPhase;
    ///
    /// assert!(!SessionPhase::Idle.is_busy());
    /// assert!(SessionPhase::Analyzing.is_busy());
    /// assert!(SessionPhase::Transforming.is_busy());
    /// assert!(!SessionPhase::Ready.is_busy());
    /// ```
    pub fn is_busy(&self) -> bool {
        self.busy_kind().is_some()
    }

    /// Which loading-message set applies, if busy.
    pub fn busy_kind(&self) -> Option<BusyKind> {
        match self {
            SessionPhase::Capturing | SessionPhase::Analyzing => Some(BusyKind::Sound),
            SessionPhase::Transforming => Some(BusyKind::Transform),
            SessionPhase::Idle | SessionPhase::Ready => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SessionPhase::Idle => "Idle",
            SessionPhase::Capturing => "Capturing",
            SessionPhase::Analyzing => "Analyzing",
            SessionPhase::Ready => "Ready",
            SessionPhase::Transforming => "Transforming",
        }
    }
}

/// The two busy modes the UI distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusyKind {
    Sound,
    Transform,
}

// ---------------------------------------------------------------------------
// TransformInstruction
// ---------------------------------------------------------------------------

/// What the user asked the image to become.  A preset and custom text are
/// mutually exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformInstruction {
    /// One of [`TRANSFORMATION_STYLES`](crate::vision::TRANSFORMATION_STYLES).
    Preset(String),
    /// Free text, used as-is.
    Custom(String),
}

impl TransformInstruction {
    /// Instruction text sent to the providers.
    ///
    /// ```
    /// use sound_snapper::session::TransformInstruction;
    /// use sound_snapper::vision::PromptBuilder;
    ///
    /// let prompts = PromptBuilder::new();
    /// let preset = TransformInstruction::Preset("Anime".into());
    /// assert_eq!(preset.text(&prompts), "Transform this image in a Anime style");
    /// ```
    pub fn text(&self, prompts: &PromptBuilder) -> String {
        match self {
            TransformInstruction::Preset(style) => prompts.preset_instruction(style),
            TransformInstruction::Custom(text) => text.trim().to_string(),
        }
    }

    /// Short label for the UI.
    pub fn label(&self) -> &str {
        match self {
            TransformInstruction::Preset(style) => style,
            TransformInstruction::Custom(text) => text,
        }
    }
}

// ---------------------------------------------------------------------------
// Banner
// ---------------------------------------------------------------------------

/// A time-limited error message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Banner {
    /// Distinguishes banners so an old timer never clears a newer one.
    pub id: u64,
    pub category: ErrorCategory,
    pub message: String,
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Everything the UI layer needs to render a session.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub phase: SessionPhase,
    /// The captured frame.
    pub captured: Option<Image>,
    /// Result of the last successful transformation of `captured`.
    pub transformed: Option<Image>,
    /// Current sound descriptions (the fallback until an analysis ran).
    pub scene: SceneSound,
    /// Effect currently associated with the scene; changes on regeneration.
    pub effect_description: String,
    pub mood: Mood,
    pub instruction: Option<TransformInstruction>,
    /// Rotating message shown while busy.
    pub loading_message: Option<String>,
    pub banner: Option<Banner>,
    /// Bumped on reset; results from an older epoch are dropped.
    pub epoch: u64,
    pub(crate) next_banner_id: u64,
}

impl SessionState {
    pub fn new(mood: Mood) -> Self {
        let scene = SceneSound::fallback();
        Self {
            phase: SessionPhase::Idle,
            captured: None,
            transformed: None,
            effect_description: scene.sound_effect.clone(),
            scene,
            mood,
            instruction: None,
            loading_message: None,
            banner: None,
            epoch: 0,
            next_banner_id: 0,
        }
    }

    /// The single busy flag exposed to the UI.
    pub fn is_busy(&self) -> bool {
        self.phase.is_busy()
    }

    pub fn busy_kind(&self) -> Option<BusyKind> {
        self.phase.busy_kind()
    }

    /// The transformed image when there is one, else the captured frame.
    pub fn displayed_image(&self) -> Option<&Image> {
        self.transformed.as_ref().or(self.captured.as_ref())
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(Mood::default())
    }
}

// ---------------------------------------------------------------------------
// SharedSession
// ---------------------------------------------------------------------------

/// Thread-safe handle to [`SessionState`].
pub type SharedSession = Arc<Mutex<SessionState>>;

pub fn new_shared_session(mood: Mood) -> SharedSession {
    Arc::new(Mutex::new(SessionState::new(mood)))
}

/// Lock `state`, recovering the data if a holder panicked.
pub(crate) fn lock(state: &SharedSession) -> MutexGuard<'_, SessionState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::ImageData;

    #[test]
    fn busy_phases_map_to_message_sets() {
        assert_eq!(SessionPhase::Capturing.busy_kind(), Some(BusyKind::Sound));
        assert_eq!(SessionPhase::Analyzing.busy_kind(), Some(BusyKind::Sound));
        assert_eq!(SessionPhase::Transforming.busy_kind(), Some(BusyKind::Transform));
        assert_eq!(SessionPhase::Ready.busy_kind(), None);
        assert_eq!(SessionPhase::Idle.busy_kind(), None);
    }

    #[test]
    fn labels() {
        assert_eq!(SessionPhase::Transforming.label(), "Transforming");
        assert_eq!(SessionPhase::default().label(), "Idle");
    }

    #[test]
    fn custom_instruction_is_trimmed_and_raw() {
        let prompts = PromptBuilder::new();
        let custom = TransformInstruction::Custom("  make it snow \n".into());
        assert_eq!(custom.text(&prompts), "make it snow");
        assert_eq!(
            TransformInstruction::Preset("Vintage Film".into()).text(&prompts),
            "Transform this image in a Vintage Film style"
        );
    }

    #[test]
    fn new_state_starts_idle_with_fallback_scene() {
        let state = SessionState::new(Mood::Cartoon);
        assert_eq!(state.phase, SessionPhase::Idle);
        assert!(!state.is_busy());
        assert_eq!(state.scene, SceneSound::fallback());
        assert_eq!(state.effect_description, SceneSound::fallback().sound_effect);
        assert_eq!(state.mood, Mood::Cartoon);
        assert!(state.displayed_image().is_none());
    }

    #[test]
    fn displayed_image_prefers_transformed() {
        let mut state = SessionState::default();
        state.captured = Some(Image::Inline(ImageData::jpeg(vec![1])));
        assert_eq!(state.displayed_image(), state.captured.as_ref());

        state.transformed = Some(Image::Remote("https://img/t.jpg".into()));
        assert_eq!(
            state.displayed_image(),
            Some(&Image::Remote("https://img/t.jpg".into()))
        );
    }

    #[test]
    fn shared_session_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SharedSession>();
    }

    #[test]
    fn shared_session_can_be_cloned_and_mutated() {
        let state = new_shared_session(Mood::Real);
        let state2 = Arc::clone(&state);

        lock(&state).phase = SessionPhase::Ready;
        assert_eq!(lock(&state2).phase, SessionPhase::Ready);
    }
}
