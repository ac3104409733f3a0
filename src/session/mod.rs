//! Session module: the state machine the UI layer drives.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          Session                              │
//! │                                                              │
//! │  SharedSession (Arc<Mutex<SessionState>>)  ◀── UI reads      │
//! │     phase · images · scene · loading message · banner        │
//! │                                                              │
//! │  SoundPipeline ──────────── analyze / present / effect       │
//! │  TransformationOrchestrator ── provider fallback chain       │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod machine;
pub mod state;
pub mod status;

pub use machine::{Session, SessionError, TransformOutcome};
pub use state::{
    new_shared_session, Banner, BusyKind, SessionPhase, SessionState, SharedSession,
    TransformInstruction,
};
pub use status::{pick_message, show_banner, LoadingRotator, SOUND_MESSAGES, TRANSFORM_MESSAGES};
