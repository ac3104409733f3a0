//! Audio output: synthesis → decode → resample → speaker, per channel.
//!
//! # Pipeline
//!
//! ```text
//! text → Synthesizer (ElevenLabs, MP3) → AudioOrchestrator
//!      → AudioChannel::replace → PlaybackBackend (cpal thread)
//!      → decode_audio (symphonia) → prepare_for_device (rubato) → speaker
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sound_snapper::audio::{
//!     AudioOrchestrator, ChannelKind, CpalBackend, ElevenLabsClient, PlayOptions,
//! };
//! use sound_snapper::config::AppConfig;
//!
//! # async fn demo() {
//! let config = AppConfig::default();
//! let audio = Arc::new(AudioOrchestrator::new(
//!     Arc::new(ElevenLabsClient::from_config(&config.elevenlabs)),
//!     Arc::new(CpalBackend::new(None)),
//!     &config.audio,
//! ));
//! audio.play(ChannelKind::Ambience, "light rain on a tin roof", PlayOptions::default());
//! # }
//! ```

pub mod channel;
pub mod decode;
pub mod orchestrator;
pub mod output;
pub mod playback;
pub mod resample;
pub mod synth;

pub use channel::{AudioChannel, ChannelKind, Volume, VolumeStep, VOLUME_STEP};
pub use decode::{decode_audio, DecodedAudio};
pub use orchestrator::{AudioOrchestrator, ChannelOutcome, PlayOptions, PlaybackTicket};
pub use output::{CpalBackend, CpalHandle};
pub use playback::{PlaybackBackend, PlaybackError, PlaybackHandle, PlaybackSettings};
pub use resample::{prepare_for_device, remix, resample, to_mono};
pub use synth::{ElevenLabsClient, SoundRequest, SynthError, Synthesizer};
