//! Scene analysis and sound presentation.
//!
//! [`SoundPipeline`] asks a [`GenerativeModel`](crate::vision::GenerativeModel)
//! what an image sounds like and hands the answer to the
//! [`AudioOrchestrator`](crate::audio::AudioOrchestrator).

pub mod pipeline;

pub use pipeline::{Analysis, AnalysisError, AnalysisOutcome, RegeneratedEffect, SoundPipeline};
