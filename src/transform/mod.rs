//! Image transformation across a provider fallback chain.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │               TransformationOrchestrator                      │
//! │                                                              │
//! │  chain: [Arc<dyn TransformProvider>]   (config order)        │
//! │                                                              │
//! │  QueuedProvider<FalClient>  ── Full poll (2 s × 30)          │
//! │  QueuedProvider<FalClient>  ── SingleShot (3 s, one fetch)   │
//! │  MultimodalProvider         ── image + SceneSound in one call│
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Failures use the [`TransformError`] taxonomy; the UI shows
//! [`TransformError::category`] as a banner.

pub mod error;
pub mod fal;
pub mod job;
pub mod multimodal;
pub mod orchestrator;
pub mod provider;

pub use error::{ErrorCategory, TransformError};
pub use fal::{FalClient, ImageField};
pub use job::{
    poll_job, JobClient, JobStatus, PollMode, PollPolicy, QueuedProvider, StatusUpdate,
    Submission, TransformJob,
};
pub use multimodal::MultimodalProvider;
pub use orchestrator::TransformationOrchestrator;
pub use provider::{TransformProvider, TransformedResult};
