//! Vision / generative-model module.
//!
//! This module provides:
//! * [`GenerativeModel`]: async trait implemented by every model backend.
//! * [`GeminiClient`]: Gemini `generateContent` REST backend.
//! * [`PromptBuilder`]: analysis, effect and transform prompts.
//! * [`SceneSound`] / [`Mood`]: the analysis result and its style knob.
//! * [`parse_scene_sound`]: strict validation of model output.
//! * [`scan_parts`]: first image + first valid scene of a multimodal answer.

pub mod client;
pub mod parts;
pub mod prompt;
pub mod scene;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use client::{ContentPart, GeminiClient, GenAiError, GenerativeModel};
pub use parts::{scan_parts, ScannedParts};
pub use prompt::{scene_schema, PromptBuilder, TRANSFORMATION_STYLES};
pub use scene::{parse_scene_sound, strip_code_fence, Mood, SceneError, SceneSound};
