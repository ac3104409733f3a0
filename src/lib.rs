//! SoundSnapper: turn a still image into a soundscape and restyle it.
//!
//! A captured image is described by a generative model, narrated, and given a
//! looping ambience plus a one-shot effect.  The image can then be transformed
//! through a fallback chain of image models, after which its sounds are
//! derived again.
//!
//! See [`session::Session`] for the state machine that ties it together.

pub mod audio;
pub mod config;
pub mod media;
pub mod session;
pub mod sound;
pub mod transform;
pub mod vision;
