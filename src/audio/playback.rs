//! Playback seam between the channel manager and the audio device.
//!
//! A [`PlaybackBackend`] turns encoded audio bytes into a live
//! [`PlaybackHandle`].  The handle is the only way to touch a playing
//! resource; [`AudioOrchestrator`](crate::audio::AudioOrchestrator) owns
//! every handle it keeps.

use thiserror::Error;

use crate::audio::channel::ChannelKind;

/// Errors raised while starting playback.
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("no audio output device available")]
    NoDevice,

    #[error("failed to decode audio: {0}")]
    Decode(String),

    #[error("failed to resample audio: {0}")]
    Resample(String),

    #[error("audio stream error: {0}")]
    Stream(String),
}

/// Parameters applied to a resource before it starts playing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackSettings {
    /// Channel the resource is played on (for logs and device routing).
    pub channel: ChannelKind,
    /// Gain in `0.0 ..= 1.0`.
    pub volume: f32,
    /// Restart from the beginning when the end is reached.
    pub looping: bool,
}

/// A playing (or finished) audio resource.
///
/// Dropping a handle detaches it: one-shot audio plays to the end, looping
/// audio stops.
pub trait PlaybackHandle: Send {
    /// Change the gain of the live resource (`0.0 ..= 1.0`).
    fn set_volume(&mut self, volume: f32);

    /// Stop playback and release the underlying device resources.  Returns
    /// once the resource is silent.
    fn stop(&mut self);

    /// `true` until the resource finishes or is stopped.
    fn is_active(&self) -> bool;
}

/// Starts playback of encoded audio.
pub trait PlaybackBackend: Send + Sync {
    fn play(
        &self,
        audio: Vec<u8>,
        settings: PlaybackSettings,
    ) -> Result<Box<dyn PlaybackHandle>, PlaybackError>;
}

// Compile-time assertion: both traits must stay object-safe.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn PlaybackBackend>, _: Box<dyn PlaybackHandle>) {}
};
