//! Speaker output via `cpal`.
//!
//! [`CpalBackend`] implements [`PlaybackBackend`].  Each call to
//! [`PlaybackBackend::play`] spawns a playback thread that decodes the clip,
//! adapts it to the device layout and owns the cpal stream for as long as the
//! clip plays (`cpal::Stream` is not `Send` on every platform, so it never
//! leaves that thread).  The returned [`CpalHandle`] talks to the thread
//! through shared atomics and a control channel.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SampleFormat, SizedSample};

use crate::audio::decode::decode_audio;
use crate::audio::playback::{PlaybackBackend, PlaybackError, PlaybackHandle, PlaybackSettings};
use crate::audio::resample::prepare_for_device;

/// How often the playback thread checks for end-of-clip.
const WATCH_INTERVAL: Duration = Duration::from_millis(25);

// ---------------------------------------------------------------------------
// Shared playback state
// ---------------------------------------------------------------------------

/// State shared between a [`CpalHandle`], its thread and the audio callback.
struct Shared {
    /// `f32` gain stored as raw bits.
    volume: AtomicU32,
    /// Cleared when the clip ends, fails or is stopped.
    active: AtomicBool,
    /// Set by [`CpalHandle::stop`]; the callback emits silence from then on.
    stopped: AtomicBool,
    /// Set by the callback once a one-shot clip has been fully written.
    finished: AtomicBool,
}

impl Shared {
    fn new(volume: f32) -> Self {
        Self {
            volume: AtomicU32::new(volume.clamp(0.0, 1.0).to_bits()),
            active: AtomicBool::new(true),
            stopped: AtomicBool::new(false),
            finished: AtomicBool::new(false),
        }
    }

    fn volume(&self) -> f32 {
        f32::from_bits(self.volume.load(Ordering::Relaxed))
    }

    fn set_volume(&self, volume: f32) {
        self.volume
            .store(volume.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }
}

// ---------------------------------------------------------------------------
// CpalHandle
// ---------------------------------------------------------------------------

/// Handle to a clip playing on a cpal output stream.
///
/// Dropping the handle disconnects the control channel: a looping clip
/// stops, a one-shot clip plays to its end.
pub struct CpalHandle {
    shared: Arc<Shared>,
    control: Option<mpsc::Sender<()>>,
}

impl PlaybackHandle for CpalHandle {
    fn set_volume(&mut self, volume: f32) {
        self.shared.set_volume(volume);
    }

    fn stop(&mut self) {
        self.shared.stopped.store(true, Ordering::SeqCst);
        self.shared.active.store(false, Ordering::SeqCst);
        if let Some(tx) = self.control.take() {
            // The thread may already have exited.
            let _ = tx.send(());
        }
    }

    fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// CpalBackend
// ---------------------------------------------------------------------------

/// Plays encoded clips on the default (or a named) output device.
#[derive(Debug, Clone, Default)]
pub struct CpalBackend {
    device_name: Option<String>,
}

impl CpalBackend {
    /// `device_name` of `None` uses the host's default output device.
    pub fn new(device_name: Option<String>) -> Self {
        Self { device_name }
    }

    fn open_device(&self) -> Result<cpal::Device, PlaybackError> {
        let host = cpal::default_host();
        if let Some(name) = &self.device_name {
            let found = host
                .output_devices()
                .map_err(|e| PlaybackError::Stream(e.to_string()))?
                .find(|d| d.name().map(|n| &n == name).unwrap_or(false));
            match found {
                Some(device) => return Ok(device),
                None => log::warn!("output device {name:?} not found, using default"),
            }
        }
        host.default_output_device().ok_or(PlaybackError::NoDevice)
    }
}

impl PlaybackBackend for CpalBackend {
    fn play(
        &self,
        audio: Vec<u8>,
        settings: PlaybackSettings,
    ) -> Result<Box<dyn PlaybackHandle>, PlaybackError> {
        let shared = Arc::new(Shared::new(settings.volume));
        let (tx, rx) = mpsc::channel::<()>();

        let backend = self.clone();
        let thread_shared = Arc::clone(&shared);
        thread::Builder::new()
            .name(format!("playback-{}", settings.channel))
            .spawn(move || {
                if let Err(e) = backend.run(audio, settings, &thread_shared, rx) {
                    log::warn!("{} playback failed: {e}", settings.channel);
                }
                thread_shared.active.store(false, Ordering::SeqCst);
            })
            .map_err(|e| PlaybackError::Stream(e.to_string()))?;

        Ok(Box::new(CpalHandle {
            shared,
            control: Some(tx),
        }))
    }
}

impl CpalBackend {
    /// Body of the playback thread.
    fn run(
        &self,
        audio: Vec<u8>,
        settings: PlaybackSettings,
        shared: &Arc<Shared>,
        control: mpsc::Receiver<()>,
    ) -> Result<(), PlaybackError> {
        let decoded = decode_audio(audio)?;
        if shared.stopped.load(Ordering::SeqCst) {
            return Ok(());
        }

        let device = self.open_device()?;
        let supported = device
            .default_output_config()
            .map_err(|e| PlaybackError::Stream(e.to_string()))?;
        let sample_format = supported.sample_format();
        let config: cpal::StreamConfig = supported.into();

        let samples = prepare_for_device(&decoded, config.channels, config.sample_rate.0)?;
        log::debug!(
            "{}: {} frames at {} Hz on {} ch (looping={})",
            settings.channel,
            samples.len() / config.channels.max(1) as usize,
            config.sample_rate.0,
            config.channels,
            settings.looping
        );

        let samples = Arc::new(samples);
        let stream = match sample_format {
            SampleFormat::F32 => build_stream::<f32>(&device, &config, samples, shared, settings.looping)?,
            SampleFormat::I16 => build_stream::<i16>(&device, &config, samples, shared, settings.looping)?,
            SampleFormat::U16 => build_stream::<u16>(&device, &config, samples, shared, settings.looping)?,
            other => {
                return Err(PlaybackError::Stream(format!(
                    "unsupported sample format: {other:?}"
                )))
            }
        };
        stream
            .play()
            .map_err(|e| PlaybackError::Stream(e.to_string()))?;

        let mut detached = false;
        loop {
            if shared.stopped.load(Ordering::SeqCst) || shared.finished.load(Ordering::SeqCst) {
                break;
            }
            if detached {
                // One-shot clip whose handle was dropped: play it out.
                thread::sleep(WATCH_INTERVAL);
                continue;
            }
            match control.recv_timeout(WATCH_INTERVAL) {
                Ok(()) => break,
                Err(mpsc::RecvTimeoutError::Timeout) => {}
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    if settings.looping {
                        break;
                    }
                    detached = true;
                }
            }
        }

        drop(stream);
        Ok(())
    }
}

/// Build an output stream that writes `samples` (already in the device
/// layout) scaled by the live volume.
fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    samples: Arc<Vec<f32>>,
    shared: &Arc<Shared>,
    looping: bool,
) -> Result<cpal::Stream, PlaybackError>
where
    T: SizedSample + FromSample<f32>,
{
    let shared = Arc::clone(shared);
    let mut cursor = 0usize;

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                if shared.stopped.load(Ordering::Relaxed) {
                    data.fill(T::EQUILIBRIUM);
                    return;
                }
                let gain = shared.volume();
                for out in data.iter_mut() {
                    if cursor >= samples.len() && looping && !samples.is_empty() {
                        cursor = 0;
                    }
                    let value = match samples.get(cursor) {
                        Some(&s) => {
                            cursor += 1;
                            s * gain
                        }
                        None => {
                            shared.finished.store(true, Ordering::Relaxed);
                            0.0
                        }
                    };
                    *out = T::from_sample(value);
                }
            },
            |err: cpal::StreamError| {
                log::error!("cpal output stream error: {err}");
            },
            None,
        )
        .map_err(|e| PlaybackError::Stream(e.to_string()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::channel::ChannelKind;

    #[test]
    fn shared_volume_round_trips_and_clamps() {
        let shared = Shared::new(0.25);
        assert!((shared.volume() - 0.25).abs() < f32::EPSILON);
        shared.set_volume(3.0);
        assert!((shared.volume() - 1.0).abs() < f32::EPSILON);
        shared.set_volume(-1.0);
        assert_eq!(shared.volume(), 0.0);
    }

    #[test]
    fn stop_marks_handle_inactive() {
        let shared = Arc::new(Shared::new(1.0));
        let (tx, rx) = mpsc::channel();
        let mut handle = CpalHandle {
            shared: Arc::clone(&shared),
            control: Some(tx),
        };
        assert!(handle.is_active());

        handle.stop();
        assert!(!handle.is_active());
        assert!(shared.stopped.load(Ordering::SeqCst));
        assert!(rx.try_recv().is_ok());

        // Second stop is a no-op.
        handle.stop();
        assert!(!handle.is_active());
    }

    #[test]
    fn undecodable_clip_ends_inactive() {
        let backend = CpalBackend::default();
        let settings = PlaybackSettings {
            channel: ChannelKind::Effect,
            volume: 1.0,
            looping: false,
        };
        // Decoding fails before any device is opened.
        let handle = backend.play(b"not audio".to_vec(), settings).unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while handle.is_active() && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert!(!handle.is_active());
    }
}
