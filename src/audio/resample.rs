//! Channel remixing and sample-rate conversion for the output device.
//!
//! Decoded clips come at whatever rate and layout the provider chose; the
//! cpal output stream wants the device's own.  Two steps bridge the gap:
//!
//! 1. [`remix`]: map interleaved audio from one channel count to another.
//! 2. [`resample`]: convert between sample rates with `rubato`
//!    (`SincFixedIn` + `BlackmanHarris2` window).

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use crate::audio::decode::DecodedAudio;
use crate::audio::playback::PlaybackError;

// ---------------------------------------------------------------------------
// remix
// ---------------------------------------------------------------------------

/// Mix interleaved multi-channel audio down to mono by averaging all channels.
///
/// ```rust
/// use sound_snapper::audio::resample::to_mono;
///
/// let stereo = vec![0.5_f32, -0.5, 0.2, 0.4]; // L R L R
/// let mono = to_mono(&stereo, 2);
/// assert_eq!(mono.len(), 2);
/// assert!((mono[0] - 0.0).abs() < 1e-6);
/// assert!((mono[1] - 0.3).abs() < 1e-6);
/// ```
pub fn to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.to_vec(),
        n => {
            let n = n as usize;
            samples
                .chunks_exact(n)
                .map(|frame| frame.iter().sum::<f32>() / n as f32)
                .collect()
        }
    }
}

/// Convert interleaved audio from `from` channels to `to` channels.
///
/// * Same count: copied unchanged.
/// * To mono: averaged.
/// * From mono: duplicated into every output channel.
/// * Otherwise: the shared leading channels are copied and any extra output
///   channels are silent.
pub fn remix(samples: &[f32], from: u16, to: u16) -> Vec<f32> {
    if from == to {
        return samples.to_vec();
    }
    if from == 0 || to == 0 {
        return Vec::new();
    }
    if to == 1 {
        return to_mono(samples, from);
    }

    let (from, to) = (from as usize, to as usize);
    let frames = samples.len() / from;
    let mut out = Vec::with_capacity(frames * to);

    for frame in samples.chunks_exact(from) {
        for ch in 0..to {
            let sample = if from == 1 {
                frame[0]
            } else if ch < from {
                frame[ch]
            } else {
                0.0
            };
            out.push(sample);
        }
    }
    out
}

// ---------------------------------------------------------------------------
// resample
// ---------------------------------------------------------------------------

/// Resample interleaved `samples` from `from_rate` to `to_rate`.
///
/// * Equal rates: returned unchanged (no-op fast path).
/// * Empty input: empty output.
///
/// The output length is approximately `samples.len() * to_rate / from_rate`.
pub fn resample(
    samples: &[f32],
    channels: u16,
    from_rate: u32,
    to_rate: u32,
) -> Result<Vec<f32>, PlaybackError> {
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }
    if channels == 0 || from_rate == 0 || to_rate == 0 {
        return Err(PlaybackError::Resample(format!(
            "invalid layout: {channels} ch, {from_rate} Hz -> {to_rate} Hz"
        )));
    }

    let channels = channels as usize;
    let frames = samples.len() / channels;

    let mut planar = vec![Vec::with_capacity(frames); channels];
    for frame in samples.chunks_exact(channels) {
        for (ch, &s) in frame.iter().enumerate() {
            planar[ch].push(s);
        }
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = to_rate as f64 / from_rate as f64;
    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, frames, channels)
        .map_err(|e| PlaybackError::Resample(e.to_string()))?;

    let planar_out = resampler
        .process(&planar, None)
        .map_err(|e| PlaybackError::Resample(e.to_string()))?;

    let out_frames = planar_out.first().map(Vec::len).unwrap_or(0);
    let mut out = Vec::with_capacity(out_frames * channels);
    for i in 0..out_frames {
        for channel in &planar_out {
            out.push(channel[i]);
        }
    }
    Ok(out)
}

/// Remix and resample a decoded clip for a device with the given layout.
pub fn prepare_for_device(
    audio: &DecodedAudio,
    device_channels: u16,
    device_rate: u32,
) -> Result<Vec<f32>, PlaybackError> {
    let remixed = remix(&audio.samples, audio.channels, device_channels);
    resample(&remixed, device_channels, audio.sample_rate, device_rate)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // ---- remix -------------------------------------------------------------

    #[test]
    fn remix_same_layout_is_copy() {
        let input = vec![0.1_f32, 0.2, 0.3, 0.4];
        assert_eq!(remix(&input, 2, 2), input);
    }

    #[test]
    fn remix_mono_to_stereo_duplicates() {
        let out = remix(&[0.25_f32, -0.5], 1, 2);
        assert_eq!(out, vec![0.25, 0.25, -0.5, -0.5]);
    }

    #[test]
    fn remix_stereo_to_mono_averages() {
        let out = remix(&[1.0_f32, -1.0, 0.5, 0.5], 2, 1);
        assert_eq!(out.len(), 2);
        assert!((out[0] - 0.0).abs() < 1e-6);
        assert!((out[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn remix_stereo_to_quad_pads_with_silence() {
        let out = remix(&[0.1_f32, 0.2], 2, 4);
        assert_eq!(out, vec![0.1, 0.2, 0.0, 0.0]);
    }

    #[test]
    fn remix_zero_channels_is_empty() {
        assert!(remix(&[1.0_f32, 2.0], 0, 2).is_empty());
        assert!(to_mono(&[1.0_f32, 2.0], 0).is_empty());
    }

    // ---- resample ----------------------------------------------------------

    #[test]
    fn resample_same_rate_is_noop() {
        let input: Vec<f32> = (0..200).map(|i| i as f32 / 200.0).collect();
        let out = resample(&input, 2, 44_100, 44_100).unwrap();
        assert_eq!(out, input);
    }

    #[test]
    fn resample_empty_input() {
        assert!(resample(&[], 2, 22_050, 48_000).unwrap().is_empty());
    }

    #[test]
    fn resample_rejects_zero_channels() {
        assert!(resample(&[0.0; 4], 0, 22_050, 48_000).is_err());
    }

    #[test]
    fn resample_upsample_length_is_proportional() {
        // 0.5 s of stereo at 24 kHz -> ~0.5 s at 48 kHz.
        let frames = 12_000;
        let input = vec![0.0_f32; frames * 2];
        let out = resample(&input, 2, 24_000, 48_000).unwrap();

        assert_eq!(out.len() % 2, 0);
        let out_frames = out.len() / 2;
        let expected = frames * 2;
        assert!(
            out_frames.abs_diff(expected) <= 16,
            "expected ~{expected} frames, got {out_frames}"
        );
    }

    #[test]
    fn prepare_for_device_remixes_then_resamples() {
        let clip = DecodedAudio {
            samples: vec![0.0; 4_410],
            channels: 1,
            sample_rate: 44_100,
        };
        let out = prepare_for_device(&clip, 2, 44_100).unwrap();
        assert_eq!(out.len(), 8_820);
    }
}
