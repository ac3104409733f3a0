//! Audio channels and their volume state.
//!
//! An [`AudioChannel`] is the single slot a channel's live resource lives in.
//! Replacement goes through [`AudioChannel::replace`], which stops and
//! releases the previous resource before the new one starts, so a slot never
//! holds two live resources.

use std::fmt;

use crate::audio::playback::{PlaybackError, PlaybackHandle, PlaybackSettings};

/// Volume change per step, in percent.
pub const VOLUME_STEP: u8 = 5;

// ---------------------------------------------------------------------------
// ChannelKind
// ---------------------------------------------------------------------------

/// The three independent audio roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    /// Spoken scene description, played once.
    Narration,
    /// Looping background track.
    Ambience,
    /// One-shot primary sound effect.
    Effect,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Narration => "narration",
            ChannelKind::Ambience => "ambience",
            ChannelKind::Effect => "effect",
        }
    }

    /// Only ambience loops.
    pub fn loops(&self) -> bool {
        matches!(self, ChannelKind::Ambience)
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Volume
// ---------------------------------------------------------------------------

/// Direction of a volume step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeStep {
    Increase,
    Decrease,
}

/// Channel volume in percent, always within `0 ..= 100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Volume(u8);

impl Volume {
    pub const MAX: Volume = Volume(100);
    pub const MIN: Volume = Volume(0);

    /// Clamps `percent` to 100.
    pub fn new(percent: u8) -> Self {
        Volume(percent.min(100))
    }

    pub fn percent(&self) -> u8 {
        self.0
    }

    /// Gain in the playback range `0.0 ..= 1.0`.
    pub fn gain(&self) -> f32 {
        f32::from(self.0) / 100.0
    }

    /// One [`VOLUME_STEP`] in `step`'s direction, clamped at the bounds.
    ///
    /// ```
    /// use sound_snapper::audio::{Volume, VolumeStep};
    ///
    /// assert_eq!(Volume::new(50).step(VolumeStep::Increase).percent(), 55);
    /// assert_eq!(Volume::MAX.step(VolumeStep::Increase), Volume::MAX);
    /// assert_eq!(Volume::MIN.step(VolumeStep::Decrease), Volume::MIN);
    /// ```
    pub fn step(self, step: VolumeStep) -> Self {
        match step {
            VolumeStep::Increase => Volume::new(self.0.saturating_add(VOLUME_STEP)),
            VolumeStep::Decrease => Volume(self.0.saturating_sub(VOLUME_STEP)),
        }
    }
}

impl Default for Volume {
    fn default() -> Self {
        Volume::MAX
    }
}

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

// ---------------------------------------------------------------------------
// AudioChannel
// ---------------------------------------------------------------------------

/// Slot owning at most one live resource for a channel.
pub struct AudioChannel {
    kind: ChannelKind,
    source: Option<Box<dyn PlaybackHandle>>,
    volume: Volume,
    looping: bool,
    generation: u64,
}

impl fmt::Debug for AudioChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioChannel")
            .field("kind", &self.kind)
            .field("playing", &self.is_playing())
            .field("volume", &self.volume)
            .field("looping", &self.looping)
            .field("generation", &self.generation)
            .finish()
    }
}

impl AudioChannel {
    pub fn new(kind: ChannelKind, volume: Volume) -> Self {
        Self {
            kind,
            source: None,
            volume,
            looping: kind.loops(),
            generation: 0,
        }
    }

    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    pub fn volume(&self) -> Volume {
        self.volume
    }

    pub fn looping(&self) -> bool {
        self.looping
    }

    /// `true` while the assigned resource is still live.
    pub fn is_playing(&self) -> bool {
        self.source.as_ref().is_some_and(|s| s.is_active())
    }

    /// Register a new request for this channel and return its generation.
    /// Any earlier generation is superseded.
    pub fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    /// `true` if no newer request has been registered since `generation`.
    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }

    /// Settings a new resource on this channel starts with.
    pub fn settings(&self) -> PlaybackSettings {
        PlaybackSettings {
            channel: self.kind,
            volume: self.volume.gain(),
            looping: self.looping,
        }
    }

    /// Stop and release the current resource, then start a new one with
    /// `start` and assign it.
    ///
    /// When `start` fails the slot is left empty.
    pub fn replace<F>(&mut self, start: F) -> Result<(), PlaybackError>
    where
        F: FnOnce(PlaybackSettings) -> Result<Box<dyn PlaybackHandle>, PlaybackError>,
    {
        self.stop();
        let handle = start(self.settings())?;
        self.source = Some(handle);
        Ok(())
    }

    /// Stop and release the current resource.  Returns `true` if there was
    /// one.
    pub fn stop(&mut self) -> bool {
        match self.source.take() {
            Some(mut old) => {
                old.stop();
                true
            }
            None => false,
        }
    }

    /// Step the channel volume and apply it to the live resource.
    pub fn step_volume(&mut self, step: VolumeStep) -> Volume {
        self.volume = self.volume.step(step);
        if let Some(source) = self.source.as_mut() {
            source.set_volume(self.volume.gain());
        }
        self.volume
    }
}

impl Drop for AudioChannel {
    fn drop(&mut self) {
        self.stop();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Shared record of what happened to every mock resource.
    #[derive(Default)]
    struct Tracker {
        live: AtomicUsize,
        max_live: AtomicUsize,
        events: Mutex<Vec<String>>,
    }

    struct MockHandle {
        id: u32,
        active: bool,
        tracker: Arc<Tracker>,
    }

    impl MockHandle {
        fn start(id: u32, tracker: &Arc<Tracker>) -> Box<dyn PlaybackHandle> {
            let live = tracker.live.fetch_add(1, Ordering::SeqCst) + 1;
            tracker.max_live.fetch_max(live, Ordering::SeqCst);
            tracker.events.lock().unwrap().push(format!("start {id}"));
            Box::new(MockHandle {
                id,
                active: true,
                tracker: Arc::clone(tracker),
            })
        }
    }

    impl PlaybackHandle for MockHandle {
        fn set_volume(&mut self, volume: f32) {
            self.tracker
                .events
                .lock()
                .unwrap()
                .push(format!("volume {} {volume:.2}", self.id));
        }

        fn stop(&mut self) {
            if self.active {
                self.active = false;
                self.tracker.live.fetch_sub(1, Ordering::SeqCst);
                self.tracker
                    .events
                    .lock()
                    .unwrap()
                    .push(format!("stop {}", self.id));
            }
        }

        fn is_active(&self) -> bool {
            self.active
        }
    }

    // ---- Volume ------------------------------------------------------------

    #[test]
    fn volume_steps_by_five() {
        let v = Volume::new(50);
        assert_eq!(v.step(VolumeStep::Increase).percent(), 55);
        assert_eq!(v.step(VolumeStep::Decrease).percent(), 45);
    }

    #[test]
    fn volume_is_idempotent_at_bounds() {
        let mut v = Volume::MAX;
        for _ in 0..5 {
            v = v.step(VolumeStep::Increase);
        }
        assert_eq!(v.percent(), 100);

        let mut v = Volume::MIN;
        for _ in 0..5 {
            v = v.step(VolumeStep::Decrease);
        }
        assert_eq!(v.percent(), 0);
    }

    #[test]
    fn volume_new_clamps() {
        assert_eq!(Volume::new(250).percent(), 100);
        assert!((Volume::new(40).gain() - 0.4).abs() < f32::EPSILON);
    }

    #[test]
    fn only_ambience_loops() {
        assert!(ChannelKind::Ambience.loops());
        assert!(!ChannelKind::Effect.loops());
        assert!(!ChannelKind::Narration.loops());
    }

    // ---- AudioChannel ------------------------------------------------------

    #[test]
    fn replace_stops_previous_before_starting_next() {
        let tracker = Arc::new(Tracker::default());
        let mut channel = AudioChannel::new(ChannelKind::Ambience, Volume::MAX);

        for id in 1..=3 {
            channel
                .replace(|_| Ok(MockHandle::start(id, &tracker)))
                .unwrap();
        }

        let events = tracker.events.lock().unwrap().clone();
        assert_eq!(
            events,
            vec!["start 1", "stop 1", "start 2", "stop 2", "start 3"]
        );
        assert_eq!(tracker.max_live.load(Ordering::SeqCst), 1);
        assert!(channel.is_playing());
    }

    #[test]
    fn new_resource_gets_channel_volume_and_loop_flag() {
        let mut channel = AudioChannel::new(ChannelKind::Ambience, Volume::new(60));
        let mut seen = None;
        channel
            .replace(|settings| {
                seen = Some(settings);
                Err(PlaybackError::NoDevice)
            })
            .unwrap_err();

        let settings = seen.unwrap();
        assert!(settings.looping);
        assert!((settings.volume - 0.6).abs() < f32::EPSILON);
        assert_eq!(settings.channel, ChannelKind::Ambience);
    }

    #[test]
    fn failed_start_leaves_slot_empty() {
        let tracker = Arc::new(Tracker::default());
        let mut channel = AudioChannel::new(ChannelKind::Effect, Volume::MAX);
        channel
            .replace(|_| Ok(MockHandle::start(1, &tracker)))
            .unwrap();

        let result = channel.replace(|_| Err(PlaybackError::Stream("boom".into())));
        assert!(result.is_err());
        assert!(!channel.is_playing());
        assert_eq!(tracker.live.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn step_volume_applies_to_live_resource() {
        let tracker = Arc::new(Tracker::default());
        let mut channel = AudioChannel::new(ChannelKind::Effect, Volume::new(50));
        channel
            .replace(|_| Ok(MockHandle::start(7, &tracker)))
            .unwrap();

        let v = channel.step_volume(VolumeStep::Decrease);
        assert_eq!(v.percent(), 45);
        assert!(tracker
            .events
            .lock()
            .unwrap()
            .contains(&"volume 7 0.45".to_string()));
    }

    #[test]
    fn step_volume_without_resource_only_updates_state() {
        let mut channel = AudioChannel::new(ChannelKind::Ambience, Volume::new(95));
        assert_eq!(channel.step_volume(VolumeStep::Increase).percent(), 100);
        assert_eq!(channel.volume().percent(), 100);
    }

    #[test]
    fn generations_supersede() {
        let mut channel = AudioChannel::new(ChannelKind::Effect, Volume::MAX);
        let first = channel.next_generation();
        let second = channel.next_generation();
        assert!(!channel.is_current(first));
        assert!(channel.is_current(second));
    }

    #[test]
    fn drop_stops_live_resource() {
        let tracker = Arc::new(Tracker::default());
        {
            let mut channel = AudioChannel::new(ChannelKind::Ambience, Volume::MAX);
            channel
                .replace(|_| Ok(MockHandle::start(1, &tracker)))
                .unwrap();
        }
        assert_eq!(tracker.live.load(Ordering::SeqCst), 0);
    }
}
