//! [`AudioOrchestrator`]: synthesizes text and owns every channel slot.
//!
//! # Ordering
//!
//! [`AudioOrchestrator::play`] returns at once; the synthesis call and the
//! start of playback run on a spawned task.  Spawned tasks may be scheduled in
//! any order on a multi-thread runtime, so callers that need a sequence use
//! [`AudioOrchestrator::play_in_order`], which issues each request only after
//! the previous synthesis request has started.  It never waits for a request
//! to finish.  A [`PlaybackTicket`] lets callers await either point.
//!
//! # Supersession
//!
//! Every ambience/effect request takes a new channel generation.  When a
//! synthesis result arrives after a newer request for the same channel, it is
//! discarded instead of replacing the newer resource.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::Poll;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::audio::channel::{AudioChannel, ChannelKind, Volume, VolumeStep};
use crate::audio::playback::{PlaybackBackend, PlaybackSettings};
use crate::audio::synth::{SoundRequest, Synthesizer};
use crate::config::AudioConfig;

// ---------------------------------------------------------------------------
// PlayOptions / outcomes
// ---------------------------------------------------------------------------

/// Per-request playback options.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlayOptions {
    /// Override the requested length of a looping ambience clip.
    pub duration_secs: Option<f32>,
}

/// How a single [`AudioOrchestrator::play`] request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOutcome {
    /// Playback started.
    Started,
    /// Synthesis or playback failed; the channel stays silent.
    Silent,
    /// A newer request for the same channel arrived first; result dropped.
    Superseded,
}

/// Handle to an issued play request.
#[derive(Debug)]
pub struct PlaybackTicket {
    kind: ChannelKind,
    issued: Option<oneshot::Receiver<()>>,
    task: JoinHandle<ChannelOutcome>,
}

impl PlaybackTicket {
    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    /// Wait until the synthesis request has started.
    pub async fn issued(&mut self) {
        if let Some(issued) = self.issued.take() {
            // A dropped sender means the task ended before issuing.
            let _ = issued.await;
        }
    }

    /// Wait until playback started or the request was given up.
    pub async fn wait(self) -> ChannelOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                log::warn!("{} playback task ended abnormally: {e}", self.kind);
                ChannelOutcome::Silent
            }
        }
    }
}

// ---------------------------------------------------------------------------
// AudioOrchestrator
// ---------------------------------------------------------------------------

/// Owns the ambience and effect slots and plays narration.
///
/// Narration has no slot: it is synthesized, started and detached.
pub struct AudioOrchestrator {
    synth: Arc<dyn Synthesizer>,
    backend: Arc<dyn PlaybackBackend>,
    ambience: Mutex<AudioChannel>,
    effect: Mutex<AudioChannel>,
    ambience_duration_secs: f32,
}

impl AudioOrchestrator {
    pub fn new(
        synth: Arc<dyn Synthesizer>,
        backend: Arc<dyn PlaybackBackend>,
        config: &AudioConfig,
    ) -> Self {
        Self {
            synth,
            backend,
            ambience: Mutex::new(AudioChannel::new(
                ChannelKind::Ambience,
                Volume::new(config.initial_ambience_volume),
            )),
            effect: Mutex::new(AudioChannel::new(
                ChannelKind::Effect,
                Volume::new(config.initial_effect_volume),
            )),
            ambience_duration_secs: config.ambience_duration_secs,
        }
    }

    fn slot(&self, kind: ChannelKind) -> Option<MutexGuard<'_, AudioChannel>> {
        let slot = match kind {
            ChannelKind::Narration => return None,
            ChannelKind::Ambience => &self.ambience,
            ChannelKind::Effect => &self.effect,
        };
        Some(slot.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Synthesize `text` and play it on `kind`.  Returns once the request is
    /// issued.
    pub fn play(
        self: &Arc<Self>,
        kind: ChannelKind,
        text: impl Into<String>,
        options: PlayOptions,
    ) -> PlaybackTicket {
        let text = text.into();
        let generation = self.slot(kind).map(|mut c| c.next_generation());
        log::debug!("{kind}: requested ({text:?})");

        let (issued_tx, issued) = oneshot::channel();
        let this = Arc::clone(self);
        let task = tokio::spawn(async move {
            this.run(kind, text, options, generation, issued_tx).await
        });
        PlaybackTicket {
            kind,
            issued: Some(issued),
            task,
        }
    }

    /// Issue `requests` one after another.  Each synthesis request is started
    /// only after the previous one has started; none is awaited to completion.
    pub async fn play_in_order(
        self: &Arc<Self>,
        requests: Vec<(ChannelKind, String)>,
    ) -> Vec<PlaybackTicket> {
        let mut tickets = Vec::with_capacity(requests.len());
        for (kind, text) in requests {
            let mut ticket = self.play(kind, text, PlayOptions::default());
            ticket.issued().await;
            tickets.push(ticket);
        }
        tickets
    }

    async fn run(
        &self,
        kind: ChannelKind,
        text: String,
        options: PlayOptions,
        generation: Option<u64>,
        issued: oneshot::Sender<()>,
    ) -> ChannelOutcome {
        let request = async {
            match kind {
                ChannelKind::Narration => self.synth.speech(&text).await,
                ChannelKind::Ambience => {
                    let secs = options.duration_secs.unwrap_or(self.ambience_duration_secs);
                    self.synth.sound(&text, SoundRequest::looping(secs)).await
                }
                ChannelKind::Effect => self.synth.sound(&text, SoundRequest::one_shot()).await,
            }
        };
        let synthesized = start_then_signal(request, issued).await;
        let audio = match synthesized {
            Ok(audio) => audio,
            Err(e) => {
                log::warn!("{kind}: synthesis failed, channel stays silent: {e}");
                return ChannelOutcome::Silent;
            }
        };

        let Some(generation) = generation else {
            let settings = PlaybackSettings {
                channel: kind,
                volume: 1.0,
                looping: false,
            };
            return match self.backend.play(audio, settings) {
                Ok(_detached) => ChannelOutcome::Started,
                Err(e) => {
                    log::warn!("{kind}: playback failed: {e}");
                    ChannelOutcome::Silent
                }
            };
        };

        let Some(mut channel) = self.slot(kind) else {
            return ChannelOutcome::Silent;
        };
        if !channel.is_current(generation) {
            log::debug!("{kind}: discarding superseded result (generation {generation})");
            return ChannelOutcome::Superseded;
        }
        match channel.replace(|settings| self.backend.play(audio, settings)) {
            Ok(()) => {
                log::debug!("{kind}: playing (generation {generation})");
                ChannelOutcome::Started
            }
            Err(e) => {
                log::warn!("{kind}: playback failed: {e}");
                ChannelOutcome::Silent
            }
        }
    }

    /// Step a channel's volume.  Narration has no volume and yields `None`.
    pub fn set_volume(&self, kind: ChannelKind, step: VolumeStep) -> Option<Volume> {
        self.slot(kind).map(|mut c| c.step_volume(step))
    }

    pub fn volume(&self, kind: ChannelKind) -> Option<Volume> {
        self.slot(kind).map(|c| c.volume())
    }

    pub fn is_playing(&self, kind: ChannelKind) -> bool {
        self.slot(kind).is_some_and(|c| c.is_playing())
    }

    /// Stop `kind` and drop any of its requests still in flight.
    pub fn stop(&self, kind: ChannelKind) -> bool {
        match self.slot(kind) {
            Some(mut channel) => {
                channel.next_generation();
                channel.stop()
            }
            None => false,
        }
    }
}

/// Poll `request` once so it has started, signal `issued`, then drive it to
/// completion.
async fn start_then_signal<F: Future>(request: F, issued: oneshot::Sender<()>) -> F::Output {
    let mut request = std::pin::pin!(request);
    let first = std::future::poll_fn(|cx| Poll::Ready(request.as_mut().poll(cx))).await;
    let _ = issued.send(());
    match first {
        Poll::Ready(output) => output,
        Poll::Pending => request.await,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
