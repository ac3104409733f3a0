//! Loading messages and the auto-clearing error banner.

use std::time::Duration;

use rand::seq::SliceRandom;
use tokio::task::JoinHandle;

use crate::session::state::{lock, Banner, BusyKind, SharedSession};
use crate::transform::ErrorCategory;

pub const SOUND_MESSAGES: [&str; 3] = [
    "Listening to the world...",
    "Composing a soundscape...",
    "Tuning the atmosphere...",
];

pub const TRANSFORM_MESSAGES: [&str; 4] = [
    "Remixing reality...",
    "Painting with pixels...",
    "Entering the portal...",
    "Bending the visual spectrum...",
];

impl BusyKind {
    /// Message set shown while this kind of work runs.
    pub fn messages(&self) -> &'static [&'static str] {
        match self {
            BusyKind::Sound => &SOUND_MESSAGES,
            BusyKind::Transform => &TRANSFORM_MESSAGES,
        }
    }
}

/// A random message from `kind`'s set.
pub fn pick_message(kind: BusyKind) -> &'static str {
    kind.messages()
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or("Working...")
}

// ---------------------------------------------------------------------------
// LoadingRotator
// ---------------------------------------------------------------------------

/// Replaces the loading message with a random one from the active set every
/// `interval` until dropped.
pub struct LoadingRotator {
    kind: BusyKind,
    task: JoinHandle<()>,
}

impl LoadingRotator {
    /// Shows a first message right away, then rotates on a background task.
    pub fn start(state: &SharedSession, kind: BusyKind, interval: Duration) -> Self {
        lock(state).loading_message = Some(pick_message(kind).to_string());

        let state = SharedSession::clone(state);
        let task = tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                lock(&state).loading_message = Some(pick_message(kind).to_string());
            }
        });
        Self { kind, task }
    }

    pub fn kind(&self) -> BusyKind {
        self.kind
    }
}

impl Drop for LoadingRotator {
    fn drop(&mut self) {
        self.task.abort();
    }
}

// ---------------------------------------------------------------------------
// Banner
// ---------------------------------------------------------------------------

/// Show `category` as the banner and clear it after `duration`, unless a
/// newer banner replaced it first.  Returns the banner id.
pub fn show_banner(state: &SharedSession, category: ErrorCategory, duration: Duration) -> u64 {
    let id = {
        let mut s = lock(state);
        s.next_banner_id += 1;
        let id = s.next_banner_id;
        s.banner = Some(Banner {
            id,
            category,
            message: category.message().to_string(),
        });
        id
    };
    log::info!("banner {id}: {}", category.message());

    let state = SharedSession::clone(state);
    tokio::spawn(async move {
        tokio::time::sleep(duration).await;
        let mut s = lock(&state);
        if s.banner.as_ref().is_some_and(|b| b.id == id) {
            s.banner = None;
        }
    });
    id
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
