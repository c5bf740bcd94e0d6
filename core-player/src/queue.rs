//! # Playback Queue State Machine
//!
//! Owns the queue contents, the current index, and the play mode, and
//! decides which track plays next. All mutation goes through this type;
//! nothing else touches the queue.
//!
//! Invariant: `current` is `Some` exactly when the queue is non-empty, and
//! always within bounds.

use core_library::{PlayMode, Track, TrackKey};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

/// Outcome of a natural end-of-track event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackEnd {
    /// Single mode: the same track replays from position zero
    Restarted,
    /// The queue advanced to a new current track
    Advanced,
    /// The queue was empty; nothing to play
    Stopped,
}

/// Queue contents, current index, and traversal policy.
pub struct QueueController {
    tracks: Vec<Track>,
    current: Option<usize>,
    mode: PlayMode,
    autoplay: bool,
    rng: SmallRng,
}

impl QueueController {
    pub fn new() -> Self {
        Self {
            tracks: Vec::new(),
            current: None,
            mode: PlayMode::default(),
            autoplay: false,
            rng: SmallRng::from_entropy(),
        }
    }

    /// Deterministic RNG for shuffle tests.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
            ..Self::new()
        }
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.current.and_then(|i| self.tracks.get(i))
    }

    pub fn mode(&self) -> PlayMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: PlayMode) {
        self.mode = mode;
    }

    /// One-shot read of the autoplay intent set by the last jump.
    ///
    /// Restoring persisted state never sets it, so a restart does not start
    /// playing on its own.
    pub fn take_autoplay(&mut self) -> bool {
        std::mem::take(&mut self.autoplay)
    }

    /// Replace the queue and jump to `index`, clamped to the valid range.
    /// Empty input is silently ignored.
    pub fn start_playback(&mut self, tracks: Vec<Track>, index: usize) {
        if tracks.is_empty() {
            return;
        }
        let bounded = index.min(tracks.len() - 1);
        debug!(len = tracks.len(), index = bounded, "Starting playback");
        self.tracks = tracks;
        self.current = Some(bounded);
        self.autoplay = true;
    }

    /// Jump to the track if it is already queued (by key), otherwise append
    /// it and jump to the new tail. Always arms autoplay.
    pub fn play_track(&mut self, track: Track) {
        let key = track.key();
        match self.position_of(&key) {
            Some(idx) => {
                self.current = Some(idx);
            }
            None => {
                self.tracks.push(track);
                self.current = Some(self.tracks.len() - 1);
            }
        }
        self.autoplay = true;
    }

    /// Advance according to the play mode. No-op on an empty queue.
    ///
    /// Single mode behaves like List here; its repeat semantics only apply
    /// to the natural end-of-track event, not an explicit skip.
    pub fn next(&mut self) -> Option<&Track> {
        if self.tracks.is_empty() {
            return None;
        }
        let len = self.tracks.len();
        let cur = self.current.unwrap_or(0);

        let next = match self.mode {
            PlayMode::Shuffle => {
                // Rejection sampling: avoid the current index when possible
                let mut idx = self.rng.gen_range(0..len);
                while len > 1 && idx == cur {
                    idx = self.rng.gen_range(0..len);
                }
                idx
            }
            PlayMode::List | PlayMode::Single => (cur + 1) % len,
        };

        self.current = Some(next);
        self.autoplay = true;
        self.tracks.get(next)
    }

    /// Step backwards. Shuffle picks a fresh random index and may repeat the
    /// current track (asymmetric with `next()`, intentionally).
    pub fn prev(&mut self) -> Option<&Track> {
        if self.tracks.is_empty() {
            return None;
        }
        let len = self.tracks.len();
        let cur = self.current.unwrap_or(0);

        let prev = match self.mode {
            PlayMode::Shuffle => self.rng.gen_range(0..len),
            PlayMode::List | PlayMode::Single => (cur + len - 1) % len,
        };

        self.current = Some(prev);
        self.autoplay = true;
        self.tracks.get(prev)
    }

    /// Remove the entry at `index`. Out-of-range indices are ignored.
    ///
    /// Removing an entry before the current one shifts the index down so the
    /// current track keeps its identity; removing the current entry advances
    /// to the next remaining index (clamped), or clears the queue position
    /// entirely when the queue empties. Removal never arms autoplay.
    pub fn remove(&mut self, index: usize) {
        if index >= self.tracks.len() {
            return;
        }
        self.tracks.remove(index);

        let Some(cur) = self.current else {
            return;
        };

        if index < cur {
            self.current = Some(cur - 1);
        } else if index == cur {
            if self.tracks.is_empty() {
                self.current = None;
            } else {
                self.current = Some(index.min(self.tracks.len() - 1));
            }
        }
    }

    /// Empty the queue and clear the current track.
    pub fn clear(&mut self) {
        self.tracks.clear();
        self.current = None;
        self.autoplay = false;
    }

    /// Natural end-of-track: Single restarts the same track, other modes
    /// advance via `next()`.
    pub fn handle_track_end(&mut self) -> TrackEnd {
        if self.tracks.is_empty() {
            return TrackEnd::Stopped;
        }
        match self.mode {
            PlayMode::Single => {
                self.autoplay = true;
                TrackEnd::Restarted
            }
            PlayMode::List | PlayMode::Shuffle => {
                self.next();
                TrackEnd::Advanced
            }
        }
    }

    /// Restore persisted queue state. Does not arm autoplay.
    pub fn restore(&mut self, tracks: Vec<Track>, index: Option<usize>, mode: PlayMode) {
        self.mode = mode;
        if tracks.is_empty() {
            self.tracks = Vec::new();
            self.current = None;
            return;
        }
        let bounded = index.map(|i| i.min(tracks.len() - 1)).unwrap_or(0);
        self.tracks = tracks;
        self.current = Some(bounded);
        self.autoplay = false;
    }

    fn position_of(&self, key: &TrackKey) -> Option<usize> {
        self.tracks.iter().position(|t| t.is_same(key))
    }
}

impl Default for QueueController {
    fn default() -> Self {
        Self::new()
    }
}
