//! # Playback Clock
//!
//! Samples the external, imprecise playback-position feed on every tick of
//! the configured [`TickSource`] and publishes a smoothed progress/duration
//! feed on the event bus. Publishing is suppressed while the position stays
//! within a small threshold of the last published value, which bounds
//! update frequency while keeping sub-100ms responsiveness for lyric sync.
//!
//! The clock also persists the playback position for resume-on-restart:
//! every few seconds while playing, and immediately on pause.

use bridge_traits::{PositionSource, TickSource};
use core_library::{LibraryStore, TrackKey};
use core_runtime::events::{CoreEvent, EventBus, PlayerEvent};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Mutable playback state owned by the clock.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackState {
    pub progress_secs: f64,
    /// Zero until the source reports a finite duration
    pub duration_secs: f64,
    pub is_playing: bool,
    /// Normalized to `0.0..=1.0`
    pub volume: f32,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            progress_secs: 0.0,
            duration_secs: 0.0,
            is_playing: false,
            volume: 0.8,
        }
    }
}

/// Clock tuning knobs.
#[derive(Debug, Clone)]
pub struct PlaybackClockConfig {
    /// Minimum position delta before progress is republished
    pub publish_threshold_secs: f64,
    /// How often the position is persisted while playing
    pub save_interval: Duration,
}

impl Default for PlaybackClockConfig {
    fn default() -> Self {
        Self {
            publish_threshold_secs: 0.05,
            save_interval: Duration::from_secs(5),
        }
    }
}

struct ClockInner {
    /// Baseline for threshold suppression
    last_published: f64,
    attached: Option<TrackKey>,
    /// Saved position to restore once the source is ready; consumed exactly once
    pending_resume: Option<f64>,
    last_save: Option<Instant>,
}

/// Smoothed progress/duration feed over an imprecise position source.
pub struct PlaybackClock {
    state: Mutex<PlaybackState>,
    inner: Mutex<ClockInner>,
    source: Arc<dyn PositionSource>,
    store: Arc<LibraryStore>,
    events: EventBus,
    config: PlaybackClockConfig,
}

impl PlaybackClock {
    pub fn new(
        source: Arc<dyn PositionSource>,
        store: Arc<LibraryStore>,
        events: EventBus,
        config: PlaybackClockConfig,
    ) -> Self {
        Self {
            state: Mutex::new(PlaybackState::default()),
            inner: Mutex::new(ClockInner {
                last_published: 0.0,
                attached: None,
                pending_resume: None,
                last_save: None,
            }),
            source,
            store,
            events,
            config,
        }
    }

    /// Snapshot of the current playback state.
    pub fn state(&self) -> PlaybackState {
        self.state.lock().expect("playback state lock").clone()
    }

    pub fn attached_key(&self) -> Option<TrackKey> {
        self.inner.lock().expect("clock inner lock").attached.clone()
    }

    /// Attach a new track. Progress and duration reset to zero before the
    /// source takes over. `resume_secs` arms a one-shot position restore
    /// that fires when the source first reports ready; it is only passed
    /// when re-attaching the same track after a restart.
    pub fn attach(&self, key: TrackKey, resume_secs: Option<f64>) {
        {
            let mut inner = self.inner.lock().expect("clock inner lock");
            inner.attached = Some(key);
            inner.pending_resume = resume_secs.filter(|s| *s > 0.0);
            inner.last_published = 0.0;
            inner.last_save = None;
        }
        {
            let mut state = self.state.lock().expect("playback state lock");
            state.progress_secs = 0.0;
            state.duration_secs = 0.0;
        }
        self.emit(PlayerEvent::PositionChanged { secs: 0.0 });
        self.emit(PlayerEvent::DurationChanged { secs: 0.0 });
    }

    /// Detach and zero the timeline (queue cleared).
    pub fn reset(&self) {
        {
            let mut inner = self.inner.lock().expect("clock inner lock");
            inner.attached = None;
            inner.pending_resume = None;
            inner.last_published = 0.0;
            inner.last_save = None;
        }
        {
            let mut state = self.state.lock().expect("playback state lock");
            state.progress_secs = 0.0;
            state.duration_secs = 0.0;
            state.is_playing = false;
        }
        self.emit(PlayerEvent::PositionChanged { secs: 0.0 });
        self.emit(PlayerEvent::PlayStateChanged { playing: false });
    }

    /// Explicit seek: republish immediately and reset the suppression
    /// baseline so the next tick is not swallowed as a stale delta.
    pub fn seek(&self, secs: f64) {
        let secs = secs.max(0.0);
        {
            let mut inner = self.inner.lock().expect("clock inner lock");
            inner.last_published = secs;
        }
        {
            let mut state = self.state.lock().expect("playback state lock");
            state.progress_secs = secs;
        }
        self.emit(PlayerEvent::PositionChanged { secs });
    }

    /// Flip play/pause. Pausing persists the position immediately.
    pub async fn set_playing(&self, playing: bool) {
        let progress = {
            let mut state = self.state.lock().expect("playback state lock");
            state.is_playing = playing;
            state.progress_secs
        };
        self.emit(PlayerEvent::PlayStateChanged { playing });

        if !playing && progress > 0.0 {
            self.persist_progress(progress).await;
        }
    }

    pub fn set_volume(&self, volume: f32) {
        let mut state = self.state.lock().expect("playback state lock");
        state.volume = volume.clamp(0.0, 1.0);
    }

    /// Playback-source failure: stop, nothing else propagates.
    pub fn mark_source_error(&self) {
        let mut state = self.state.lock().expect("playback state lock");
        state.is_playing = false;
        drop(state);
        self.emit(PlayerEvent::PlayStateChanged { playing: false });
    }

    /// Sampling loop: one [`Self::sample_once`] per tick until cancelled.
    pub async fn run(&self, ticker: Arc<dyn TickSource>, cancel: CancellationToken) {
        debug!("Playback clock loop started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => self.sample_once().await,
            }
        }
        debug!("Playback clock loop stopped");
    }

    /// Take one sample from the position source and publish/persist as
    /// needed. Public so hosts and tests can drive the clock manually.
    pub async fn sample_once(&self) {
        let mut publish_position: Option<f64> = None;
        let mut publish_duration: Option<f64> = None;
        let mut save: Option<f64> = None;

        {
            let mut inner = self.inner.lock().expect("clock inner lock");
            let mut state = self.state.lock().expect("playback state lock");

            if inner.attached.is_none() {
                return;
            }

            // One-shot resume once the source can seek there
            if inner.pending_resume.is_some() && self.source.is_ready() {
                let resume = inner.pending_resume.take().unwrap_or(0.0);
                state.progress_secs = resume;
                inner.last_published = resume;
                publish_position = Some(resume);
            }

            if state.duration_secs == 0.0 {
                if let Some(duration) = self.source.duration_secs() {
                    if duration.is_finite() && duration > 0.0 {
                        state.duration_secs = duration;
                        publish_duration = Some(duration);
                    }
                }
            }

            if state.is_playing {
                let position = self.source.position_secs();
                if (position - inner.last_published).abs() > self.config.publish_threshold_secs {
                    inner.last_published = position;
                    state.progress_secs = position;
                    publish_position = Some(position);
                }

                let due = inner
                    .last_save
                    .map_or(true, |at| at.elapsed() >= self.config.save_interval);
                if due && state.progress_secs > 0.0 {
                    inner.last_save = Some(Instant::now());
                    save = Some(state.progress_secs);
                }
            }
        }

        if let Some(secs) = publish_duration {
            self.emit(PlayerEvent::DurationChanged { secs });
        }
        if let Some(secs) = publish_position {
            self.emit(PlayerEvent::PositionChanged { secs });
        }
        if let Some(secs) = save {
            self.persist_progress(secs).await;
        }
    }

    async fn persist_progress(&self, secs: f64) {
        if let Err(e) = self.store.save_progress(secs.floor() as u64).await {
            warn!(error = %e, "Failed to persist playback position");
        }
    }

    fn emit(&self, event: PlayerEvent) {
        self.events.emit(CoreEvent::Player(event)).ok();
    }
}
