//! # App State — composition root
//!
//! Wires the queue controller, playback clock, lyric synchronizer, and sync
//! engine together and exposes the single surface the host UI talks to.
//! There is no ambient global: hosts construct an [`AppState`] from a
//! [`CoreConfig`] and pass the handle wherever read/write access is needed.
//!
//! Ownership is strict: the queue is mutated only through queue actions
//! here, playback state only through the clock, and collections only
//! through the sync engine. Everything else observes via the event bus.

pub mod error;

pub use error::{CoreError, Result};

// Re-export the types hosts interact with, so depending on this crate alone
// is enough to drive the core.
pub use core_library::{
    Favorites, PlayMode, PlayedTrack, Playlist, PlaylistSet, PlaylistUpdate, Track, TrackKey,
};
pub use core_player::PlaybackState;
pub use core_runtime::events::{CoreEvent, PlayerEvent, SyncEvent};
pub use core_runtime::CoreConfig;
pub use core_sync::SyncState;

use core_library::{LibraryStore, PlayerSnapshot};
use core_player::{
    LyricSynchronizer, PlaybackClock, PlaybackClockConfig, QueueController, TrackEnd,
};
use core_runtime::events::EventBus;
use core_sync::{HttpCollectionsRemote, SyncEngine, SyncEngineConfig};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Sentinel playlist id the UI uses for the favorites pseudo-playlist.
/// Song toggles against it are routed to the favorites collection.
pub const FAVORITES_ID: &str = "favorites";

struct SleepTimer {
    deadline_millis: i64,
    cancel: CancellationToken,
}

/// The composition root: owns every core component and routes actions.
pub struct AppState {
    queue: Mutex<QueueController>,
    clock: Arc<PlaybackClock>,
    lyrics: Arc<Mutex<LyricSynchronizer>>,
    sync: Arc<SyncEngine>,
    store: Arc<LibraryStore>,
    events: EventBus,
    wall_clock: Arc<dyn bridge_traits::Clock>,
    sleep_timer: Arc<Mutex<Option<SleepTimer>>>,
    last_recorded: Mutex<Option<TrackKey>>,
    shutdown: CancellationToken,
}

impl AppState {
    /// Build the core from a validated configuration, restore persisted
    /// state, and start the background sampling and lyric-feed tasks.
    ///
    /// Restoring never autoplays; if the persisted queue still has a
    /// current track, its saved position is re-armed so playback resumes
    /// where it left off once the host attaches the stream.
    pub async fn build(config: CoreConfig) -> Result<Arc<Self>> {
        let events = EventBus::new(config.event_capacity);
        let store = Arc::new(LibraryStore::new(config.settings_store.clone()));

        let clock = Arc::new(PlaybackClock::new(
            config.position_source.clone(),
            store.clone(),
            events.clone(),
            PlaybackClockConfig {
                publish_threshold_secs: config.progress_publish_threshold,
                save_interval: config.progress_save_interval,
            },
        ));

        let remote = Arc::new(HttpCollectionsRemote::new(
            config.http_client.clone(),
            config.api_base_url.clone(),
        ));
        let sync = Arc::new(SyncEngine::new(
            remote,
            store.clone(),
            events.clone(),
            SyncEngineConfig {
                request_timeout: config.sync_timeout,
                status_reset_delay: config.status_reset_delay,
                serialize_writes: config.serialize_writes,
            },
        ));
        sync.restore().await;

        let shutdown = CancellationToken::new();
        let app = Arc::new(Self {
            queue: Mutex::new(QueueController::new()),
            clock: clock.clone(),
            lyrics: Arc::new(Mutex::new(LyricSynchronizer::new())),
            sync,
            store: store.clone(),
            events: events.clone(),
            wall_clock: config.clock.clone(),
            sleep_timer: Arc::new(Mutex::new(None)),
            last_recorded: Mutex::new(None),
            shutdown: shutdown.clone(),
        });

        // Restore the persisted player snapshot
        let snapshot = store.load_player().await;
        let saved_progress = store.load_saved_progress().await;
        {
            let mut queue = app.queue.lock().expect("queue lock");
            queue.restore(snapshot.queue, snapshot.queue_index, snapshot.play_mode);
        }
        app.clock.set_volume(snapshot.volume);

        if let Some(track) = app.current_track() {
            // Same track after a restart: arm the one-shot position restore
            app.clock
                .attach(track.key(), Some(saved_progress as f64));
            app.emit_track_changed(&track, false);
            info!(key = %track.key(), resume_secs = saved_progress, "Restored playback state");
        }

        // Background tasks
        Self::spawn_lyric_feed(app.lyrics.clone(), events, shutdown.clone());
        {
            let clock = clock.clone();
            let ticker = config.tick_source.clone();
            let cancel = shutdown.clone();
            tokio::spawn(async move {
                clock.run(ticker, cancel).await;
            });
        }

        Ok(app)
    }

    /// Stop the background tasks. Further calls are no-ops.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        self.cancel_sleep_timer();
    }

    /// Subscribe to the core event stream.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<CoreEvent> {
        self.events.subscribe()
    }

    // ------------------------------------------------------------------
    // Read state
    // ------------------------------------------------------------------

    pub fn playback(&self) -> PlaybackState {
        self.clock.state()
    }

    pub fn current_track(&self) -> Option<Track> {
        self.queue.lock().expect("queue lock").current_track().cloned()
    }

    pub fn queue_tracks(&self) -> Vec<Track> {
        self.queue.lock().expect("queue lock").tracks().to_vec()
    }

    pub fn queue_index(&self) -> Option<usize> {
        self.queue.lock().expect("queue lock").current_index()
    }

    pub fn play_mode(&self) -> PlayMode {
        self.queue.lock().expect("queue lock").mode()
    }

    pub fn favorites(&self) -> Favorites {
        self.sync.favorites()
    }

    pub fn playlists(&self) -> PlaylistSet {
        self.sync.playlists()
    }

    pub fn is_favorite(&self, key: &TrackKey) -> bool {
        self.sync.is_favorite(key)
    }

    pub fn sync_status(&self) -> SyncState {
        self.sync.status()
    }

    pub fn active_lyric_index(&self) -> Option<usize> {
        self.lyrics.lock().expect("lyrics lock").active_index()
    }

    pub fn lyrics_error(&self) -> Option<String> {
        self.lyrics
            .lock()
            .expect("lyrics lock")
            .error()
            .map(str::to_string)
    }

    // ------------------------------------------------------------------
    // Playback actions
    // ------------------------------------------------------------------

    /// Replace the queue and start playing at `index` (clamped). Empty
    /// input is silently ignored.
    #[instrument(skip(self, tracks), fields(len = tracks.len(), index = index))]
    pub async fn start_playback(&self, tracks: Vec<Track>, index: usize) {
        self.queue
            .lock()
            .expect("queue lock")
            .start_playback(tracks, index);
        self.activate_current().await;
    }

    /// Play one track: jump to it if queued, append otherwise.
    pub async fn play_track(&self, track: Track) {
        self.queue.lock().expect("queue lock").play_track(track);
        self.activate_current().await;
    }

    pub async fn next_track(&self) {
        self.queue.lock().expect("queue lock").next();
        self.activate_current().await;
    }

    pub async fn prev_track(&self) {
        self.queue.lock().expect("queue lock").prev();
        self.activate_current().await;
    }

    /// Flip play/pause. No-op with no current track.
    pub async fn toggle_play(&self) {
        if self.current_track().is_none() {
            return;
        }
        let playing = !self.clock.state().is_playing;
        self.clock.set_playing(playing).await;
        if playing {
            self.maybe_record_history().await;
        }
    }

    pub async fn seek(&self, secs: f64) {
        self.clock.seek(secs);
    }

    pub async fn set_volume(&self, volume: f32) {
        self.clock.set_volume(volume);
        self.persist_player().await;
    }

    pub async fn set_play_mode(&self, mode: PlayMode) {
        self.queue.lock().expect("queue lock").set_mode(mode);
        self.persist_player().await;
    }

    /// list → shuffle → single → list
    pub async fn cycle_play_mode(&self) -> PlayMode {
        let mode = {
            let mut queue = self.queue.lock().expect("queue lock");
            let next = queue.mode().next_mode();
            queue.set_mode(next);
            next
        };
        self.persist_player().await;
        mode
    }

    /// Remove a queue entry. If the current track was removed the queue
    /// advances (without autoplay); an emptied queue stops playback.
    pub async fn remove_from_queue(&self, index: usize) {
        let before = self.current_track().map(|t| t.key());
        self.queue.lock().expect("queue lock").remove(index);
        let after = self.current_track().map(|t| t.key());

        if before != after {
            self.activate_current().await;
        } else {
            self.emit_queue_changed();
            self.persist_player().await;
        }
    }

    pub async fn clear_queue(&self) {
        self.queue.lock().expect("queue lock").clear();
        self.clock.reset();
        self.lyrics.lock().expect("lyrics lock").clear();
        self.emit_queue_changed();
        self.persist_player().await;
    }

    /// Natural end-of-track from the host audio engine. Single mode
    /// restarts the same track from zero; other modes advance.
    pub async fn handle_track_end(&self) {
        let outcome = self.queue.lock().expect("queue lock").handle_track_end();
        match outcome {
            TrackEnd::Restarted => {
                self.clock.seek(0.0);
                self.clock.set_playing(true).await;
            }
            TrackEnd::Advanced => self.activate_current().await,
            TrackEnd::Stopped => {}
        }
    }

    /// Playback-source failure: surfaces as `is_playing = false` only.
    pub fn handle_source_error(&self) {
        self.clock.mark_source_error();
    }

    /// Feed lyric text (LRC) for the current track. Parse errors stay
    /// local to the lyric component.
    pub async fn load_lyrics(&self, text: &str) {
        let progress = self.clock.state().progress_secs;
        let index = {
            let mut lyrics = self.lyrics.lock().expect("lyrics lock");
            lyrics.load_text(text, progress);
            lyrics.active_index()
        };
        self.events
            .emit(CoreEvent::Player(PlayerEvent::LyricLineChanged { index }))
            .ok();
    }

    // ------------------------------------------------------------------
    // Collections
    // ------------------------------------------------------------------

    /// Optimistically toggle the favorite flag. Returns whether the track
    /// is now a favorite; sync failures surface via [`Self::sync_status`].
    pub async fn toggle_favorite(&self, track: Track) -> bool {
        self.sync.toggle_favorite(track).await
    }

    /// Create an empty playlist with a fresh id.
    pub async fn create_playlist(&self, name: impl Into<String>) -> Playlist {
        let playlist = Playlist::new(format!("pl-{}", Uuid::new_v4()), name);
        self.sync.add_playlist(playlist.clone()).await;
        playlist
    }

    pub async fn rename_playlist(&self, id: &str, name: impl Into<String>) {
        self.sync
            .update_playlist(id, PlaylistUpdate::rename(name))
            .await;
    }

    pub async fn delete_playlist(&self, id: &str) {
        self.sync.delete_playlist(id).await;
    }

    /// Toggle a track in a playlist. The favorites pseudo-playlist id
    /// routes to the favorites collection.
    pub async fn toggle_track_in_playlist(&self, playlist_id: &str, track: Track) -> Option<bool> {
        if playlist_id == FAVORITES_ID {
            return Some(self.toggle_favorite(track).await);
        }
        self.sync.toggle_track_in_playlist(playlist_id, track).await
    }

    /// Manual "download from cloud": cloud wins, wholesale.
    pub async fn pull_from_remote(&self) {
        self.sync.pull_from_remote().await;
    }

    /// Manual "upload to cloud": local wins, wholesale.
    pub async fn push_to_remote(&self) {
        self.sync.push_to_remote().await;
    }

    pub async fn history(&self) -> Result<Vec<PlayedTrack>> {
        Ok(self.sync.history().await?)
    }

    pub async fn clear_history(&self) -> Result<()> {
        Ok(self.sync.clear_history().await?)
    }

    // ------------------------------------------------------------------
    // Session
    // ------------------------------------------------------------------

    /// Install a bearer token for the user-data backend.
    pub fn sign_in(&self, token: impl Into<String>) {
        self.sync.set_session(Some(token.into()));
    }

    /// Drop the session. Local collections stay untouched.
    pub fn sign_out(&self) {
        self.sync.set_session(None);
    }

    pub fn has_session(&self) -> bool {
        self.sync.has_session()
    }

    // ------------------------------------------------------------------
    // Sleep timer
    // ------------------------------------------------------------------

    /// Arm (or re-arm) the sleep timer. When the deadline passes playback
    /// pauses and the armed state clears.
    pub fn set_sleep_timer(&self, duration: Duration) {
        self.cancel_sleep_timer();

        let deadline_millis =
            self.wall_clock.unix_timestamp_millis() + duration.as_millis() as i64;
        let cancel = CancellationToken::new();
        *self.sleep_timer.lock().expect("sleep timer lock") = Some(SleepTimer {
            deadline_millis,
            cancel: cancel.clone(),
        });

        let clock = self.clock.clone();
        let wall_clock = self.wall_clock.clone();
        let events = self.events.clone();
        let armed = self.sleep_timer.clone();
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = shutdown.cancelled() => break,
                    _ = interval.tick() => {
                        if wall_clock.unix_timestamp_millis() >= deadline_millis {
                            clock.set_playing(false).await;
                            armed.lock().expect("sleep timer lock").take();
                            events
                                .emit(CoreEvent::Player(PlayerEvent::SleepTimerFired))
                                .ok();
                            debug!("Sleep timer fired");
                            break;
                        }
                    }
                }
            }
        });
    }

    /// Disarm the sleep timer, the only cancellable scheduled operation.
    pub fn cancel_sleep_timer(&self) {
        if let Some(timer) = self.sleep_timer.lock().expect("sleep timer lock").take() {
            timer.cancel.cancel();
        }
    }

    pub fn sleep_deadline_millis(&self) -> Option<i64> {
        self.sleep_timer
            .lock()
            .expect("sleep timer lock")
            .as_ref()
            .map(|t| t.deadline_millis)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// After any queue jump: attach the clock to the new current track,
    /// reset lyrics, start playback when the jump armed autoplay, record
    /// history, and persist the snapshot.
    async fn activate_current(&self) {
        let (track, autoplay) = {
            let mut queue = self.queue.lock().expect("queue lock");
            (queue.current_track().cloned(), queue.take_autoplay())
        };
        self.emit_queue_changed();

        let Some(track) = track else {
            self.clock.reset();
            self.lyrics.lock().expect("lyrics lock").clear();
            self.persist_player().await;
            return;
        };

        let key = track.key();
        if self.clock.attached_key().as_ref() == Some(&key) {
            // Same track re-selected from the queue: restart from zero
            if autoplay {
                self.clock.seek(0.0);
            }
        } else {
            self.clock.attach(key, None);
            self.lyrics.lock().expect("lyrics lock").clear();
        }

        self.emit_track_changed(&track, autoplay);
        if autoplay {
            self.clock.set_playing(true).await;
            self.maybe_record_history().await;
        }
        self.persist_player().await;
    }

    /// Record the current track into history once per track session.
    async fn maybe_record_history(&self) {
        if !self.sync.has_session() || !self.clock.state().is_playing {
            return;
        }
        let Some(track) = self.current_track() else {
            return;
        };
        let key = track.key();
        {
            let mut last = self.last_recorded.lock().expect("last recorded lock");
            if last.as_ref() == Some(&key) {
                return;
            }
            *last = Some(key);
        }
        self.sync.record_played(track);
    }

    async fn persist_player(&self) {
        let snapshot = {
            let queue = self.queue.lock().expect("queue lock");
            PlayerSnapshot {
                queue: queue.tracks().to_vec(),
                queue_index: queue.current_index(),
                volume: self.clock.state().volume,
                play_mode: queue.mode(),
            }
        };
        if let Err(e) = self.store.save_player(&snapshot).await {
            tracing::warn!(error = %e, "Failed to persist player snapshot");
        }
    }

    fn emit_queue_changed(&self) {
        let (len, current) = {
            let queue = self.queue.lock().expect("queue lock");
            (queue.len(), queue.current_index())
        };
        self.events
            .emit(CoreEvent::Player(PlayerEvent::QueueChanged { len, current }))
            .ok();
    }

    fn emit_track_changed(&self, track: &Track, autoplay: bool) {
        self.events
            .emit(CoreEvent::Player(PlayerEvent::TrackChanged {
                platform: track.platform.clone(),
                id: track.id.clone(),
                title: track.title.clone(),
                autoplay,
            }))
            .ok();
    }

    /// Feeds published positions into the lyric synchronizer and emits
    /// line changes. Runs until shutdown.
    fn spawn_lyric_feed(
        lyrics: Arc<Mutex<LyricSynchronizer>>,
        events: EventBus,
        cancel: CancellationToken,
    ) {
        let mut rx = events.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    received = rx.recv() => match received {
                        Ok(CoreEvent::Player(PlayerEvent::PositionChanged { secs })) => {
                            let changed = lyrics
                                .lock()
                                .expect("lyrics lock")
                                .on_progress(secs);
                            if let Some(index) = changed {
                                events
                                    .emit(CoreEvent::Player(PlayerEvent::LyricLineChanged {
                                        index,
                                    }))
                                    .ok();
                            }
                        }
                        Ok(_) => {}
                        Err(RecvError::Lagged(missed)) => {
                            debug!(missed = missed, "Lyric feed lagged behind event bus");
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            }
        });
    }
}
