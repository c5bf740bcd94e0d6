//! # Sync Engine
//!
//! Optimistic local-first synchronization for favorites and playlists.
//!
//! Every mutation follows the same protocol:
//! 1. Snapshot the pre-mutation collection (a typed undo value).
//! 2. Apply the mutation locally, under the lock, immediately visible.
//! 3. Persist the optimistic state.
//! 4. With a session present, mark the global status `Syncing` and issue
//!    the remote request in a background task, wrapped in a client-side
//!    timeout so a hung transport can never leave `Syncing` dangling.
//! 5. On success, adopt the backend's version (never going backwards) and
//!    transition `Success` → `Idle`.
//! 6. On failure, restore the snapshot wholesale and transition to
//!    `Error`. Rollback coverage is uniform across every mutation kind.
//!
//! Callers never see an `Err` from a mutation entry point: the optimistic
//! result is returned immediately and failures surface only through the
//! status flag and `SyncEvent`s.
//!
//! Overlapping mutations are not serialized by default; each continuation
//! commits or rolls back against whatever the local state is at response
//! time. `SyncEngineConfig::serialize_writes` opts into a per-collection
//! single-flight permit for hosts that want stronger ordering.

use crate::remote::CollectionsRemote;
use crate::status::{StatusHandle, SyncState};
use crate::SyncError;
use core_library::{
    Favorites, LibraryStore, PlayedTrack, Playlist, PlaylistSet, PlaylistUpdate, Track, TrackKey,
};
use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct SyncEngineConfig {
    /// Client-side timeout applied to every remote request
    pub request_timeout: Duration,
    /// Delay before a Success status resets to Idle
    pub status_reset_delay: Duration,
    /// Hold a per-collection permit across remote writes
    pub serialize_writes: bool,
}

impl Default for SyncEngineConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            status_reset_delay: Duration::from_secs(2),
            serialize_writes: false,
        }
    }
}

/// Owns the synchronized collections and the optimistic-apply/rollback
/// protocol against the remote store.
pub struct SyncEngine {
    favorites: Arc<Mutex<Favorites>>,
    playlists: Arc<Mutex<PlaylistSet>>,
    status: StatusHandle,
    remote: Arc<dyn CollectionsRemote>,
    store: Arc<LibraryStore>,
    session: Mutex<Option<String>>,
    events: EventBus,
    config: SyncEngineConfig,
    favorites_flight: Arc<tokio::sync::Mutex<()>>,
    playlists_flight: Arc<tokio::sync::Mutex<()>>,
}

impl SyncEngine {
    pub fn new(
        remote: Arc<dyn CollectionsRemote>,
        store: Arc<LibraryStore>,
        events: EventBus,
        config: SyncEngineConfig,
    ) -> Self {
        Self {
            favorites: Arc::new(Mutex::new(Favorites::default())),
            playlists: Arc::new(Mutex::new(PlaylistSet::default())),
            status: StatusHandle::new(events.clone(), config.status_reset_delay),
            remote,
            store,
            session: Mutex::new(None),
            events,
            config,
            favorites_flight: Arc::new(tokio::sync::Mutex::new(())),
            playlists_flight: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    /// Load persisted collections (call once at startup).
    pub async fn restore(&self) {
        let favorites = self.store.load_favorites().await;
        let playlists = self.store.load_playlists().await;
        *self.favorites.lock().expect("favorites lock") = favorites;
        *self.playlists.lock().expect("playlists lock") = playlists;
    }

    // ------------------------------------------------------------------
    // Session
    // ------------------------------------------------------------------

    /// Install or clear the bearer token. Clearing keeps local collections;
    /// sign-out never destroys local data.
    pub fn set_session(&self, token: Option<String>) {
        *self.session.lock().expect("session lock") = token;
    }

    pub fn has_session(&self) -> bool {
        self.session.lock().expect("session lock").is_some()
    }

    fn session_token(&self) -> Option<String> {
        self.session.lock().expect("session lock").clone()
    }

    // ------------------------------------------------------------------
    // Read state
    // ------------------------------------------------------------------

    pub fn favorites(&self) -> Favorites {
        self.favorites.lock().expect("favorites lock").clone()
    }

    pub fn playlists(&self) -> PlaylistSet {
        self.playlists.lock().expect("playlists lock").clone()
    }

    pub fn is_favorite(&self, key: &TrackKey) -> bool {
        self.favorites.lock().expect("favorites lock").contains(key)
    }

    pub fn status(&self) -> SyncState {
        self.status.current()
    }

    // ------------------------------------------------------------------
    // Favorites mutations
    // ------------------------------------------------------------------

    /// Add if absent, remove if present. Returns whether the track is now a
    /// favorite.
    pub async fn toggle_favorite(&self, track: Track) -> bool {
        let key = track.key();
        let exists = self.is_favorite(&key);
        if exists {
            self.remove_favorite(key).await;
            false
        } else {
            self.add_favorite(track).await;
            true
        }
    }

    #[instrument(skip(self, track), fields(key = %track.key()))]
    pub async fn add_favorite(&self, track: Track) {
        let (snapshot, optimistic, changed) = {
            let mut guard = self.favorites.lock().expect("favorites lock");
            let snapshot = guard.clone();
            let changed = guard.add(track.clone());
            (snapshot, guard.clone(), changed)
        };
        if !changed {
            debug!("Track already in favorites");
            return;
        }
        self.persist_favorites(&optimistic).await;

        let Some(token) = self.session_token() else {
            return;
        };
        let generation = self.status.begin();
        let remote = Arc::clone(&self.remote);
        self.spawn_favorites_commit(generation, snapshot, async move {
            remote.add_favorite(&token, &track).await
        });
    }

    #[instrument(skip(self), fields(key = %key))]
    pub async fn remove_favorite(&self, key: TrackKey) {
        let (snapshot, optimistic, changed) = {
            let mut guard = self.favorites.lock().expect("favorites lock");
            let snapshot = guard.clone();
            let changed = guard.remove(&key);
            (snapshot, guard.clone(), changed)
        };
        if !changed {
            debug!("Track not in favorites");
            return;
        }
        self.persist_favorites(&optimistic).await;

        let Some(token) = self.session_token() else {
            return;
        };
        let generation = self.status.begin();
        let remote = Arc::clone(&self.remote);
        self.spawn_favorites_commit(generation, snapshot, async move {
            remote.remove_favorite(&token, &key).await
        });
    }

    // ------------------------------------------------------------------
    // Playlist mutations
    // ------------------------------------------------------------------

    /// Prepend a new playlist.
    #[instrument(skip(self, playlist), fields(id = %playlist.id))]
    pub async fn add_playlist(&self, playlist: Playlist) {
        let (snapshot, optimistic) = {
            let mut guard = self.playlists.lock().expect("playlists lock");
            let snapshot = guard.clone();
            guard.prepend(playlist.clone());
            (snapshot, guard.clone())
        };
        self.persist_playlists(&optimistic).await;

        let Some(token) = self.session_token() else {
            return;
        };
        let generation = self.status.begin();
        let remote = Arc::clone(&self.remote);
        self.spawn_playlists_commit(generation, snapshot, async move {
            remote.create_playlist(&token, &playlist).await
        });
    }

    /// Field-level patch (rename, replace tracks). Unknown ids are silently
    /// ignored.
    #[instrument(skip(self, update), fields(id = id))]
    pub async fn update_playlist(&self, id: &str, update: PlaylistUpdate) {
        let (snapshot, optimistic, found) = {
            let mut guard = self.playlists.lock().expect("playlists lock");
            let snapshot = guard.clone();
            let found = match guard.find_mut(id) {
                Some(playlist) => {
                    update.apply_to(playlist);
                    true
                }
                None => false,
            };
            (snapshot, guard.clone(), found)
        };
        if !found {
            debug!("Playlist not found");
            return;
        }
        self.persist_playlists(&optimistic).await;

        let Some(token) = self.session_token() else {
            return;
        };
        let generation = self.status.begin();
        let remote = Arc::clone(&self.remote);
        let id = id.to_string();
        self.spawn_playlists_commit(generation, snapshot, async move {
            remote.update_playlist(&token, &id, &update).await
        });
    }

    #[instrument(skip(self), fields(id = id))]
    pub async fn delete_playlist(&self, id: &str) {
        let (snapshot, optimistic, removed) = {
            let mut guard = self.playlists.lock().expect("playlists lock");
            let snapshot = guard.clone();
            let removed = guard.remove(id).is_some();
            (snapshot, guard.clone(), removed)
        };
        if !removed {
            debug!("Playlist not found");
            return;
        }
        self.persist_playlists(&optimistic).await;

        let Some(token) = self.session_token() else {
            return;
        };
        let generation = self.status.begin();
        let remote = Arc::clone(&self.remote);
        let id = id.to_string();
        self.spawn_playlists_commit(generation, snapshot, async move {
            remote.delete_playlist(&token, &id).await
        });
    }

    /// Toggle a track's membership in a playlist, pushing the playlist's
    /// full track list to the backend. Returns whether the track is now in
    /// the playlist, or `None` when the playlist does not exist.
    #[instrument(skip(self, track), fields(playlist = playlist_id, key = %track.key()))]
    pub async fn toggle_track_in_playlist(
        &self,
        playlist_id: &str,
        track: Track,
    ) -> Option<bool> {
        let (snapshot, optimistic, update, now_in) = {
            let mut guard = self.playlists.lock().expect("playlists lock");
            let snapshot = guard.clone();
            let playlist = guard.find_mut(playlist_id)?;
            let now_in = playlist.toggle(track);
            let update = PlaylistUpdate {
                name: None,
                tracks: Some(playlist.tracks.clone()),
            };
            (snapshot, guard.clone(), update, now_in)
        };
        self.persist_playlists(&optimistic).await;

        let Some(token) = self.session_token() else {
            return Some(now_in);
        };
        let generation = self.status.begin();
        let remote = Arc::clone(&self.remote);
        let id = playlist_id.to_string();
        self.spawn_playlists_commit(generation, snapshot, async move {
            remote.update_playlist(&token, &id, &update).await
        });
        Some(now_in)
    }

    // ------------------------------------------------------------------
    // Bulk reconciliation
    // ------------------------------------------------------------------

    /// Cloud-wins: fetch both collections concurrently and overwrite local
    /// state wholesale, regardless of versions. Manual operation only;
    /// idempotent.
    #[instrument(skip(self))]
    pub async fn pull_from_remote(&self) {
        let Some(token) = self.session_token() else {
            warn!("Pull requested without a session");
            return;
        };
        let generation = self.status.begin();

        let fetched = tokio::time::timeout(self.config.request_timeout, async {
            tokio::join!(
                self.remote.fetch_favorites(&token),
                self.remote.fetch_playlists(&token)
            )
        })
        .await;

        match fetched {
            Ok((Ok(favorites), Ok(playlists))) => {
                let (favorites_len, playlists_len) = (favorites.songs.len(), playlists.playlists.len());
                *self.favorites.lock().expect("favorites lock") = favorites.clone();
                *self.playlists.lock().expect("playlists lock") = playlists.clone();
                self.persist_favorites(&favorites).await;
                self.persist_playlists(&playlists).await;
                self.status.succeed(generation);
                self.events
                    .emit(CoreEvent::Sync(SyncEvent::Pulled {
                        favorites: favorites_len,
                        playlists: playlists_len,
                    }))
                    .ok();
            }
            Ok((favorites_result, playlists_result)) => {
                let message = favorites_result
                    .err()
                    .or(playlists_result.err())
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "Failed to load cloud data".to_string());
                self.status.fail(generation, message);
            }
            Err(_) => {
                self.status.fail(
                    generation,
                    SyncError::Timeout(self.config.request_timeout.as_secs()).to_string(),
                );
            }
        }
    }

    /// Local-wins: PUT both collections wholesale, overwriting the remote
    /// regardless of its version, then adopt the versions the backend
    /// assigned (guarded monotonic). Manual operation only; idempotent.
    #[instrument(skip(self))]
    pub async fn push_to_remote(&self) {
        let Some(token) = self.session_token() else {
            warn!("Push requested without a session");
            return;
        };
        let generation = self.status.begin();

        let (songs, playlists) = (
            self.favorites.lock().expect("favorites lock").songs.clone(),
            self.playlists
                .lock()
                .expect("playlists lock")
                .playlists
                .clone(),
        );

        let pushed = tokio::time::timeout(self.config.request_timeout, async {
            tokio::join!(
                self.remote.replace_favorites(&token, &songs),
                self.remote.replace_playlists(&token, &playlists)
            )
        })
        .await;

        match pushed {
            Ok((Ok(remote_favorites), Ok(remote_playlists))) => {
                let (favorites_version, playlists_version) = {
                    let mut favorites = self.favorites.lock().expect("favorites lock");
                    favorites
                        .commit_version(remote_favorites.version, remote_favorites.updated_at);
                    let mut playlists = self.playlists.lock().expect("playlists lock");
                    playlists
                        .commit_version(remote_playlists.version, remote_playlists.updated_at);
                    (favorites.version, playlists.version)
                };
                let (favorites, playlists) = (self.favorites(), self.playlists());
                self.persist_favorites(&favorites).await;
                self.persist_playlists(&playlists).await;
                self.status.succeed(generation);
                self.events
                    .emit(CoreEvent::Sync(SyncEvent::Pushed {
                        favorites_version,
                        playlists_version,
                    }))
                    .ok();
            }
            Ok((favorites_result, playlists_result)) => {
                let message = favorites_result
                    .err()
                    .or(playlists_result.err())
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "Failed to upload to cloud".to_string());
                self.status.fail(generation, message);
            }
            Err(_) => {
                self.status.fail(
                    generation,
                    SyncError::Timeout(self.config.request_timeout.as_secs()).to_string(),
                );
            }
        }
    }

    // ------------------------------------------------------------------
    // History
    // ------------------------------------------------------------------

    /// Fire-and-forget history entry. Failures log a warning and never
    /// touch the global sync status.
    pub fn record_played(&self, track: Track) {
        let Some(token) = self.session_token() else {
            return;
        };
        let remote = Arc::clone(&self.remote);
        let timeout = self.config.request_timeout;
        tokio::spawn(async move {
            match tokio::time::timeout(timeout, remote.record_played(&token, &track)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "Failed to record play history"),
                Err(_) => warn!("Timed out recording play history"),
            }
        });
    }

    pub async fn history(&self) -> crate::Result<Vec<PlayedTrack>> {
        let token = self.session_token().ok_or(SyncError::NoSession)?;
        tokio::time::timeout(
            self.config.request_timeout,
            self.remote.fetch_history(&token),
        )
        .await
        .map_err(|_| SyncError::Timeout(self.config.request_timeout.as_secs()))?
    }

    pub async fn clear_history(&self) -> crate::Result<()> {
        let token = self.session_token().ok_or(SyncError::NoSession)?;
        tokio::time::timeout(
            self.config.request_timeout,
            self.remote.clear_history(&token),
        )
        .await
        .map_err(|_| SyncError::Timeout(self.config.request_timeout.as_secs()))?
    }

    // ------------------------------------------------------------------
    // Commit/rollback continuations
    // ------------------------------------------------------------------

    fn spawn_favorites_commit<F>(&self, generation: u64, snapshot: Favorites, op: F)
    where
        F: Future<Output = crate::Result<Favorites>> + Send + 'static,
    {
        let favorites = Arc::clone(&self.favorites);
        let store = Arc::clone(&self.store);
        let status = self.status.clone();
        let events = self.events.clone();
        let timeout = self.config.request_timeout;
        let flight = self
            .config
            .serialize_writes
            .then(|| Arc::clone(&self.favorites_flight));

        tokio::spawn(async move {
            let _permit = match &flight {
                Some(flight) => Some(flight.lock().await),
                None => None,
            };

            let outcome = match tokio::time::timeout(timeout, op).await {
                Ok(Ok(remote_state)) => Ok(remote_state),
                Ok(Err(e)) => Err(e.to_string()),
                Err(_) => Err(SyncError::Timeout(timeout.as_secs()).to_string()),
            };

            match outcome {
                Ok(remote_state) => {
                    let committed = {
                        let mut guard = favorites.lock().expect("favorites lock");
                        guard.commit_version(remote_state.version, remote_state.updated_at);
                        guard.clone()
                    };
                    if let Err(e) = store.save_favorites(&committed).await {
                        warn!(error = %e, "Failed to persist favorites after commit");
                    }
                    status.succeed(generation);
                    events
                        .emit(CoreEvent::Sync(SyncEvent::Committed {
                            collection: "favorites".to_string(),
                            version: committed.version,
                        }))
                        .ok();
                }
                Err(message) => {
                    // True rollback: state-replace with the pre-mutation
                    // snapshot, applied to whatever is local right now.
                    let restored = {
                        let mut guard = favorites.lock().expect("favorites lock");
                        *guard = snapshot;
                        guard.clone()
                    };
                    if let Err(e) = store.save_favorites(&restored).await {
                        warn!(error = %e, "Failed to persist favorites after rollback");
                    }
                    status.fail(generation, message.clone());
                    events
                        .emit(CoreEvent::Sync(SyncEvent::RolledBack {
                            collection: "favorites".to_string(),
                            message,
                        }))
                        .ok();
                }
            }
        });
    }

    fn spawn_playlists_commit<F>(&self, generation: u64, snapshot: PlaylistSet, op: F)
    where
        F: Future<Output = crate::Result<PlaylistSet>> + Send + 'static,
    {
        let playlists = Arc::clone(&self.playlists);
        let store = Arc::clone(&self.store);
        let status = self.status.clone();
        let events = self.events.clone();
        let timeout = self.config.request_timeout;
        let flight = self
            .config
            .serialize_writes
            .then(|| Arc::clone(&self.playlists_flight));

        tokio::spawn(async move {
            let _permit = match &flight {
                Some(flight) => Some(flight.lock().await),
                None => None,
            };

            let outcome = match tokio::time::timeout(timeout, op).await {
                Ok(Ok(remote_state)) => Ok(remote_state),
                Ok(Err(e)) => Err(e.to_string()),
                Err(_) => Err(SyncError::Timeout(timeout.as_secs()).to_string()),
            };

            match outcome {
                Ok(remote_state) => {
                    let committed = {
                        let mut guard = playlists.lock().expect("playlists lock");
                        guard.commit_version(remote_state.version, remote_state.updated_at);
                        guard.clone()
                    };
                    if let Err(e) = store.save_playlists(&committed).await {
                        warn!(error = %e, "Failed to persist playlists after commit");
                    }
                    status.succeed(generation);
                    events
                        .emit(CoreEvent::Sync(SyncEvent::Committed {
                            collection: "playlists".to_string(),
                            version: committed.version,
                        }))
                        .ok();
                }
                Err(message) => {
                    let restored = {
                        let mut guard = playlists.lock().expect("playlists lock");
                        *guard = snapshot;
                        guard.clone()
                    };
                    if let Err(e) = store.save_playlists(&restored).await {
                        warn!(error = %e, "Failed to persist playlists after rollback");
                    }
                    status.fail(generation, message.clone());
                    events
                        .emit(CoreEvent::Sync(SyncEvent::RolledBack {
                            collection: "playlists".to_string(),
                            message,
                        }))
                        .ok();
                }
            }
        });
    }

    async fn persist_favorites(&self, favorites: &Favorites) {
        if let Err(e) = self.store.save_favorites(favorites).await {
            warn!(error = %e, "Failed to persist favorites");
        }
    }

    async fn persist_playlists(&self, playlists: &PlaylistSet) {
        if let Err(e) = self.store.save_playlists(playlists).await {
            warn!(error = %e, "Failed to persist playlists");
        }
    }
}
