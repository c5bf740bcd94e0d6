//! Local persistence for collections and player state.
//!
//! Every mutation persists its collection so a crash never loses more than
//! the in-flight remote confirmation. Corrupt or absent stored JSON loads as
//! the empty default, never as an error.

use crate::error::Result;
use crate::models::{Favorites, PlayerSnapshot, PlaylistSet};
use bridge_traits::SettingsStore;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

const KEY_FAVORITES: &str = "library.favorites";
const KEY_PLAYLISTS: &str = "library.playlists";
const KEY_PLAYER: &str = "player.snapshot";
const KEY_SAVED_PROGRESS: &str = "player.saved_progress";

/// Snapshot persistence over a [`SettingsStore`].
pub struct LibraryStore {
    settings: Arc<dyn SettingsStore>,
}

impl LibraryStore {
    pub fn new(settings: Arc<dyn SettingsStore>) -> Self {
        Self { settings }
    }

    async fn load_json<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        match self.settings.get_string(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => value,
                Err(e) => {
                    warn!(key = key, error = %e, "Corrupt stored snapshot, using default");
                    T::default()
                }
            },
            Ok(None) => T::default(),
            Err(e) => {
                warn!(key = key, error = %e, "Failed to read stored snapshot, using default");
                T::default()
            }
        }
    }

    async fn save_json<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.settings.set_string(key, &raw).await?;
        Ok(())
    }

    /// Load persisted favorites, defaulting to empty.
    pub async fn load_favorites(&self) -> Favorites {
        self.load_json(KEY_FAVORITES).await
    }

    pub async fn save_favorites(&self, favorites: &Favorites) -> Result<()> {
        self.save_json(KEY_FAVORITES, favorites).await
    }

    /// Load persisted playlists, defaulting to empty.
    pub async fn load_playlists(&self) -> PlaylistSet {
        self.load_json(KEY_PLAYLISTS).await
    }

    pub async fn save_playlists(&self, playlists: &PlaylistSet) -> Result<()> {
        self.save_json(KEY_PLAYLISTS, playlists).await
    }

    /// Load the persisted player snapshot (queue, index, volume, mode).
    pub async fn load_player(&self) -> PlayerSnapshot {
        self.load_json(KEY_PLAYER).await
    }

    pub async fn save_player(&self, snapshot: &PlayerSnapshot) -> Result<()> {
        self.save_json(KEY_PLAYER, snapshot).await
    }

    /// Saved playback position in whole seconds, for resume-on-restart.
    pub async fn load_saved_progress(&self) -> u64 {
        match self.settings.get_i64(KEY_SAVED_PROGRESS).await {
            Ok(Some(secs)) if secs > 0 => secs as u64,
            Ok(_) => 0,
            Err(e) => {
                warn!(error = %e, "Failed to read saved progress");
                0
            }
        }
    }

    pub async fn save_progress(&self, secs: u64) -> Result<()> {
        self.settings.set_i64(KEY_SAVED_PROGRESS, secs as i64).await?;
        Ok(())
    }
}
