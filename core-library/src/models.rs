//! Domain models for the player core.
//!
//! Serde attribute names match the backend wire format (`name`, `songs`,
//! `updatedAt`, ...) so collection snapshots round-trip through the remote
//! key-value store and local persistence unchanged.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// Track
// =============================================================================

/// Composite track identity: provider platform plus provider-local id.
///
/// Equality and hashing are always over this pair, never over title/artist.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackKey {
    pub platform: String,
    pub id: String,
}

impl TrackKey {
    pub fn new(platform: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for TrackKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.platform, self.id)
    }
}

/// A playable audio item from an external provider.
///
/// Immutable once fetched; collections store copies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub platform: String,
    /// Display title (wire name `name`)
    #[serde(rename = "name")]
    pub title: String,
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub album: String,
    /// Stream URL, when the provider returned one directly
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Cover image URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pic: Option<String>,
    /// Lyrics source URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lrc: Option<String>,
}

impl Track {
    pub fn key(&self) -> TrackKey {
        TrackKey::new(self.platform.clone(), self.id.clone())
    }

    /// Identity comparison by `(platform, id)`.
    pub fn is_same(&self, other: &TrackKey) -> bool {
        self.platform == other.platform && self.id == other.id
    }
}

/// A history entry: a track plus the moment it was played.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayedTrack {
    #[serde(flatten)]
    pub track: Track,
    #[serde(rename = "playedAt")]
    pub played_at: i64,
}

// =============================================================================
// Play mode
// =============================================================================

/// Policy governing `next()`/`prev()` traversal order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayMode {
    /// Sequential, wrapping at the ends
    List,
    /// Uniform random jumps
    Shuffle,
    /// Repeat the current track on natural end
    Single,
}

impl PlayMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayMode::List => "list",
            PlayMode::Shuffle => "shuffle",
            PlayMode::Single => "single",
        }
    }

    /// Cycle order used by the mode toggle button: list → shuffle → single.
    pub fn next_mode(&self) -> Self {
        match self {
            PlayMode::List => PlayMode::Shuffle,
            PlayMode::Shuffle => PlayMode::Single,
            PlayMode::Single => PlayMode::List,
        }
    }
}

impl Default for PlayMode {
    fn default() -> Self {
        PlayMode::List
    }
}

impl FromStr for PlayMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "list" => Ok(PlayMode::List),
            "shuffle" => Ok(PlayMode::Shuffle),
            "single" => Ok(PlayMode::Single),
            other => Err(format!("Unknown play mode: {}", other)),
        }
    }
}

impl fmt::Display for PlayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Collections
// =============================================================================

/// The favorites collection: a duplicate-free, ordered set of tracks with a
/// version counter bumped on every committed remote write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Favorites {
    #[serde(default)]
    pub songs: Vec<Track>,
    #[serde(default)]
    pub version: u64,
    #[serde(rename = "updatedAt", default)]
    pub updated_at: i64,
}

impl Favorites {
    pub fn contains(&self, key: &TrackKey) -> bool {
        self.songs.iter().any(|t| t.is_same(key))
    }

    /// Append the track unless its key is already present.
    /// Returns `true` when the collection changed.
    pub fn add(&mut self, track: Track) -> bool {
        if self.contains(&track.key()) {
            return false;
        }
        self.songs.push(track);
        true
    }

    /// Remove by key. Returns `true` when the collection changed.
    pub fn remove(&mut self, key: &TrackKey) -> bool {
        let before = self.songs.len();
        self.songs.retain(|t| !t.is_same(key));
        self.songs.len() != before
    }

    /// Adopt a committed remote version without ever going backwards.
    pub fn commit_version(&mut self, version: u64, updated_at: i64) {
        self.version = self.version.max(version);
        self.updated_at = self.updated_at.max(updated_at);
    }
}

/// A named, ordered list of tracks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    /// Wire name `songs`
    #[serde(rename = "songs", default)]
    pub tracks: Vec<Track>,
}

impl Playlist {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            tracks: Vec::new(),
        }
    }

    pub fn contains(&self, key: &TrackKey) -> bool {
        self.tracks.iter().any(|t| t.is_same(key))
    }

    /// Add the track if absent, remove it if present.
    /// Returns `true` when the track is now in the playlist.
    pub fn toggle(&mut self, track: Track) -> bool {
        let key = track.key();
        if self.contains(&key) {
            self.tracks.retain(|t| !t.is_same(&key));
            false
        } else {
            self.tracks.push(track);
            true
        }
    }
}

/// Field-level playlist patch sent to the backend's single-update mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PlaylistUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "songs", skip_serializing_if = "Option::is_none")]
    pub tracks: Option<Vec<Track>>,
}

impl PlaylistUpdate {
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            tracks: None,
        }
    }

    /// Apply the patch to a playlist in place.
    pub fn apply_to(&self, playlist: &mut Playlist) {
        if let Some(name) = &self.name {
            playlist.name = name.clone();
        }
        if let Some(tracks) = &self.tracks {
            playlist.tracks = tracks.clone();
        }
    }
}

/// All user playlists, versioned as one object (the backend stores the whole
/// list under a single key).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PlaylistSet {
    #[serde(default)]
    pub playlists: Vec<Playlist>,
    #[serde(default)]
    pub version: u64,
    #[serde(rename = "updatedAt", default)]
    pub updated_at: i64,
}

impl PlaylistSet {
    pub fn find(&self, id: &str) -> Option<&Playlist> {
        self.playlists.iter().find(|p| p.id == id)
    }

    pub fn find_mut(&mut self, id: &str) -> Option<&mut Playlist> {
        self.playlists.iter_mut().find(|p| p.id == id)
    }

    /// New playlists go to the front, matching the backend's POST behavior.
    pub fn prepend(&mut self, playlist: Playlist) {
        self.playlists.insert(0, playlist);
    }

    /// Remove by id. Returns the removed playlist when one matched.
    pub fn remove(&mut self, id: &str) -> Option<Playlist> {
        let idx = self.playlists.iter().position(|p| p.id == id)?;
        Some(self.playlists.remove(idx))
    }

    /// Adopt a committed remote version without ever going backwards.
    pub fn commit_version(&mut self, version: u64, updated_at: i64) {
        self.version = self.version.max(version);
        self.updated_at = self.updated_at.max(updated_at);
    }
}

// =============================================================================
// Persisted player snapshot
// =============================================================================

/// The subset of player state that survives restarts: queue contents, the
/// current position within it, volume, and play mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PlayerSnapshot {
    #[serde(default)]
    pub queue: Vec<Track>,
    /// Index into `queue`; `None` when the queue is empty
    #[serde(default)]
    pub queue_index: Option<usize>,
    #[serde(default = "default_volume")]
    pub volume: f32,
    #[serde(default)]
    pub play_mode: PlayMode,
}

fn default_volume() -> f32 {
    0.8
}
