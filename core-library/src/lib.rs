//! Domain models and local persistence for the player core.
//!
//! Collections (favorites, playlists) and the player snapshot are plain
//! serde-serializable values; [`store::LibraryStore`] persists them through
//! the host's [`bridge_traits::SettingsStore`] on every mutation.

pub mod error;
pub mod models;
pub mod store;

pub use error::{LibraryError, Result};
pub use models::{
    Favorites, PlayMode, PlayedTrack, PlayerSnapshot, Playlist, PlaylistSet, PlaylistUpdate,
    Track, TrackKey,
};
pub use store::LibraryStore;
