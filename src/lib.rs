//! Workspace façade crate.
//!
//! Host applications can depend on `aria-core` and reach the full playback
//! and sync surface through [`core_service`] without wiring each workspace
//! crate individually.

pub use core_service::{
    AppState, CoreConfig, CoreError, CoreEvent, Favorites, PlayMode, PlaybackState, PlayedTrack,
    PlayerEvent, Playlist, PlaylistSet, SyncEvent, SyncState, Track, TrackKey, FAVORITES_ID,
};
