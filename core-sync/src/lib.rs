//! # Sync Module
//!
//! Optimistic local-first synchronization of favorites and playlists with a
//! remote key-value backend.
//!
//! ## Components
//!
//! - **Status Machine** (`status`): the single global Idle/Syncing/Success/
//!   Error flag with generation-guarded transitions
//! - **Remote Store** (`remote`): trait + HTTP adapter for the backend's
//!   favorites/playlists/history resources
//! - **Sync Engine** (`engine`): snapshot → optimistic apply → commit or
//!   rollback, plus cloud-wins pull and local-wins push

pub mod engine;
pub mod error;
pub mod remote;
pub mod status;

pub use engine::{SyncEngine, SyncEngineConfig};
pub use error::{Result, SyncError};
pub use remote::{CollectionsRemote, HttpCollectionsRemote};
pub use status::{StatusHandle, SyncState};
