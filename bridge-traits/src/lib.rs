//! Platform bridge traits for the player core.
//!
//! The core never talks to the network, disk, or scheduler directly; host
//! applications provide implementations of these traits (see
//! `bridge-desktop` for the tokio/reqwest/SQLite set) and tests provide
//! scripted ones.

pub mod error;
pub mod http;
pub mod storage;
pub mod time;

pub use error::{BridgeError, Result};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use storage::SettingsStore;
pub use time::{Clock, PositionSource, SystemClock, TickSource};
