//! Desktop bridge implementations.
//!
//! Provides the tokio/reqwest/SQLite implementations of the traits in
//! `bridge-traits` for desktop hosts.

pub mod http;
pub mod settings;
pub mod time;

pub use http::ReqwestHttpClient;
pub use settings::SqliteSettingsStore;
pub use time::TokioTicker;
