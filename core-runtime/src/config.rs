//! # Core Configuration Module
//!
//! Builder-pattern configuration for the player core. The builder enforces
//! fail-fast validation: every bridge the core cannot run without must be
//! provided before `build()` succeeds, with actionable error messages naming
//! the desktop implementation that satisfies each capability.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .api_base_url("https://music.example.com/api/user")
//!     .http_client(Arc::new(ReqwestHttpClient::new()))
//!     .settings_store(Arc::new(store))
//!     .tick_source(Arc::new(TokioTicker::default()))
//!     .position_source(Arc::new(audio_position_feed))
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::{Clock, HttpClient, PositionSource, SettingsStore, SystemClock, TickSource};
use std::sync::Arc;
use std::time::Duration;

/// Core configuration for the player core.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Base URL of the user-data backend (favorites/playlists/history)
    pub api_base_url: String,

    /// HTTP client for backend requests (required)
    pub http_client: Arc<dyn HttpClient>,

    /// Local key-value persistence (required)
    pub settings_store: Arc<dyn SettingsStore>,

    /// Sampling cadence for the playback clock (required)
    pub tick_source: Arc<dyn TickSource>,

    /// External playback-position feed (required)
    pub position_source: Arc<dyn PositionSource>,

    /// Wall clock (defaults to the system clock)
    pub clock: Arc<dyn Clock>,

    /// Event bus buffer capacity
    pub event_capacity: usize,

    /// Client-side timeout applied to every sync request
    pub sync_timeout: Duration,

    /// Delay before a Success status resets to Idle
    pub status_reset_delay: Duration,

    /// Serialize remote writes per collection (single-flight hardening)
    pub serialize_writes: bool,

    /// How often the playback position is persisted while playing
    pub progress_save_interval: Duration,

    /// Minimum position delta before progress is republished
    pub progress_publish_threshold: f64,
}

impl CoreConfig {
    /// Start building a configuration.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("api_base_url", &self.api_base_url)
            .field("event_capacity", &self.event_capacity)
            .field("sync_timeout", &self.sync_timeout)
            .field("status_reset_delay", &self.status_reset_delay)
            .field("serialize_writes", &self.serialize_writes)
            .field("progress_save_interval", &self.progress_save_interval)
            .field("progress_publish_threshold", &self.progress_publish_threshold)
            .finish_non_exhaustive()
    }
}

/// Builder for [`CoreConfig`]
#[derive(Default)]
pub struct CoreConfigBuilder {
    api_base_url: Option<String>,
    http_client: Option<Arc<dyn HttpClient>>,
    settings_store: Option<Arc<dyn SettingsStore>>,
    tick_source: Option<Arc<dyn TickSource>>,
    position_source: Option<Arc<dyn PositionSource>>,
    clock: Option<Arc<dyn Clock>>,
    event_capacity: Option<usize>,
    sync_timeout: Option<Duration>,
    status_reset_delay: Option<Duration>,
    serialize_writes: Option<bool>,
    progress_save_interval: Option<Duration>,
    progress_publish_threshold: Option<f64>,
}

impl CoreConfigBuilder {
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into());
        self
    }

    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn settings_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.settings_store = Some(store);
        self
    }

    pub fn tick_source(mut self, source: Arc<dyn TickSource>) -> Self {
        self.tick_source = Some(source);
        self
    }

    pub fn position_source(mut self, source: Arc<dyn PositionSource>) -> Self {
        self.position_source = Some(source);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = Some(capacity);
        self
    }

    pub fn sync_timeout(mut self, timeout: Duration) -> Self {
        self.sync_timeout = Some(timeout);
        self
    }

    pub fn status_reset_delay(mut self, delay: Duration) -> Self {
        self.status_reset_delay = Some(delay);
        self
    }

    pub fn serialize_writes(mut self, serialize: bool) -> Self {
        self.serialize_writes = Some(serialize);
        self
    }

    pub fn progress_save_interval(mut self, interval: Duration) -> Self {
        self.progress_save_interval = Some(interval);
        self
    }

    pub fn progress_publish_threshold(mut self, threshold: f64) -> Self {
        self.progress_publish_threshold = Some(threshold);
        self
    }

    /// Validate and build the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CapabilityMissing`] naming the first missing required
    /// bridge and a hint about the desktop implementation that provides it.
    pub fn build(self) -> Result<CoreConfig> {
        let http_client = self.http_client.ok_or_else(|| Error::CapabilityMissing {
            capability: "HttpClient".to_string(),
            message: "provide one via http_client() (bridge-desktop: ReqwestHttpClient)"
                .to_string(),
        })?;

        let settings_store = self.settings_store.ok_or_else(|| Error::CapabilityMissing {
            capability: "SettingsStore".to_string(),
            message: "provide one via settings_store() (bridge-desktop: SqliteSettingsStore)"
                .to_string(),
        })?;

        let tick_source = self.tick_source.ok_or_else(|| Error::CapabilityMissing {
            capability: "TickSource".to_string(),
            message: "provide one via tick_source() (bridge-desktop: TokioTicker)".to_string(),
        })?;

        let position_source = self.position_source.ok_or_else(|| Error::CapabilityMissing {
            capability: "PositionSource".to_string(),
            message: "provide the host audio engine's position feed via position_source()"
                .to_string(),
        })?;

        let event_capacity = self.event_capacity.unwrap_or(100);
        if event_capacity == 0 {
            return Err(Error::Config(
                "event_capacity must be greater than zero".to_string(),
            ));
        }

        let progress_publish_threshold = self.progress_publish_threshold.unwrap_or(0.05);
        if !(progress_publish_threshold > 0.0) {
            return Err(Error::Config(
                "progress_publish_threshold must be positive".to_string(),
            ));
        }

        Ok(CoreConfig {
            api_base_url: self
                .api_base_url
                .unwrap_or_else(|| "/api/user".to_string()),
            http_client,
            settings_store,
            tick_source,
            position_source,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            event_capacity,
            sync_timeout: self.sync_timeout.unwrap_or(Duration::from_secs(30)),
            status_reset_delay: self.status_reset_delay.unwrap_or(Duration::from_secs(2)),
            serialize_writes: self.serialize_writes.unwrap_or(false),
            progress_save_interval: self
                .progress_save_interval
                .unwrap_or(Duration::from_secs(5)),
            progress_publish_threshold,
        })
    }
}
