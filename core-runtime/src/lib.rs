//! Shared runtime infrastructure for the player core: typed event bus,
//! logging bootstrap, and the fail-fast configuration builder.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{CoreConfig, CoreConfigBuilder};
pub use error::{Error, Result};
pub use events::{CoreEvent, EventBus, PlayerEvent, SyncEvent};
pub use logging::{init_logging, LogFormat, LoggingConfig};
