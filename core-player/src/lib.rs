//! # Player Module
//!
//! The playback side of the core: queue/mode state machine, the smoothed
//! playback clock, and lyric synchronization.
//!
//! ## Components
//!
//! - **Queue Controller** (`queue`): queue contents, current index, play
//!   mode, and the end-of-track policy
//! - **Playback Clock** (`clock`): samples the host position feed and
//!   publishes a low-jitter progress/duration stream
//! - **Lyric Synchronizer** (`lyrics`): LRC parsing and active-line tracking

pub mod clock;
pub mod error;
pub mod lyrics;
pub mod queue;

pub use clock::{PlaybackClock, PlaybackClockConfig, PlaybackState};
pub use error::{PlayerError, Result};
pub use lyrics::{parse_lrc, LyricLine, LyricSynchronizer};
pub use queue::{QueueController, TrackEnd};
