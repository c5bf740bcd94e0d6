//! Time and Sampling Abstractions
//!
//! Injectable wall clock, sampling cadence, and playback-position feed.
//! All three exist so the playback clock and sync engine can be driven
//! deterministically in tests and adapted to host scheduling constraints.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Time source trait
///
/// Abstracts system time to enable deterministic testing.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::time::Clock;
///
/// fn stamp(clock: &dyn Clock) -> i64 {
///     clock.unix_timestamp_millis()
/// }
/// ```
pub trait Clock: Send + Sync {
    /// Get current UTC time
    fn now(&self) -> DateTime<Utc>;

    /// Get current Unix timestamp in seconds
    fn unix_timestamp(&self) -> i64 {
        self.now().timestamp()
    }

    /// Get current Unix timestamp in milliseconds
    fn unix_timestamp_millis(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

/// System clock implementation using actual system time
#[derive(Debug, Clone)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Periodic sampling cadence.
///
/// The playback clock samples its position feed once per tick. The contract
/// is intentionally loose: tick at high frequency while the host is
/// foregrounded, continue at a reduced but nonzero frequency while
/// backgrounded. No specific scheduling primitive is implied.
#[async_trait]
pub trait TickSource: Send + Sync {
    /// Wait until the next sampling tick.
    async fn tick(&self);

    /// Inform the source of a foreground/background transition so it can
    /// adjust cadence. Default: ignore.
    fn set_background(&self, _background: bool) {}
}

/// External playback-position feed.
///
/// The audio engine is an external collaborator; the core only observes an
/// imprecise wall-clock position and a duration that becomes known at some
/// point after the source is attached. Readings are cheap and non-blocking.
pub trait PositionSource: Send + Sync {
    /// Current playback position in seconds. Imprecise; may briefly repeat
    /// or jitter between ticks.
    fn position_secs(&self) -> f64;

    /// Total duration in seconds, once the source reports a finite value.
    fn duration_secs(&self) -> Option<f64>;

    /// Whether the source has buffered enough to begin playback. Saved
    /// positions are only restored once this reports `true`.
    fn is_ready(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock() {
        let clock = SystemClock;
        let now = clock.now();
        let timestamp = clock.unix_timestamp();

        assert!(timestamp > 0);
        assert!(now.timestamp() == timestamp);
    }
}
