//! Tick Source Implementation using Tokio Intervals

use async_trait::async_trait;
use bridge_traits::time::TickSource;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Tokio-interval tick source with foreground/background cadence.
///
/// Foregrounded hosts sample at a high rate for responsive lyric sync;
/// backgrounded hosts drop to a slower but still nonzero rate so progress
/// persistence keeps working.
pub struct TokioTicker {
    foreground: Duration,
    background: Duration,
    is_background: AtomicBool,
}

impl TokioTicker {
    /// Create a ticker with explicit cadences.
    pub fn new(foreground: Duration, background: Duration) -> Self {
        Self {
            foreground,
            background,
            is_background: AtomicBool::new(false),
        }
    }
}

impl Default for TokioTicker {
    fn default() -> Self {
        // ~30 Hz foregrounded, 1 Hz backgrounded
        Self::new(Duration::from_millis(33), Duration::from_secs(1))
    }
}

#[async_trait]
impl TickSource for TokioTicker {
    async fn tick(&self) {
        let period = if self.is_background.load(Ordering::Relaxed) {
            self.background
        } else {
            self.foreground
        };
        tokio::time::sleep(period).await;
    }

    fn set_background(&self, background: bool) {
        self.is_background.store(background, Ordering::Relaxed);
    }
}
