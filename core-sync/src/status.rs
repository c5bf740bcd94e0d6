//! # Sync Status Machine
//!
//! One global status flag for the whole sync layer, not per collection:
//!
//! ```text
//! Idle → Syncing → Success → Idle   (auto after a short delay)
//!            ↓
//!          Error
//! ```
//!
//! Transitions are guarded by a generation counter: every transition bumps
//! the generation, and the delayed Success→Idle reset only fires if no newer
//! transition happened in the meantime. Responses that complete out of call
//! order therefore never resurrect a stale status.

use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

/// The global sync status visible to the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "status", content = "message")]
pub enum SyncState {
    Idle,
    Syncing,
    Success,
    Error(String),
}

impl SyncState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncState::Idle => "idle",
            SyncState::Syncing => "syncing",
            SyncState::Success => "success",
            SyncState::Error(_) => "error",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, SyncState::Error(_))
    }
}

/// Shared, generation-guarded status handle.
#[derive(Clone)]
pub struct StatusHandle {
    inner: Arc<Mutex<(SyncState, u64)>>,
    events: EventBus,
    reset_delay: Duration,
}

impl StatusHandle {
    pub fn new(events: EventBus, reset_delay: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new((SyncState::Idle, 0))),
            events,
            reset_delay,
        }
    }

    pub fn current(&self) -> SyncState {
        self.inner.lock().expect("status lock").0.clone()
    }

    /// Enter Syncing. Returns the generation token the eventual
    /// success/failure transition must present.
    pub fn begin(&self) -> u64 {
        let generation = {
            let mut guard = self.inner.lock().expect("status lock");
            guard.0 = SyncState::Syncing;
            guard.1 += 1;
            guard.1
        };
        self.emit_changed(SyncState::Syncing);
        generation
    }

    /// Success for the given generation; schedules the delayed reset to
    /// Idle, which is skipped if any newer transition intervenes.
    pub fn succeed(&self, generation: u64) {
        {
            let mut guard = self.inner.lock().expect("status lock");
            guard.0 = SyncState::Success;
            guard.1 = generation.max(guard.1);
        }
        self.emit_changed(SyncState::Success);

        let handle = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(handle.reset_delay).await;
            let reset = {
                let mut guard = handle.inner.lock().expect("status lock");
                if guard.1 == generation && guard.0 == SyncState::Success {
                    guard.0 = SyncState::Idle;
                    true
                } else {
                    debug!("Skipping stale status reset");
                    false
                }
            };
            if reset {
                handle.emit_changed(SyncState::Idle);
            }
        });
    }

    /// Error for the given generation.
    pub fn fail(&self, generation: u64, message: impl Into<String>) {
        let state = SyncState::Error(message.into());
        {
            let mut guard = self.inner.lock().expect("status lock");
            guard.0 = state.clone();
            guard.1 = generation.max(guard.1);
        }
        self.emit_changed(state);
    }

    fn emit_changed(&self, state: SyncState) {
        self.events
            .emit(CoreEvent::Sync(SyncEvent::StatusChanged {
                status: state.as_str().to_string(),
            }))
            .ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_success_resets_to_idle_after_delay() {
        let handle = StatusHandle::new(EventBus::new(16), Duration::from_millis(10));

        let generation = handle.begin();
        assert_eq!(handle.current(), SyncState::Syncing);

        handle.succeed(generation);
        assert_eq!(handle.current(), SyncState::Success);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(handle.current(), SyncState::Idle);
    }

    #[tokio::test]
    async fn test_stale_reset_does_not_clobber_newer_syncing() {
        let handle = StatusHandle::new(EventBus::new(16), Duration::from_millis(10));

        let first = handle.begin();
        handle.succeed(first);

        // A second operation starts before the reset fires
        let second = handle.begin();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(handle.current(), SyncState::Syncing);

        handle.fail(second, "backend rejected");
        assert_eq!(
            handle.current(),
            SyncState::Error("backend rejected".to_string())
        );
    }

    #[tokio::test]
    async fn test_error_is_sticky() {
        let handle = StatusHandle::new(EventBus::new(16), Duration::from_millis(5));

        let generation = handle.begin();
        handle.fail(generation, "boom");

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(handle.current().is_error());
    }
}
