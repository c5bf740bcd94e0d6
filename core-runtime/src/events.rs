//! # Event Bus System
//!
//! Decoupled communication between core modules through typed events over a
//! `tokio::sync::broadcast` channel. The player core emits playback and sync
//! events; the host UI (and internal tasks such as the lyric feed) subscribe
//! independently.
//!
//! Subscribers should handle `RecvError::Lagged` gracefully (non-fatal, the
//! subscriber was too slow) and treat `RecvError::Closed` as shutdown.
//!
//! ```rust
//! use core_runtime::events::{EventBus, CoreEvent, PlayerEvent};
//!
//! let event_bus = EventBus::new(100);
//! let mut stream = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Player(PlayerEvent::PlayStateChanged { playing: true }))
//!     .ok();
//! ```

use tokio::sync::broadcast;

/// Playback-side events
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    /// The current track changed (queue jump, next/prev, restore)
    TrackChanged {
        platform: String,
        id: String,
        title: String,
        /// Whether the host should begin playback immediately
        autoplay: bool,
    },
    /// Play/pause state flipped
    PlayStateChanged { playing: bool },
    /// Smoothed playback position moved past the publish threshold
    PositionChanged { secs: f64 },
    /// Duration became known for the attached source
    DurationChanged { secs: f64 },
    /// Active lyric line changed; `None` means before the first line
    LyricLineChanged { index: Option<usize> },
    /// Queue contents or current index changed
    QueueChanged {
        len: usize,
        current: Option<usize>,
    },
    /// The armed sleep timer elapsed and playback was paused
    SleepTimerFired,
}

/// Sync-side events
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// Global sync status flag changed
    StatusChanged { status: String },
    /// A mutation was acknowledged by the backend
    Committed { collection: String, version: u64 },
    /// A mutation failed and local state was restored to its snapshot
    RolledBack { collection: String, message: String },
    /// Cloud state replaced local state
    Pulled { favorites: usize, playlists: usize },
    /// Local state replaced cloud state
    Pushed {
        favorites_version: u64,
        playlists_version: u64,
    },
}

/// Top-level event type emitted on the bus
#[derive(Debug, Clone, PartialEq)]
pub enum CoreEvent {
    Player(PlayerEvent),
    Sync(SyncEvent),
}

/// Central broadcast channel for core events.
///
/// Cloning an `EventBus` is cheap; all clones share the same channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// Returns the number of receivers the event was delivered to. An error
    /// only means there are no subscribers, which callers routinely ignore.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, broadcast::error::SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Subscribe to all events from this point forward.
    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_and_receive() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.emit(CoreEvent::Player(PlayerEvent::PlayStateChanged {
            playing: true,
        }))
        .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(
            event,
            CoreEvent::Player(PlayerEvent::PlayStateChanged { playing: true })
        );
    }

    #[tokio::test]
    async fn test_emit_without_subscribers_is_err() {
        let bus = EventBus::new(16);
        assert!(bus
            .emit(CoreEvent::Sync(SyncEvent::StatusChanged {
                status: "idle".to_string()
            }))
            .is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let bus = EventBus::new(16);
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        bus.emit(CoreEvent::Player(PlayerEvent::SleepTimerFired))
            .unwrap();

        assert!(matches!(
            a.recv().await.unwrap(),
            CoreEvent::Player(PlayerEvent::SleepTimerFired)
        ));
        assert!(matches!(
            b.recv().await.unwrap(),
            CoreEvent::Player(PlayerEvent::SleepTimerFired)
        ));
    }
}
