//! End-to-end behavior of the composition root with scripted bridges.

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::http::{HttpRequest, HttpResponse};
use bridge_traits::{Clock, HttpClient, PositionSource, SettingsStore, TickSource};
use chrono::{DateTime, TimeZone, Utc};
use core_library::{LibraryStore, PlayMode, Track, TrackKey};
use core_runtime::CoreConfig;
use core_service::{AppState, FAVORITES_ID};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Scripted bridges
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MemorySettings {
    data: Mutex<HashMap<String, String>>,
}

#[async_trait]
impl SettingsStore for MemorySettings {
    async fn set_string(&self, key: &str, value: &str) -> BridgeResult<()> {
        self.data
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
    async fn get_string(&self, key: &str) -> BridgeResult<Option<String>> {
        Ok(self.data.lock().unwrap().get(key).cloned())
    }
    async fn set_i64(&self, key: &str, value: i64) -> BridgeResult<()> {
        self.set_string(key, &value.to_string()).await
    }
    async fn get_i64(&self, key: &str) -> BridgeResult<Option<i64>> {
        Ok(self.get_string(key).await?.and_then(|v| v.parse().ok()))
    }
    async fn set_f64(&self, key: &str, value: f64) -> BridgeResult<()> {
        self.set_string(key, &value.to_string()).await
    }
    async fn get_f64(&self, key: &str) -> BridgeResult<Option<f64>> {
        Ok(self.get_string(key).await?.and_then(|v| v.parse().ok()))
    }
    async fn delete(&self, key: &str) -> BridgeResult<()> {
        self.data.lock().unwrap().remove(key);
        Ok(())
    }
    async fn has_key(&self, key: &str) -> BridgeResult<bool> {
        Ok(self.data.lock().unwrap().contains_key(key))
    }
    async fn clear_all(&self) -> BridgeResult<()> {
        self.data.lock().unwrap().clear();
        Ok(())
    }
}

/// Answers every request with 200 and an empty JSON object.
struct OkHttp;

#[async_trait]
impl HttpClient for OkHttp {
    async fn execute(&self, _request: HttpRequest) -> BridgeResult<HttpResponse> {
        Ok(HttpResponse {
            status: 200,
            headers: HashMap::new(),
            body: bytes::Bytes::from_static(b"{}"),
        })
    }
}

#[derive(Default)]
struct ScriptedPosition {
    position: Mutex<f64>,
    duration: Mutex<Option<f64>>,
    ready: AtomicBool,
}

impl ScriptedPosition {
    fn set_position(&self, secs: f64) {
        *self.position.lock().unwrap() = secs;
    }
    fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }
}

impl PositionSource for ScriptedPosition {
    fn position_secs(&self) -> f64 {
        *self.position.lock().unwrap()
    }
    fn duration_secs(&self) -> Option<f64> {
        *self.duration.lock().unwrap()
    }
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

struct FastTicker;

#[async_trait]
impl TickSource for FastTicker {
    async fn tick(&self) {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

struct MockClock {
    now_millis: AtomicI64,
}

impl MockClock {
    fn new() -> Self {
        Self {
            now_millis: AtomicI64::new(1_700_000_000_000),
        }
    }
    fn advance_secs(&self, secs: i64) {
        self.now_millis.fetch_add(secs * 1000, Ordering::SeqCst);
    }
}

impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.now_millis.load(Ordering::SeqCst))
            .unwrap()
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

struct Harness {
    app: Arc<AppState>,
    position: Arc<ScriptedPosition>,
    settings: Arc<MemorySettings>,
    wall_clock: Arc<MockClock>,
}

async fn build() -> Harness {
    build_with_settings(Arc::new(MemorySettings::default())).await
}

async fn build_with_settings(settings: Arc<MemorySettings>) -> Harness {
    let position = Arc::new(ScriptedPosition::default());
    let wall_clock = Arc::new(MockClock::new());

    let config = CoreConfig::builder()
        .api_base_url("https://music.test/api/user")
        .http_client(Arc::new(OkHttp))
        .settings_store(settings.clone())
        .tick_source(Arc::new(FastTicker))
        .position_source(position.clone())
        .clock(wall_clock.clone())
        .status_reset_delay(Duration::from_millis(50))
        .build()
        .unwrap();

    let app = AppState::build(config).await.unwrap();
    Harness {
        app,
        position,
        settings,
        wall_clock,
    }
}

fn track(id: &str) -> Track {
    Track {
        id: id.to_string(),
        platform: "netease".to_string(),
        title: format!("Track {}", id),
        artist: "Artist".to_string(),
        album: String::new(),
        url: None,
        pic: None,
        lrc: None,
    }
}

fn tracks(ids: &[&str]) -> Vec<Track> {
    ids.iter().map(|id| track(id)).collect()
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}

// ---------------------------------------------------------------------------
// Playback
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn start_playback_clamps_index_and_autoplays() {
    let h = build().await;

    h.app.start_playback(tracks(&["a", "b", "c"]), 5).await;

    assert_eq!(h.app.queue_index(), Some(2));
    assert_eq!(h.app.current_track().unwrap().id, "c");
    assert!(h.app.playback().is_playing);
    h.app.shutdown();
}

#[tokio::test(start_paused = true)]
async fn single_mode_track_end_replays_from_zero() {
    let h = build().await;
    h.app.start_playback(tracks(&["a", "b", "c"]), 1).await;
    h.app.set_play_mode(PlayMode::Single).await;
    h.app.seek(42.0).await;

    h.app.handle_track_end().await;

    assert_eq!(h.app.playback().progress_secs, 0.0);
    assert_eq!(h.app.queue_index(), Some(1));
    assert!(h.app.playback().is_playing);
    h.app.shutdown();
}

#[tokio::test(start_paused = true)]
async fn remove_current_advances_without_autoplay() {
    let h = build().await;
    h.app.start_playback(tracks(&["a", "b", "c"]), 1).await;
    h.app.toggle_play().await; // pause

    h.app.remove_from_queue(1).await;

    assert_eq!(h.app.current_track().unwrap().id, "c");
    assert!(!h.app.playback().is_playing);
    h.app.shutdown();
}

#[tokio::test(start_paused = true)]
async fn clear_queue_stops_playback() {
    let h = build().await;
    h.app.start_playback(tracks(&["a"]), 0).await;

    h.app.clear_queue().await;

    assert!(h.app.current_track().is_none());
    assert!(!h.app.playback().is_playing);
    assert_eq!(h.app.playback().progress_secs, 0.0);
    h.app.shutdown();
}

#[tokio::test(start_paused = true)]
async fn restore_resumes_same_track_without_autoplay() {
    let settings = Arc::new(MemorySettings::default());

    // A previous session persisted a queue and a position
    {
        let store = LibraryStore::new(settings.clone());
        store
            .save_player(&core_library::PlayerSnapshot {
                queue: tracks(&["a", "b"]),
                queue_index: Some(1),
                volume: 0.5,
                play_mode: PlayMode::Shuffle,
            })
            .await
            .unwrap();
        store.save_progress(90).await.unwrap();
    }

    let h = build_with_settings(settings).await;

    assert_eq!(h.app.current_track().unwrap().id, "b");
    assert_eq!(h.app.play_mode(), PlayMode::Shuffle);
    assert!(!h.app.playback().is_playing);
    assert_eq!(h.app.playback().volume, 0.5);

    // Once the source is ready the saved position is restored, exactly once
    h.position.set_ready(true);
    settle().await;
    assert_eq!(h.app.playback().progress_secs, 90.0);
    h.app.shutdown();
}

#[tokio::test(start_paused = true)]
async fn progress_feed_follows_position_source() {
    let h = build().await;
    h.app.start_playback(tracks(&["a"]), 0).await;

    h.position.set_position(7.3);
    settle().await;

    assert!((h.app.playback().progress_secs - 7.3).abs() < 1e-9);
    h.app.shutdown();
}

// ---------------------------------------------------------------------------
// Lyrics
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn lyric_line_follows_progress() {
    let h = build().await;
    h.app.start_playback(tracks(&["a"]), 0).await;

    h.app
        .load_lyrics("[00:05.00]first\n[00:10.00]second")
        .await;
    assert_eq!(h.app.active_lyric_index(), None);

    h.position.set_position(6.0);
    settle().await;
    assert_eq!(h.app.active_lyric_index(), Some(0));

    h.position.set_position(11.0);
    settle().await;
    assert_eq!(h.app.active_lyric_index(), Some(1));
    h.app.shutdown();
}

#[tokio::test(start_paused = true)]
async fn lyric_parse_failure_is_component_local() {
    let h = build().await;
    h.app.start_playback(tracks(&["a"]), 0).await;

    h.app.load_lyrics("plain text, no timestamps").await;

    assert!(h.app.lyrics_error().is_some());
    assert!(!h.app.sync_status().is_error());
    h.app.shutdown();
}

// ---------------------------------------------------------------------------
// Collections
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn favorites_pseudo_playlist_routes_to_favorites() {
    let h = build().await;

    let now_in = h
        .app
        .toggle_track_in_playlist(FAVORITES_ID, track("x"))
        .await;

    assert_eq!(now_in, Some(true));
    assert!(h.app.is_favorite(&TrackKey::new("netease", "x")));
    h.app.shutdown();
}

#[tokio::test(start_paused = true)]
async fn create_and_rename_playlist() {
    let h = build().await;

    let playlist = h.app.create_playlist("Morning").await;
    h.app.rename_playlist(&playlist.id, "Evening").await;
    settle().await;

    let playlists = h.app.playlists();
    assert_eq!(playlists.find(&playlist.id).unwrap().name, "Evening");
    h.app.shutdown();
}

#[tokio::test(start_paused = true)]
async fn sign_out_keeps_local_collections() {
    let h = build().await;
    h.app.sign_in("token");
    h.app.toggle_favorite(track("x")).await;
    settle().await;

    h.app.sign_out();

    assert!(h.app.is_favorite(&TrackKey::new("netease", "x")));
    assert!(!h.app.has_session());
    h.app.shutdown();
}

// ---------------------------------------------------------------------------
// Sleep timer
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn sleep_timer_pauses_playback_at_deadline() {
    let h = build().await;
    h.app.start_playback(tracks(&["a"]), 0).await;
    assert!(h.app.playback().is_playing);

    h.app.set_sleep_timer(Duration::from_secs(60));
    assert!(h.app.sleep_deadline_millis().is_some());

    h.wall_clock.advance_secs(61);
    tokio::time::sleep(Duration::from_secs(3)).await;

    assert!(!h.app.playback().is_playing);
    assert!(h.app.sleep_deadline_millis().is_none());
    h.app.shutdown();
}

#[tokio::test(start_paused = true)]
async fn cancelled_sleep_timer_never_fires() {
    let h = build().await;
    h.app.start_playback(tracks(&["a"]), 0).await;

    h.app.set_sleep_timer(Duration::from_secs(60));
    h.app.cancel_sleep_timer();

    h.wall_clock.advance_secs(120);
    tokio::time::sleep(Duration::from_secs(3)).await;

    assert!(h.app.playback().is_playing);
    assert_eq!(h.app.sleep_deadline_millis(), None);
    h.app.shutdown();
}

// ---------------------------------------------------------------------------
// Persistence across restarts
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn queue_survives_restart() {
    let settings = Arc::new(MemorySettings::default());

    {
        let h = build_with_settings(settings.clone()).await;
        h.app.start_playback(tracks(&["a", "b", "c"]), 2).await;
        h.app.set_play_mode(PlayMode::Single).await;
        h.app.shutdown();
    }

    let h = build_with_settings(settings).await;
    assert_eq!(h.app.queue_tracks().len(), 3);
    assert_eq!(h.app.queue_index(), Some(2));
    assert_eq!(h.app.play_mode(), PlayMode::Single);
    assert!(!h.app.playback().is_playing);

    // Unused but part of the harness contract
    let _ = &h.settings;
    h.app.shutdown();
}
