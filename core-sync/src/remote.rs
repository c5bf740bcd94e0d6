//! # Remote Collections Store
//!
//! Adapter over the user-data backend: favorites, playlists, and listening
//! history live under opaque per-user keys in a remote key-value store,
//! fronted by a small HTTP surface. Every call carries a bearer token;
//! a missing or rejected token is a hard sync failure.
//!
//! The trait exists so the engine can be exercised against scripted
//! implementations in tests; [`HttpCollectionsRemote`] is the real one.

use crate::error::{Result, SyncError};
use async_trait::async_trait;
use bridge_traits::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use core_library::{Favorites, PlayedTrack, Playlist, PlaylistSet, PlaylistUpdate, Track, TrackKey};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

/// Backend operations on the synchronized collections.
#[async_trait]
pub trait CollectionsRemote: Send + Sync {
    async fn fetch_favorites(&self, token: &str) -> Result<Favorites>;
    /// Append one track unless the backend already has it. Returns the
    /// stored object, version included.
    async fn add_favorite(&self, token: &str, track: &Track) -> Result<Favorites>;
    async fn remove_favorite(&self, token: &str, key: &TrackKey) -> Result<Favorites>;
    /// Replace the whole collection (local-wins push).
    async fn replace_favorites(&self, token: &str, songs: &[Track]) -> Result<Favorites>;

    async fn fetch_playlists(&self, token: &str) -> Result<PlaylistSet>;
    async fn create_playlist(&self, token: &str, playlist: &Playlist) -> Result<PlaylistSet>;
    /// Patch one playlist by id (field-level update or full track list).
    async fn update_playlist(
        &self,
        token: &str,
        id: &str,
        update: &PlaylistUpdate,
    ) -> Result<PlaylistSet>;
    async fn delete_playlist(&self, token: &str, id: &str) -> Result<PlaylistSet>;
    /// Replace the whole collection (local-wins push).
    async fn replace_playlists(&self, token: &str, playlists: &[Playlist]) -> Result<PlaylistSet>;

    async fn fetch_history(&self, token: &str) -> Result<Vec<PlayedTrack>>;
    async fn record_played(&self, token: &str, track: &Track) -> Result<()>;
    async fn clear_history(&self, token: &str) -> Result<()>;
}

/// HTTP implementation of [`CollectionsRemote`].
pub struct HttpCollectionsRemote {
    http: Arc<dyn HttpClient>,
    base_url: String,
}

#[derive(Serialize)]
struct ReplaceSongsBody<'a> {
    songs: &'a [Track],
}

#[derive(Serialize)]
struct ReplacePlaylistsBody<'a> {
    playlists: &'a [Playlist],
}

#[derive(Serialize)]
struct PlaylistPatchBody<'a> {
    id: &'a str,
    #[serde(flatten)]
    update: &'a PlaylistUpdate,
}

impl HttpCollectionsRemote {
    pub fn new(http: Arc<dyn HttpClient>, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self, resource: &str) -> String {
        format!("{}/{}", self.base_url, resource)
    }

    /// Execute and map transport/status failures onto the sync error
    /// taxonomy. 401 is singled out: an invalid token is a hard failure
    /// the UI should name as such.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let response = self.http.execute(request).await?;

        if response.status == 401 {
            return Err(SyncError::Unauthorized);
        }
        if !response.is_success() {
            let message = response
                .text()
                .ok()
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "Sync request failed".to_string());
            return Err(SyncError::Http {
                status: response.status,
                message,
            });
        }
        Ok(response)
    }

    /// Parse a 2xx body, falling back to the empty default on malformed
    /// JSON. A commit that cannot be parsed still committed remotely, so
    /// surfacing it as an error would trigger a bogus rollback.
    fn parse_or_default<T: DeserializeOwned + Default>(&self, response: &HttpResponse) -> T {
        match response.json() {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Malformed backend response, using default");
                T::default()
            }
        }
    }
}

#[async_trait]
impl CollectionsRemote for HttpCollectionsRemote {
    async fn fetch_favorites(&self, token: &str) -> Result<Favorites> {
        let request =
            HttpRequest::new(HttpMethod::Get, self.endpoint("favorites")).bearer_token(token);
        let response = self.send(request).await?;
        Ok(self.parse_or_default(&response))
    }

    async fn add_favorite(&self, token: &str, track: &Track) -> Result<Favorites> {
        let request = HttpRequest::new(HttpMethod::Post, self.endpoint("favorites"))
            .bearer_token(token)
            .json(track)
            .map_err(|e| SyncError::Serialization(e.to_string()))?;
        let response = self.send(request).await?;
        Ok(self.parse_or_default(&response))
    }

    async fn remove_favorite(&self, token: &str, key: &TrackKey) -> Result<Favorites> {
        let request = HttpRequest::new(HttpMethod::Delete, self.endpoint("favorites"))
            .query("id", &key.id)
            .query("platform", &key.platform)
            .bearer_token(token);
        let response = self.send(request).await?;
        Ok(self.parse_or_default(&response))
    }

    async fn replace_favorites(&self, token: &str, songs: &[Track]) -> Result<Favorites> {
        let request = HttpRequest::new(HttpMethod::Put, self.endpoint("favorites"))
            .bearer_token(token)
            .json(&ReplaceSongsBody { songs })
            .map_err(|e| SyncError::Serialization(e.to_string()))?;
        let response = self.send(request).await?;
        Ok(self.parse_or_default(&response))
    }

    async fn fetch_playlists(&self, token: &str) -> Result<PlaylistSet> {
        let request =
            HttpRequest::new(HttpMethod::Get, self.endpoint("playlists")).bearer_token(token);
        let response = self.send(request).await?;
        Ok(self.parse_or_default(&response))
    }

    async fn create_playlist(&self, token: &str, playlist: &Playlist) -> Result<PlaylistSet> {
        let request = HttpRequest::new(HttpMethod::Post, self.endpoint("playlists"))
            .bearer_token(token)
            .json(playlist)
            .map_err(|e| SyncError::Serialization(e.to_string()))?;
        let response = self.send(request).await?;
        Ok(self.parse_or_default(&response))
    }

    async fn update_playlist(
        &self,
        token: &str,
        id: &str,
        update: &PlaylistUpdate,
    ) -> Result<PlaylistSet> {
        let request = HttpRequest::new(HttpMethod::Put, self.endpoint("playlists"))
            .bearer_token(token)
            .json(&PlaylistPatchBody { id, update })
            .map_err(|e| SyncError::Serialization(e.to_string()))?;
        let response = self.send(request).await?;
        Ok(self.parse_or_default(&response))
    }

    async fn delete_playlist(&self, token: &str, id: &str) -> Result<PlaylistSet> {
        let request = HttpRequest::new(HttpMethod::Delete, self.endpoint("playlists"))
            .query("id", id)
            .bearer_token(token);
        let response = self.send(request).await?;
        Ok(self.parse_or_default(&response))
    }

    async fn replace_playlists(&self, token: &str, playlists: &[Playlist]) -> Result<PlaylistSet> {
        let request = HttpRequest::new(HttpMethod::Put, self.endpoint("playlists"))
            .bearer_token(token)
            .json(&ReplacePlaylistsBody { playlists })
            .map_err(|e| SyncError::Serialization(e.to_string()))?;
        let response = self.send(request).await?;
        Ok(self.parse_or_default(&response))
    }

    async fn fetch_history(&self, token: &str) -> Result<Vec<PlayedTrack>> {
        let request =
            HttpRequest::new(HttpMethod::Get, self.endpoint("history")).bearer_token(token);
        let response = self.send(request).await?;
        Ok(self.parse_or_default(&response))
    }

    async fn record_played(&self, token: &str, track: &Track) -> Result<()> {
        let request = HttpRequest::new(HttpMethod::Post, self.endpoint("history"))
            .bearer_token(token)
            .json(track)
            .map_err(|e| SyncError::Serialization(e.to_string()))?;
        self.send(request).await?;
        Ok(())
    }

    async fn clear_history(&self, token: &str) -> Result<()> {
        let request =
            HttpRequest::new(HttpMethod::Delete, self.endpoint("history")).bearer_token(token);
        self.send(request).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::Result as BridgeResult;
    use bytes::Bytes;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Records requests and returns a canned response.
    struct RecordingHttp {
        requests: Mutex<Vec<HttpRequest>>,
        status: u16,
        body: String,
    }

    impl RecordingHttp {
        fn new(status: u16, body: &str) -> Self {
            Self {
                requests: Mutex::new(Vec::new()),
                status,
                body: body.to_string(),
            }
        }
    }

    #[async_trait]
    impl HttpClient for RecordingHttp {
        async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
            self.requests.lock().unwrap().push(request);
            Ok(HttpResponse {
                status: self.status,
                headers: HashMap::new(),
                body: Bytes::from(self.body.clone()),
            })
        }
    }

    fn track() -> Track {
        Track {
            id: "1".to_string(),
            platform: "netease".to_string(),
            title: "Song".to_string(),
            artist: String::new(),
            album: String::new(),
            url: None,
            pic: None,
            lrc: None,
        }
    }

    #[tokio::test]
    async fn test_fetch_parses_versioned_object() {
        let http = Arc::new(RecordingHttp::new(
            200,
            r#"{"songs":[],"version":4,"updatedAt":123}"#,
        ));
        let remote = HttpCollectionsRemote::new(http.clone(), "https://host/api/user/");

        let favorites = remote.fetch_favorites("tok").await.unwrap();
        assert_eq!(favorites.version, 4);

        let requests = http.requests.lock().unwrap();
        assert_eq!(requests[0].url, "https://host/api/user/favorites");
        assert!(requests[0].headers.contains_key("Authorization"));
    }

    #[tokio::test]
    async fn test_remove_favorite_uses_query_params() {
        let http = Arc::new(RecordingHttp::new(200, r#"{"songs":[],"version":1}"#));
        let remote = HttpCollectionsRemote::new(http.clone(), "https://host/api/user");

        remote
            .remove_favorite("tok", &TrackKey::new("netease", "42"))
            .await
            .unwrap();

        let requests = http.requests.lock().unwrap();
        assert_eq!(requests[0].method, HttpMethod::Delete);
        assert!(requests[0]
            .query
            .contains(&("id".to_string(), "42".to_string())));
        assert!(requests[0]
            .query
            .contains(&("platform".to_string(), "netease".to_string())));
    }

    #[tokio::test]
    async fn test_unauthorized_maps_to_hard_failure() {
        let http = Arc::new(RecordingHttp::new(401, "Unauthorized"));
        let remote = HttpCollectionsRemote::new(http, "https://host/api/user");

        assert!(matches!(
            remote.fetch_favorites("bad").await,
            Err(SyncError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn test_server_error_carries_body_message() {
        let http = Arc::new(RecordingHttp::new(500, "Error adding favorite"));
        let remote = HttpCollectionsRemote::new(http, "https://host/api/user");

        match remote.add_favorite("tok", &track()).await {
            Err(SyncError::Http { status, message }) => {
                assert_eq!(status, 500);
                assert_eq!(message, "Error adding favorite");
            }
            other => panic!("unexpected: {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_malformed_success_body_is_default_not_error() {
        let http = Arc::new(RecordingHttp::new(200, "garbage"));
        let remote = HttpCollectionsRemote::new(http, "https://host/api/user");

        let favorites = remote.fetch_favorites("tok").await.unwrap();
        assert_eq!(favorites, Favorites::default());
    }

    #[tokio::test]
    async fn test_update_playlist_patch_body_shape() {
        let http = Arc::new(RecordingHttp::new(200, r#"{"playlists":[],"version":2}"#));
        let remote = HttpCollectionsRemote::new(http.clone(), "https://host/api/user");

        remote
            .update_playlist("tok", "pl-1", &PlaylistUpdate::rename("New name"))
            .await
            .unwrap();

        let requests = http.requests.lock().unwrap();
        let body: serde_json::Value =
            serde_json::from_slice(requests[0].body.as_ref().unwrap()).unwrap();
        assert_eq!(body["id"], "pl-1");
        assert_eq!(body["name"], "New name");
        assert!(body.get("songs").is_none());
    }
}
