use super::{Catalog, PlaylistValidation, UserValidation};
use crate::models::{ArtistSnapshot, PlaylistSnapshot, TrackSnapshot};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use tracing::info;

#[derive(Default)]
struct MockState {
    current_user: String,
    users: HashMap<String, Vec<String>>, // owner -> playlist ids, in insertion order
    playlists: HashMap<String, PlaylistSnapshot>,
    tracks: HashMap<String, Vec<TrackSnapshot>>,
    artists: HashMap<String, ArtistSnapshot>,
    inaccessible_playlists: HashSet<String>,
    failing_track_fetches: HashSet<String>,
    search_results: HashMap<String, Vec<TrackSnapshot>>,
    replaced: HashMap<String, Vec<String>>,
    batch_sizes: Vec<usize>,
    created: u64,
}

/// A programmable in-memory catalog used in tests and when no real
/// credentials are present. State is seeded up front; write operations
/// mutate it and record what happened for assertions.
pub struct MockCatalog {
    state: Mutex<MockState>,
}

impl MockCatalog {
    pub fn new() -> Self {
        let state = MockState { current_user: "mock_user".to_string(), ..Default::default() };
        Self { state: Mutex::new(state) }
    }

    pub fn add_user_playlist(
        &self,
        owner: &str,
        playlist: PlaylistSnapshot,
        tracks: Vec<TrackSnapshot>,
    ) {
        let mut st = self.state.lock().unwrap();
        st.users.entry(owner.to_string()).or_default().push(playlist.id.clone());
        st.tracks.insert(playlist.id.clone(), tracks);
        st.playlists.insert(playlist.id.clone(), playlist);
    }

    pub fn add_playlist(&self, playlist: PlaylistSnapshot, tracks: Vec<TrackSnapshot>) {
        let mut st = self.state.lock().unwrap();
        st.tracks.insert(playlist.id.clone(), tracks);
        st.playlists.insert(playlist.id.clone(), playlist);
    }

    pub fn add_artist(&self, artist: ArtistSnapshot) {
        self.state.lock().unwrap().artists.insert(artist.id.clone(), artist);
    }

    pub fn remove_playlist(&self, playlist_id: &str) {
        let mut st = self.state.lock().unwrap();
        st.playlists.remove(playlist_id);
        st.tracks.remove(playlist_id);
    }

    pub fn mark_inaccessible(&self, playlist_id: &str) {
        self.state.lock().unwrap().inaccessible_playlists.insert(playlist_id.to_string());
    }

    /// Make get_playlist_tracks fail for the given playlist.
    pub fn fail_tracks_for(&self, playlist_id: &str) {
        self.state.lock().unwrap().failing_track_fetches.insert(playlist_id.to_string());
    }

    pub fn add_search_results(&self, query: &str, tracks: Vec<TrackSnapshot>) {
        self.state.lock().unwrap().search_results.insert(query.to_string(), tracks);
    }

    /// Sizes of the artist batch requests issued so far.
    pub fn artist_batch_sizes(&self) -> Vec<usize> {
        self.state.lock().unwrap().batch_sizes.clone()
    }

    /// URIs most recently written to the playlist via replace_playlist_tracks.
    pub fn replaced_tracks(&self, playlist_id: &str) -> Option<Vec<String>> {
        self.state.lock().unwrap().replaced.get(playlist_id).cloned()
    }
}

impl Default for MockCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Catalog for MockCatalog {
    async fn list_user_playlists(&self, owner: &str) -> Result<Vec<PlaylistSnapshot>> {
        let st = self.state.lock().unwrap();
        let ids = st.users.get(owner).cloned().unwrap_or_default();
        Ok(ids.iter().filter_map(|id| st.playlists.get(id).cloned()).collect())
    }

    async fn get_playlist(&self, playlist_id: &str) -> Result<PlaylistSnapshot> {
        let st = self.state.lock().unwrap();
        st.playlists
            .get(playlist_id)
            .cloned()
            .ok_or_else(|| anyhow!("playlist {} not found", playlist_id))
    }

    async fn get_playlist_tracks(&self, playlist_id: &str) -> Result<Vec<TrackSnapshot>> {
        let st = self.state.lock().unwrap();
        if st.failing_track_fetches.contains(playlist_id) {
            return Err(anyhow!("mock transport error for {}", playlist_id));
        }
        Ok(st.tracks.get(playlist_id).cloned().unwrap_or_default())
    }

    async fn get_artist(&self, artist_id: &str) -> Result<ArtistSnapshot> {
        let st = self.state.lock().unwrap();
        st.artists
            .get(artist_id)
            .cloned()
            .ok_or_else(|| anyhow!("artist {} not found", artist_id))
    }

    async fn get_artists_batch(
        &self,
        artist_ids: &[String],
    ) -> Result<HashMap<String, ArtistSnapshot>> {
        let mut st = self.state.lock().unwrap();
        st.batch_sizes.push(artist_ids.len());
        info!("MockCatalog: batch lookup of {} artists", artist_ids.len());
        let mut results = HashMap::new();
        for id in artist_ids {
            if let Some(a) = st.artists.get(id) {
                results.insert(id.clone(), a.clone());
            }
        }
        Ok(results)
    }

    async fn validate_playlist(&self, playlist_id: &str) -> Result<PlaylistValidation> {
        let st = self.state.lock().unwrap();
        if st.inaccessible_playlists.contains(playlist_id) {
            return Ok(PlaylistValidation {
                valid: true,
                accessible: false,
                info: None,
                error: Some("Playlist exists but is private/not accessible".into()),
            });
        }
        match st.playlists.get(playlist_id) {
            Some(p) => Ok(PlaylistValidation {
                valid: true,
                accessible: true,
                info: Some(p.clone()),
                error: None,
            }),
            None => Ok(PlaylistValidation {
                valid: false,
                accessible: false,
                info: None,
                error: Some("Playlist not found or not accessible".into()),
            }),
        }
    }

    async fn validate_user(&self, user_id: &str) -> Result<UserValidation> {
        let st = self.state.lock().unwrap();
        if st.users.contains_key(user_id) {
            Ok(UserValidation { valid: true, accessible: true, error: None })
        } else {
            Ok(UserValidation {
                valid: false,
                accessible: false,
                error: Some("User not found or not accessible".into()),
            })
        }
    }

    async fn current_user_id(&self) -> Result<String> {
        Ok(self.state.lock().unwrap().current_user.clone())
    }

    async fn my_playlists(&self) -> Result<Vec<PlaylistSnapshot>> {
        let st = self.state.lock().unwrap();
        let me = st.current_user.clone();
        Ok(st.playlists.values().filter(|p| p.owner_id == me).cloned().collect())
    }

    async fn create_playlist(
        &self,
        name: &str,
        description: &str,
        public: bool,
    ) -> Result<PlaylistSnapshot> {
        let mut st = self.state.lock().unwrap();
        st.created += 1;
        let playlist = PlaylistSnapshot {
            id: format!("mock-playlist-{}", st.created),
            name: name.to_string(),
            description: Some(description.to_string()),
            owner_id: st.current_user.clone(),
            snapshot_id: "mock-snap-1".to_string(),
            public,
            ..Default::default()
        };
        info!("MockCatalog: create_playlist {} -> {}", name, playlist.id);
        st.playlists.insert(playlist.id.clone(), playlist.clone());
        st.tracks.insert(playlist.id.clone(), Vec::new());
        Ok(playlist)
    }

    async fn update_playlist_details(
        &self,
        playlist_id: &str,
        name: &str,
        description: &str,
        public: bool,
    ) -> Result<()> {
        let mut st = self.state.lock().unwrap();
        let p = st
            .playlists
            .get_mut(playlist_id)
            .ok_or_else(|| anyhow!("playlist {} not found", playlist_id))?;
        p.name = name.to_string();
        p.description = Some(description.to_string());
        p.public = public;
        Ok(())
    }

    async fn replace_playlist_tracks(&self, playlist_id: &str, uris: &[String]) -> Result<()> {
        let mut st = self.state.lock().unwrap();
        if !st.playlists.contains_key(playlist_id) {
            return Err(anyhow!("playlist {} not found", playlist_id));
        }
        info!("MockCatalog: replace_playlist_tracks {} -> {} tracks", playlist_id, uris.len());
        st.replaced.insert(playlist_id.to_string(), uris.to_vec());
        Ok(())
    }

    async fn search_tracks(&self, query: &str, limit: usize) -> Result<Vec<TrackSnapshot>> {
        let st = self.state.lock().unwrap();
        let mut results = st.search_results.get(query).cloned().unwrap_or_default();
        results.truncate(limit);
        Ok(results)
    }
}
