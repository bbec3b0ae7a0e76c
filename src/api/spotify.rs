use super::limiter::RateLimiter;
use super::{ApiError, Catalog, PlaylistValidation, RateLimitExceeded, UserValidation};
use crate::models::{ArtistRef, ArtistSnapshot, PlaylistSnapshot, TrackSnapshot};
use crate::util;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use chrono::Utc;
use log::{debug, error, info, warn};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method};
use serde_json::json;
use std::collections::HashMap;
use std::env;
use std::time::Duration;

const TIMEOUT_RETRIES: u32 = 3;
const TIMEOUT_BACKOFF: Duration = Duration::from_secs(30);
const SERVER_ERROR_PAUSE: Duration = Duration::from_secs(5);
const ARTIST_BATCH_SIZE: usize = 50;
const WRITE_BATCH_SIZE: usize = 100;

/// How the client obtains access tokens. The client-credentials grant is
/// enough for the read-only sync pass; editing generated playlists needs a
/// user-scoped token obtained via a long-lived refresh token.
#[derive(Debug, Clone)]
pub enum SpotifyAuth {
    ClientCredentials { client_id: String, client_secret: String },
    RefreshToken { client_id: String, client_secret: String, refresh_token: String },
}

struct StoredToken {
    access_token: String,
    expires_at: i64, // epoch seconds
}

/// Spotify Web API client: throttled, retrying, paginating.
/// Endpoints may be overridden by SPOTIFY_AUTH_BASE and SPOTIFY_API_BASE
/// env vars (useful for tests).
pub struct SpotifyClient {
    client: Client,
    auth: SpotifyAuth,
    limiter: RateLimiter,
    token: tokio::sync::Mutex<Option<StoredToken>>,
    user_id: tokio::sync::Mutex<Option<String>>,
}

/// Any error text naming the rate limit trips the circuit breaker.
fn check_rate_limit_text(detail: &str) -> Result<()> {
    let lower = detail.to_lowercase();
    if lower.contains("rate") && lower.contains("limit") {
        error!("Spotify rate limit exceeded. The request budget should prevent this, but it was triggered anyway.");
        error!("Error details: {}", detail);
        return Err(anyhow::Error::new(RateLimitExceeded { detail: detail.to_string() }));
    }
    Ok(())
}

fn parse_playlist(v: &serde_json::Value) -> PlaylistSnapshot {
    PlaylistSnapshot {
        id: v["id"].as_str().unwrap_or("").to_string(),
        name: v["name"].as_str().unwrap_or("").to_string(),
        description: v["description"].as_str().map(|s| s.to_string()),
        owner_id: v["owner"]["id"].as_str().unwrap_or("").to_string(),
        snapshot_id: v["snapshot_id"].as_str().unwrap_or("").to_string(),
        public: v["public"].as_bool().unwrap_or(false),
        collaborative: v["collaborative"].as_bool().unwrap_or(false),
        tracks_total: v["tracks"]["total"].as_i64().unwrap_or(0),
        href: v["href"].as_str().map(|s| s.to_string()),
        uri: v["uri"].as_str().map(|s| s.to_string()),
    }
}

fn parse_track(v: &serde_json::Value) -> TrackSnapshot {
    let artists = v["artists"]
        .as_array()
        .map(|arr| {
            arr.iter()
                .map(|a| ArtistRef {
                    id: a["id"].as_str().unwrap_or("").to_string(),
                    name: a["name"].as_str().unwrap_or("").to_string(),
                })
                .collect()
        })
        .unwrap_or_default();
    TrackSnapshot {
        id: v["id"].as_str().unwrap_or("").to_string(),
        name: v["name"].as_str().unwrap_or("").to_string(),
        duration_ms: v["duration_ms"].as_i64().unwrap_or(0),
        explicit: v["explicit"].as_bool().unwrap_or(false),
        popularity: v["popularity"].as_i64().unwrap_or(0),
        preview_url: v["preview_url"].as_str().map(|s| s.to_string()),
        href: v["href"].as_str().map(|s| s.to_string()),
        uri: v["uri"].as_str().map(|s| s.to_string()),
        external_urls: v["external_urls"].is_object().then(|| v["external_urls"].to_string()),
        album_id: v["album"]["id"].as_str().map(|s| s.to_string()),
        album_name: v["album"]["name"].as_str().map(|s| s.to_string()),
        artists,
    }
}

fn parse_artist(v: &serde_json::Value) -> ArtistSnapshot {
    let genres = v["genres"]
        .as_array()
        .map(|arr| arr.iter().filter_map(|g| g.as_str().map(String::from)).collect())
        .unwrap_or_default();
    ArtistSnapshot {
        id: v["id"].as_str().unwrap_or("").to_string(),
        name: v["name"].as_str().unwrap_or("").to_string(),
        genres,
        popularity: v["popularity"].as_i64().unwrap_or(0),
        followers_total: v["followers"]["total"].as_i64().unwrap_or(0),
        href: v["href"].as_str().map(|s| s.to_string()),
        uri: v["uri"].as_str().map(|s| s.to_string()),
        external_urls: v["external_urls"].is_object().then(|| v["external_urls"].to_string()),
    }
}

impl SpotifyClient {
    pub fn new(auth: SpotifyAuth, requests_per_minute: u32) -> Self {
        Self {
            client: Client::new(),
            auth,
            limiter: RateLimiter::new(requests_per_minute),
            token: tokio::sync::Mutex::new(None),
            user_id: tokio::sync::Mutex::new(None),
        }
    }

    /// App-only client from SPOTIFY_CLIENT_ID / SPOTIFY_CLIENT_SECRET.
    pub fn from_env(requests_per_minute: u32) -> Result<Self> {
        let client_id = env::var("SPOTIFY_CLIENT_ID")
            .map_err(|_| anyhow!("SPOTIFY_CLIENT_ID is not set"))?;
        let client_secret = env::var("SPOTIFY_CLIENT_SECRET")
            .map_err(|_| anyhow!("SPOTIFY_CLIENT_SECRET is not set"))?;
        Ok(Self::new(
            SpotifyAuth::ClientCredentials { client_id, client_secret },
            requests_per_minute,
        ))
    }

    /// User-scoped client; additionally needs SPOTIFY_REFRESH_TOKEN.
    pub fn user_from_env(requests_per_minute: u32) -> Result<Self> {
        let client_id = env::var("SPOTIFY_CLIENT_ID")
            .map_err(|_| anyhow!("SPOTIFY_CLIENT_ID is not set"))?;
        let client_secret = env::var("SPOTIFY_CLIENT_SECRET")
            .map_err(|_| anyhow!("SPOTIFY_CLIENT_SECRET is not set"))?;
        let refresh_token = env::var("SPOTIFY_REFRESH_TOKEN")
            .map_err(|_| anyhow!("SPOTIFY_REFRESH_TOKEN is not set (required for playlist generation)"))?;
        Ok(Self::new(
            SpotifyAuth::RefreshToken { client_id, client_secret, refresh_token },
            requests_per_minute,
        ))
    }

    fn auth_base() -> String {
        env::var("SPOTIFY_AUTH_BASE").unwrap_or_else(|_| "https://accounts.spotify.com".into())
    }

    fn api_base() -> String {
        // include v1 path by default
        env::var("SPOTIFY_API_BASE").unwrap_or_else(|_| "https://api.spotify.com/v1".into())
    }

    async fn ensure_token(&self) -> Result<()> {
        let mut lock = self.token.lock().await;
        let needs_refresh = match &*lock {
            Some(t) => Utc::now().timestamp() + 30 >= t.expires_at,
            None => true,
        };
        if !needs_refresh {
            return Ok(());
        }
        debug!("Fetching fresh Spotify access token");

        let (params, client_id, client_secret): (Vec<(&str, String)>, &str, &str) = match &self.auth {
            SpotifyAuth::ClientCredentials { client_id, client_secret } => (
                vec![("grant_type", "client_credentials".to_string())],
                client_id,
                client_secret,
            ),
            SpotifyAuth::RefreshToken { client_id, client_secret, refresh_token } => (
                vec![
                    ("grant_type", "refresh_token".to_string()),
                    ("refresh_token", refresh_token.clone()),
                ],
                client_id,
                client_secret,
            ),
        };
        let auth_header = format!(
            "Basic {}",
            general_purpose::STANDARD.encode(format!("{}:{}", client_id, client_secret))
        );
        let url = format!("{}/api/token", Self::auth_base());
        let resp = self
            .client
            .post(&url)
            .header(AUTHORIZATION, auth_header)
            .form(&params)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            check_rate_limit_text(&body)?;
            return Err(anyhow!("failed to fetch access token: {} - {}", status, body));
        }
        let j: serde_json::Value = resp.json().await?;
        let access_token = j["access_token"]
            .as_str()
            .ok_or_else(|| anyhow!("no access_token in token response"))?
            .to_string();
        let expires_in = j["expires_in"].as_i64().unwrap_or(3600);
        *lock = Some(StoredToken { access_token, expires_at: Utc::now().timestamp() + expires_in });
        Ok(())
    }

    async fn get_bearer(&self) -> Result<String> {
        self.ensure_token().await?;
        let lock = self.token.lock().await;
        let st = lock.as_ref().ok_or_else(|| anyhow!("no token loaded"))?;
        Ok(format!("Bearer {}", st.access_token))
    }

    /// One throttled request with the full failure policy: read timeouts
    /// retried 3 times with a fixed 30s backoff, 5xx pauses 5s then
    /// propagates, 429 (or rate-limit text) trips the circuit breaker.
    async fn request_json(
        &self,
        method: Method,
        url: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<serde_json::Value> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            self.limiter.acquire().await;
            let bearer = self.get_bearer().await?;
            let mut req = self.client.request(method.clone(), url).header(AUTHORIZATION, &bearer);
            if let Some(b) = body {
                req = req.header(CONTENT_TYPE, "application/json").json(b);
            }
            let resp = match req.send().await {
                Ok(r) => r,
                Err(e) => {
                    if e.is_timeout() {
                        if attempt < TIMEOUT_RETRIES {
                            warn!(
                                "Spotify API timeout (attempt {}/{}): {}",
                                attempt, TIMEOUT_RETRIES, e
                            );
                            info!("Waiting {} seconds before retry...", TIMEOUT_BACKOFF.as_secs());
                            tokio::time::sleep(TIMEOUT_BACKOFF).await;
                            continue;
                        }
                        error!(
                            "Spotify API timeout after {} attempts, giving up: {}",
                            TIMEOUT_RETRIES, e
                        );
                        return Err(e.into());
                    }
                    check_rate_limit_text(&e.to_string())?;
                    return Err(e.into());
                }
            };
            let status = resp.status();
            if status.as_u16() == 429 {
                let body = resp.text().await.unwrap_or_default();
                error!("Spotify API returned HTTP 429 (Too Many Requests).");
                return Err(anyhow::Error::new(RateLimitExceeded {
                    detail: format!("HTTP 429 from {}: {}", url, body),
                }));
            }
            if status.is_server_error() {
                let body = resp.text().await.unwrap_or_default();
                warn!("Server error {}: waiting before continuing...", status);
                tokio::time::sleep(SERVER_ERROR_PAUSE).await;
                return Err(anyhow::Error::new(ApiError { status: status.as_u16(), body }));
            }
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                check_rate_limit_text(&body)?;
                return Err(anyhow::Error::new(ApiError { status: status.as_u16(), body }));
            }
            if status.as_u16() == 204 {
                return Ok(serde_json::Value::Null);
            }
            return Ok(resp.json().await?);
        }
    }

    /// Follow the next-page cursor until exhausted, accumulating items.
    async fn collect_pages(&self, first_url: String) -> Result<Vec<serde_json::Value>> {
        let mut items = Vec::new();
        let mut next = Some(first_url);
        while let Some(url) = next {
            let j = self.request_json(Method::GET, &url, None).await?;
            if let Some(page) = j["items"].as_array() {
                items.extend(page.iter().cloned());
            }
            next = j["next"].as_str().map(|s| s.to_string());
        }
        Ok(items)
    }

    /// Maps an API failure into the validation shape; the quota breaker is
    /// the only error allowed to escape.
    fn validation_parts(e: &anyhow::Error, entity: &str) -> (bool, bool, String) {
        if let Some(api) = e.chain().find_map(|c| c.downcast_ref::<ApiError>()) {
            match api.status {
                404 => (false, false, format!("{} not found or not accessible", entity)),
                403 => (true, false, format!("{} exists but is private/not accessible", entity)),
                401 => (false, false, "Authentication error - check Spotify credentials".to_string()),
                _ => (false, false, format!("Spotify API error: {}", api)),
            }
        } else {
            (false, false, format!("Unexpected error: {}", e))
        }
    }
}

#[async_trait]
impl Catalog for SpotifyClient {
    async fn list_user_playlists(&self, owner: &str) -> Result<Vec<PlaylistSnapshot>> {
        let url = format!(
            "{}/users/{}/playlists?limit=50",
            Self::api_base(),
            url::form_urlencoded::byte_serialize(owner.as_bytes()).collect::<String>()
        );
        let items = self.collect_pages(url).await?;
        Ok(items.iter().map(parse_playlist).collect())
    }

    async fn get_playlist(&self, playlist_id: &str) -> Result<PlaylistSnapshot> {
        let url = format!("{}/playlists/{}", Self::api_base(), playlist_id);
        let j = self.request_json(Method::GET, &url, None).await?;
        Ok(parse_playlist(&j))
    }

    async fn get_playlist_tracks(&self, playlist_id: &str) -> Result<Vec<TrackSnapshot>> {
        let url = format!("{}/playlists/{}/tracks?limit=100", Self::api_base(), playlist_id);
        let items = self.collect_pages(url).await?;
        let mut tracks = Vec::new();
        for item in &items {
            let track = &item["track"];
            // the API can return null/deleted track stubs
            if track["id"].as_str().map_or(true, |s| s.is_empty())
                || track["name"].as_str().map_or(true, |s| s.is_empty())
            {
                warn!("Skipping track with missing essential data: {}", track);
                continue;
            }
            tracks.push(parse_track(track));
        }
        Ok(tracks)
    }

    async fn get_artist(&self, artist_id: &str) -> Result<ArtistSnapshot> {
        let url = format!("{}/artists/{}", Self::api_base(), artist_id);
        let j = self.request_json(Method::GET, &url, None).await?;
        Ok(parse_artist(&j))
    }

    async fn get_artists_batch(
        &self,
        artist_ids: &[String],
    ) -> Result<HashMap<String, ArtistSnapshot>> {
        let mut results = HashMap::new();
        if artist_ids.is_empty() {
            return Ok(results);
        }
        info!(
            "Processing {} artists in batches of {}",
            artist_ids.len(),
            ARTIST_BATCH_SIZE
        );
        for chunk in artist_ids.chunks(ARTIST_BATCH_SIZE) {
            info!("Fetching batch of {} artists", chunk.len());
            let url = format!("{}/artists?ids={}", Self::api_base(), chunk.join(","));
            let j = self.request_json(Method::GET, &url, None).await?;
            if let Some(artists) = j["artists"].as_array() {
                for a in artists {
                    if a.is_null() {
                        continue;
                    }
                    let artist = parse_artist(a);
                    if !artist.id.is_empty() {
                        results.insert(artist.id.clone(), artist);
                    }
                }
            }
        }
        info!("Successfully processed {} artists", results.len());
        Ok(results)
    }

    async fn validate_playlist(&self, playlist_id: &str) -> Result<PlaylistValidation> {
        let playlist_id = util::normalize_playlist_id(playlist_id);
        if playlist_id.is_empty() {
            return Ok(PlaylistValidation {
                valid: false,
                accessible: false,
                info: None,
                error: Some("Invalid playlist ID format: ID must be a non-empty string".into()),
            });
        }
        let url = format!(
            "{}/playlists/{}?fields=id,name,public,owner.id,collaborative,snapshot_id",
            Self::api_base(),
            playlist_id
        );
        match self.request_json(Method::GET, &url, None).await {
            Ok(j) => Ok(PlaylistValidation {
                valid: true,
                accessible: true,
                info: Some(parse_playlist(&j)),
                error: None,
            }),
            Err(e) => {
                if super::is_rate_limit_fatal(&e) {
                    return Err(e);
                }
                let (valid, accessible, error) = Self::validation_parts(&e, "Playlist");
                Ok(PlaylistValidation { valid, accessible, info: None, error: Some(error) })
            }
        }
    }

    async fn validate_user(&self, user_id: &str) -> Result<UserValidation> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Ok(UserValidation {
                valid: false,
                accessible: false,
                error: Some("User ID cannot be empty or whitespace only".into()),
            });
        }
        let url = format!(
            "{}/users/{}",
            Self::api_base(),
            url::form_urlencoded::byte_serialize(user_id.as_bytes()).collect::<String>()
        );
        match self.request_json(Method::GET, &url, None).await {
            Ok(_) => Ok(UserValidation { valid: true, accessible: true, error: None }),
            Err(e) => {
                if super::is_rate_limit_fatal(&e) {
                    return Err(e);
                }
                let (valid, accessible, error) = Self::validation_parts(&e, "User");
                Ok(UserValidation { valid, accessible, error: Some(error) })
            }
        }
    }

    async fn current_user_id(&self) -> Result<String> {
        {
            let g = self.user_id.lock().await;
            if let Some(u) = g.as_ref() {
                return Ok(u.clone());
            }
        }
        let url = format!("{}/me", Self::api_base());
        let j = self.request_json(Method::GET, &url, None).await?;
        let id = j["id"].as_str().ok_or_else(|| anyhow!("no id in /me response"))?.to_string();
        let mut g = self.user_id.lock().await;
        *g = Some(id.clone());
        Ok(id)
    }

    async fn my_playlists(&self) -> Result<Vec<PlaylistSnapshot>> {
        let url = format!("{}/me/playlists?limit=50", Self::api_base());
        let items = self.collect_pages(url).await?;
        Ok(items.iter().map(parse_playlist).collect())
    }

    async fn create_playlist(
        &self,
        name: &str,
        description: &str,
        public: bool,
    ) -> Result<PlaylistSnapshot> {
        let user_id = self.current_user_id().await?;
        info!("Creating playlist '{}' for user: {}", name, user_id);
        let url = format!(
            "{}/users/{}/playlists",
            Self::api_base(),
            url::form_urlencoded::byte_serialize(user_id.as_bytes()).collect::<String>()
        );
        let body = json!({
            "name": name,
            "description": description,
            "public": public
        });
        let j = self.request_json(Method::POST, &url, Some(&body)).await?;
        let playlist = parse_playlist(&j);
        if playlist.id.is_empty() {
            return Err(anyhow!("create playlist returned no id"));
        }
        info!("Created playlist '{}' with ID: {}", name, playlist.id);
        Ok(playlist)
    }

    async fn update_playlist_details(
        &self,
        playlist_id: &str,
        name: &str,
        description: &str,
        public: bool,
    ) -> Result<()> {
        let url = format!("{}/playlists/{}", Self::api_base(), playlist_id);
        let body = json!({
            "name": name,
            "description": description,
            "public": public
        });
        self.request_json(Method::PUT, &url, Some(&body)).await?;
        info!("Successfully updated playlist {}", playlist_id);
        Ok(())
    }

    async fn replace_playlist_tracks(&self, playlist_id: &str, uris: &[String]) -> Result<()> {
        let current: Vec<String> = self
            .get_playlist_tracks(playlist_id)
            .await?
            .into_iter()
            .filter_map(|t| t.uri)
            .collect();
        if !current.is_empty() {
            info!("Removing {} tracks from playlist {}", current.len(), playlist_id);
            for chunk in current.chunks(WRITE_BATCH_SIZE) {
                let url = format!("{}/playlists/{}/tracks", Self::api_base(), playlist_id);
                let tracks: Vec<serde_json::Value> =
                    chunk.iter().map(|u| json!({ "uri": u })).collect();
                let body = json!({ "tracks": tracks });
                self.request_json(Method::DELETE, &url, Some(&body)).await?;
                info!("Removed batch of {} tracks", chunk.len());
            }
        }
        for chunk in uris.chunks(WRITE_BATCH_SIZE) {
            let url = format!("{}/playlists/{}/tracks", Self::api_base(), playlist_id);
            let body = json!({ "uris": chunk });
            self.request_json(Method::POST, &url, Some(&body)).await?;
            info!("Added batch of {} tracks to {}", chunk.len(), playlist_id);
        }
        Ok(())
    }

    async fn search_tracks(&self, query: &str, limit: usize) -> Result<Vec<TrackSnapshot>> {
        let url = format!(
            "{}/search?q={}&type=track&limit={}&market=US",
            Self::api_base(),
            urlencoding::encode(query),
            limit.min(50)
        );
        let j = self.request_json(Method::GET, &url, None).await?;
        let items = j["tracks"]["items"].as_array().cloned().unwrap_or_default();
        Ok(items.iter().map(parse_track).collect())
    }
}
