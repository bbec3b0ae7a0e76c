pub mod limiter;
pub mod mock;
pub mod spotify;

use crate::models::{ArtistSnapshot, PlaylistSnapshot, TrackSnapshot};
use anyhow::Result;
use std::collections::HashMap;
use std::fmt;

/// Outcome of checking a playlist id against the remote service.
/// `valid == false` covers malformed and deleted ids; `accessible == false`
/// with `valid == true` means the playlist exists but is private.
#[derive(Debug, Clone, Default)]
pub struct PlaylistValidation {
    pub valid: bool,
    pub accessible: bool,
    pub info: Option<PlaylistSnapshot>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UserValidation {
    pub valid: bool,
    pub accessible: bool,
    pub error: Option<String>,
}

/// Circuit-breaker error: the remote service reported quota exhaustion.
/// The request budget should make this unreachable, so it is never retried;
/// every layer propagates it untouched and the binary maps it to exit 1.
#[derive(Debug)]
pub struct RateLimitExceeded {
    pub detail: String,
}

impl fmt::Display for RateLimitExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rate limit exceeded: {}", self.detail)
    }
}

impl std::error::Error for RateLimitExceeded {}

/// Non-success HTTP response from the remote API, status preserved so
/// validation can tell 404 from 403 from 401.
#[derive(Debug)]
pub struct ApiError {
    pub status: u16,
    pub body: String,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "spotify api error: {} => {}", self.status, self.body)
    }
}

impl std::error::Error for ApiError {}

/// True if the error chain contains the quota circuit breaker.
pub fn is_rate_limit_fatal(err: &anyhow::Error) -> bool {
    err.chain().any(|c| c.downcast_ref::<RateLimitExceeded>().is_some())
}

/// Capability interface over the remote catalog. All calls are throttled
/// and may sleep internally; list-returning calls follow the next-page
/// cursor to exhaustion.
#[async_trait::async_trait]
pub trait Catalog: Send + Sync {
    async fn list_user_playlists(&self, owner: &str) -> Result<Vec<PlaylistSnapshot>>;

    async fn get_playlist(&self, playlist_id: &str) -> Result<PlaylistSnapshot>;

    async fn get_playlist_tracks(&self, playlist_id: &str) -> Result<Vec<TrackSnapshot>>;

    async fn get_artist(&self, artist_id: &str) -> Result<ArtistSnapshot>;

    /// Batched artist lookup, ≤50 ids per remote call. Callers must
    /// tolerate missing ids in the result map and fall back to
    /// `get_artist`.
    async fn get_artists_batch(
        &self,
        artist_ids: &[String],
    ) -> Result<HashMap<String, ArtistSnapshot>>;

    /// Never returns Err for an invalid or inaccessible playlist — that is
    /// what the return value expresses. Err is reserved for the quota
    /// circuit breaker.
    async fn validate_playlist(&self, playlist_id: &str) -> Result<PlaylistValidation>;

    async fn validate_user(&self, user_id: &str) -> Result<UserValidation>;

    // Write-side operations, used by the playlist-generation subsystem.

    async fn current_user_id(&self) -> Result<String>;

    /// The authenticated user's own playlist library, for ownership checks.
    async fn my_playlists(&self) -> Result<Vec<PlaylistSnapshot>>;

    async fn create_playlist(
        &self,
        name: &str,
        description: &str,
        public: bool,
    ) -> Result<PlaylistSnapshot>;

    async fn update_playlist_details(
        &self,
        playlist_id: &str,
        name: &str,
        description: &str,
        public: bool,
    ) -> Result<()>;

    /// Clear the playlist and add the given URIs, batching writes.
    async fn replace_playlist_tracks(&self, playlist_id: &str, uris: &[String]) -> Result<()>;

    async fn search_tracks(&self, query: &str, limit: usize) -> Result<Vec<TrackSnapshot>>;
}
