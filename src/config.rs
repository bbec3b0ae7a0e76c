use anyhow::bail;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Users whose playlist libraries are tracked in full.
    #[serde(default)]
    pub usernames: Vec<String>,

    /// Individual playlists to track, as bare ids, spotify:playlist: URIs
    /// or open.spotify.com links.
    #[serde(default)]
    pub playlists_to_track: Vec<String>,

    // path to database file
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Request ceiling against the remote API, per rolling 60 seconds.
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,

    /// When true, song and artist metadata is rewritten on every sync pass
    /// instead of only when a track is first seen.
    #[serde(default)]
    pub refresh_track_metadata: bool,

    /// Action-log rows older than this many days are removed by `logs-prune`.
    #[serde(default = "default_log_retention_days")]
    pub log_retention_days: u32,
}

fn default_db_path() -> PathBuf { "databases/spotify.db".into() }
fn default_log_dir() -> PathBuf { "logs".into() }
fn default_requests_per_minute() -> u32 { 90 }
fn default_log_retention_days() -> u32 { 30 }

impl Config {
    pub fn from_path(path: &std::path::Path) -> anyhow::Result<Self> {
        let s = std::fs::read_to_string(path)?;
        let cfg: Config = toml::from_str(&s)?;
        Ok(cfg)
    }

    /// A config that names neither users nor playlists has nothing to sync.
    pub fn validate(&self) -> anyhow::Result<()> {
        let has_users = self.usernames.iter().any(|u| !u.trim().is_empty());
        let has_playlists = self.playlists_to_track.iter().any(|p| !p.trim().is_empty());
        if !has_users && !has_playlists {
            bail!("configuration must contain either usernames or playlists_to_track");
        }
        Ok(())
    }
}
