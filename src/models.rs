use serde::{Deserialize, Serialize};

/// Kind of change detected for a tracked playlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeType {
    New,
    Modified,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::New => "NEW",
            ChangeType::Modified => "MODIFIED",
        }
    }

    pub fn parse(s: &str) -> ChangeType {
        match s {
            "MODIFIED" => ChangeType::Modified,
            _ => ChangeType::New,
        }
    }
}

/// Playlist metadata as reported by the remote service. The same shape is
/// stored in the playlists table, snapshot_id acting as the change
/// fingerprint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlaylistSnapshot {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub owner_id: String,
    pub snapshot_id: String,
    pub public: bool,
    pub collaborative: bool,
    pub tracks_total: i64,
    pub href: Option<String>,
    pub uri: Option<String>,
}

/// Minimal artist reference embedded in a track payload. Full artist
/// metadata comes from the batched artist lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtistRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackSnapshot {
    pub id: String,
    pub name: String,
    pub duration_ms: i64,
    pub explicit: bool,
    pub popularity: i64,
    pub preview_url: Option<String>,
    pub href: Option<String>,
    pub uri: Option<String>,
    pub external_urls: Option<String>,
    pub album_id: Option<String>,
    pub album_name: Option<String>,
    #[serde(default)]
    pub artists: Vec<ArtistRef>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArtistSnapshot {
    pub id: String,
    pub name: String,
    pub genres: Vec<String>,
    pub popularity: i64,
    pub followers_total: i64,
    pub href: Option<String>,
    pub uri: Option<String>,
    pub external_urls: Option<String>,
}

/// One pending reconciliation work item. A playlist may have several
/// entries; completion deletes all of them by playlist id.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub id: i64,
    pub playlist_id: String,
    pub playlist_name: Option<String>,
    pub change_type: ChangeType,
    pub old_snapshot_id: Option<String>,
    pub new_snapshot_id: Option<String>,
    pub detected_at: String,
}

#[derive(Debug, Clone)]
pub struct StoredSong {
    pub id: String,
    pub name: String,
    pub duration_ms: i64,
    pub explicit: bool,
    pub popularity: i64,
    pub preview_url: Option<String>,
    pub href: Option<String>,
    pub uri: Option<String>,
    pub external_urls: Option<String>,
    pub album_id: Option<String>,
    pub album_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StoredArtist {
    pub id: String,
    pub name: String,
    /// Comma-joined genre list, exactly as persisted.
    pub genres: Option<String>,
    pub popularity: i64,
    pub followers_total: i64,
}

/// Append-only audit record; the action log is the source of truth for
/// what a pass did, independent of log verbosity.
#[derive(Debug, Clone)]
pub struct ActionLogEntry {
    pub id: i64,
    pub action_type: String,
    pub entity_type: String,
    pub entity_id: Option<String>,
    pub entity_name: Option<String>,
    pub reason: String,
    pub details: Option<String>,
    pub success: bool,
    pub error_message: Option<String>,
    pub timestamp: String,
}

/// Result of reconciling stored playlist membership against the remote set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncOutcome {
    pub added: usize,
    pub removed: usize,
    pub songs_added: Vec<String>,
    pub songs_removed: Vec<String>,
}

/// Record of a playlist owned by the generation subsystem.
#[derive(Debug, Clone)]
pub struct ManagedPlaylist {
    pub slug: String,
    pub playlist_id: String,
    pub title: String,
    pub description: String,
    pub public: bool,
    pub add_to_profile: bool,
    pub library_folder: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleanupStats {
    pub playlists_deleted: usize,
    pub playlist_songs_removed: usize,
    pub queue_entries_removed: usize,
    pub orphaned_links_removed: usize,
    pub songs_deleted: usize,
    pub song_artist_links_removed: usize,
    pub artists_deleted: usize,
}

impl CleanupStats {
    pub fn total(&self) -> usize {
        self.playlists_deleted
            + self.orphaned_links_removed
            + self.song_artist_links_removed
            + self.songs_deleted
            + self.artists_deleted
    }
}
