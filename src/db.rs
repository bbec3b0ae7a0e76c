use crate::models::{
    ActionLogEntry, ArtistSnapshot, ChangeType, ManagedPlaylist, PlaylistSnapshot, QueueEntry,
    StoredArtist, StoredSong, SyncOutcome, TrackSnapshot,
};
use anyhow::Result;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::collections::HashSet;
use std::path::Path;

/// Tables are created idempotently on every startup; there is no migration
/// mechanism.
const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS playlists (
    id TEXT PRIMARY KEY,
    name TEXT,
    description TEXT,
    owner_id TEXT,
    snapshot_id TEXT,
    public INTEGER,
    collaborative INTEGER,
    tracks_total INTEGER,
    href TEXT,
    uri TEXT
);

CREATE TABLE IF NOT EXISTS queue (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    playlist_id TEXT NOT NULL,
    playlist_name TEXT,
    change_type TEXT NOT NULL,
    old_snapshot_id TEXT,
    new_snapshot_id TEXT,
    detected_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS action_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    action_type TEXT NOT NULL,
    entity_type TEXT NOT NULL,
    entity_id TEXT,
    entity_name TEXT,
    reason TEXT NOT NULL,
    details TEXT,
    success INTEGER NOT NULL DEFAULT 0,
    error_message TEXT,
    timestamp TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS songs (
    id TEXT PRIMARY KEY,
    name TEXT,
    duration_ms INTEGER,
    explicit INTEGER,
    popularity INTEGER,
    preview_url TEXT,
    href TEXT,
    uri TEXT,
    external_urls TEXT,
    album_id TEXT,
    album_name TEXT
);

CREATE TABLE IF NOT EXISTS artists (
    id TEXT PRIMARY KEY,
    name TEXT,
    genres TEXT,
    popularity INTEGER,
    followers_total INTEGER,
    href TEXT,
    uri TEXT,
    external_urls TEXT
);

CREATE TABLE IF NOT EXISTS playlist_songs (
    playlist_id TEXT NOT NULL,
    song_id TEXT NOT NULL,
    PRIMARY KEY (playlist_id, song_id)
);

CREATE TABLE IF NOT EXISTS song_artists (
    song_id TEXT NOT NULL,
    artist_id TEXT NOT NULL,
    PRIMARY KEY (song_id, artist_id)
);

CREATE TABLE IF NOT EXISTS managed_playlists (
    slug TEXT PRIMARY KEY,
    playlist_id TEXT NOT NULL,
    title TEXT NOT NULL,
    description TEXT,
    public INTEGER NOT NULL DEFAULT 0,
    add_to_profile INTEGER NOT NULL DEFAULT 0,
    library_folder TEXT
);
";

pub fn open_or_create(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let conn = Connection::open(path)?;
    create_tables(&conn)?;
    Ok(conn)
}

pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

// --- Playlists ---

pub fn upsert_playlist(conn: &Connection, playlist: &PlaylistSnapshot) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO playlists (id, name, description, owner_id, snapshot_id, public, collaborative, tracks_total, href, uri) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            playlist.id,
            playlist.name,
            playlist.description,
            playlist.owner_id,
            playlist.snapshot_id,
            playlist.public as i64,
            playlist.collaborative as i64,
            playlist.tracks_total,
            playlist.href,
            playlist.uri,
        ],
    )?;
    Ok(())
}

pub fn get_playlist_by_id(conn: &Connection, playlist_id: &str) -> Result<Option<PlaylistSnapshot>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, description, owner_id, snapshot_id, public, collaborative, tracks_total, href, uri FROM playlists WHERE id = ?1",
    )?;
    let row = stmt
        .query_row(params![playlist_id], |r| {
            Ok(PlaylistSnapshot {
                id: r.get(0)?,
                name: r.get(1)?,
                description: r.get(2)?,
                owner_id: r.get(3)?,
                snapshot_id: r.get(4)?,
                public: r.get::<_, i64>(5)? != 0,
                collaborative: r.get::<_, i64>(6)? != 0,
                tracks_total: r.get(7)?,
                href: r.get(8)?,
                uri: r.get(9)?,
            })
        })
        .optional()?;
    Ok(row)
}

pub fn get_playlist_snapshot_id(conn: &Connection, playlist_id: &str) -> Result<Option<String>> {
    let mut stmt = conn.prepare("SELECT snapshot_id FROM playlists WHERE id = ?1 LIMIT 1")?;
    let row = stmt
        .query_row(params![playlist_id], |r| r.get::<_, String>(0))
        .optional()?;
    Ok(row)
}

pub fn delete_playlist(conn: &Connection, playlist_id: &str) -> Result<()> {
    conn.execute("DELETE FROM playlists WHERE id = ?1", params![playlist_id])?;
    Ok(())
}

// --- Reconciliation queue ---

pub fn enqueue_change(
    conn: &Connection,
    playlist_id: &str,
    playlist_name: &str,
    change_type: ChangeType,
    old_snapshot_id: Option<&str>,
    new_snapshot_id: &str,
) -> Result<()> {
    conn.execute(
        "INSERT INTO queue (playlist_id, playlist_name, change_type, old_snapshot_id, new_snapshot_id) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![playlist_id, playlist_name, change_type.as_str(), old_snapshot_id, new_snapshot_id],
    )?;
    Ok(())
}

fn map_queue_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<QueueEntry> {
    let change: String = r.get(3)?;
    Ok(QueueEntry {
        id: r.get(0)?,
        playlist_id: r.get(1)?,
        playlist_name: r.get(2)?,
        change_type: ChangeType::parse(&change),
        old_snapshot_id: r.get(4)?,
        new_snapshot_id: r.get(5)?,
        detected_at: r.get(6)?,
    })
}

pub fn get_queue(conn: &Connection) -> Result<Vec<QueueEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, playlist_id, playlist_name, change_type, old_snapshot_id, new_snapshot_id, detected_at FROM queue ORDER BY detected_at DESC, id DESC",
    )?;
    let rows = stmt.query_map([], |r| map_queue_row(r))?;
    let mut v = Vec::new();
    for r in rows {
        v.push(r?);
    }
    Ok(v)
}

pub fn get_queue_for_playlist(conn: &Connection, playlist_id: &str) -> Result<Vec<QueueEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, playlist_id, playlist_name, change_type, old_snapshot_id, new_snapshot_id, detected_at FROM queue WHERE playlist_id = ?1 ORDER BY detected_at DESC, id DESC",
    )?;
    let rows = stmt.query_map(params![playlist_id], |r| map_queue_row(r))?;
    let mut v = Vec::new();
    for r in rows {
        v.push(r?);
    }
    Ok(v)
}

/// Removes every queue entry for the playlist. Deleting an id with no
/// matching rows is a no-op, which makes completion idempotent per playlist.
pub fn delete_queue_for_playlist(conn: &Connection, playlist_id: &str) -> Result<usize> {
    let removed = conn.execute("DELETE FROM queue WHERE playlist_id = ?1", params![playlist_id])?;
    Ok(removed)
}

pub fn clear_queue(conn: &Connection) -> Result<usize> {
    let removed = conn.execute("DELETE FROM queue", [])?;
    Ok(removed)
}

// --- Songs ---

pub fn upsert_song(conn: &Connection, track: &TrackSnapshot) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO songs (id, name, duration_ms, explicit, popularity, preview_url, href, uri, external_urls, album_id, album_name) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            track.id,
            track.name,
            track.duration_ms,
            track.explicit as i64,
            track.popularity,
            track.preview_url,
            track.href,
            track.uri,
            track.external_urls,
            track.album_id,
            track.album_name,
        ],
    )?;
    Ok(())
}

fn map_song_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<StoredSong> {
    Ok(StoredSong {
        id: r.get(0)?,
        name: r.get(1)?,
        duration_ms: r.get(2)?,
        explicit: r.get::<_, i64>(3)? != 0,
        popularity: r.get(4)?,
        preview_url: r.get(5)?,
        href: r.get(6)?,
        uri: r.get(7)?,
        external_urls: r.get(8)?,
        album_id: r.get(9)?,
        album_name: r.get(10)?,
    })
}

pub fn get_song_by_id(conn: &Connection, song_id: &str) -> Result<Option<StoredSong>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, duration_ms, explicit, popularity, preview_url, href, uri, external_urls, album_id, album_name FROM songs WHERE id = ?1",
    )?;
    let row = stmt.query_row(params![song_id], |r| map_song_row(r)).optional()?;
    Ok(row)
}

/// Random selection of songs within a popularity band; feeds the
/// hidden-gems generator.
pub fn get_filtered_songs(
    conn: &Connection,
    min_popularity: i64,
    max_popularity: i64,
    limit: usize,
) -> Result<Vec<StoredSong>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, duration_ms, explicit, popularity, preview_url, href, uri, external_urls, album_id, album_name FROM songs WHERE popularity BETWEEN ?1 AND ?2 ORDER BY RANDOM() LIMIT ?3",
    )?;
    let rows = stmt.query_map(params![min_popularity, max_popularity, limit as i64], |r| map_song_row(r))?;
    let mut v = Vec::new();
    for r in rows {
        v.push(r?);
    }
    Ok(v)
}

pub fn delete_song(conn: &Connection, song_id: &str) -> Result<()> {
    conn.execute("DELETE FROM songs WHERE id = ?1", params![song_id])?;
    Ok(())
}

// --- Artists ---

pub fn upsert_artist(conn: &Connection, artist: &ArtistSnapshot) -> Result<()> {
    let genres_str = if artist.genres.is_empty() {
        None
    } else {
        Some(artist.genres.join(", "))
    };
    conn.execute(
        "INSERT OR REPLACE INTO artists (id, name, genres, popularity, followers_total, href, uri, external_urls) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            artist.id,
            artist.name,
            genres_str,
            artist.popularity,
            artist.followers_total,
            artist.href,
            artist.uri,
            artist.external_urls,
        ],
    )?;
    Ok(())
}

pub fn get_artist_by_id(conn: &Connection, artist_id: &str) -> Result<Option<StoredArtist>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, genres, popularity, followers_total FROM artists WHERE id = ?1",
    )?;
    let row = stmt
        .query_row(params![artist_id], |r| {
            Ok(StoredArtist {
                id: r.get(0)?,
                name: r.get(1)?,
                genres: r.get(2)?,
                popularity: r.get(3)?,
                followers_total: r.get(4)?,
            })
        })
        .optional()?;
    Ok(row)
}

pub fn delete_artist(conn: &Connection, artist_id: &str) -> Result<()> {
    conn.execute("DELETE FROM artists WHERE id = ?1", params![artist_id])?;
    Ok(())
}

// --- Playlist-song junction ---

pub fn insert_playlist_song(conn: &Connection, playlist_id: &str, song_id: &str) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO playlist_songs (playlist_id, song_id) VALUES (?1, ?2)",
        params![playlist_id, song_id],
    )?;
    Ok(())
}

pub fn delete_playlist_song(conn: &Connection, playlist_id: &str, song_id: &str) -> Result<()> {
    conn.execute(
        "DELETE FROM playlist_songs WHERE playlist_id = ?1 AND song_id = ?2",
        params![playlist_id, song_id],
    )?;
    Ok(())
}

pub fn song_ids_in_playlist(conn: &Connection, playlist_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT song_id FROM playlist_songs WHERE playlist_id = ?1")?;
    let rows = stmt.query_map(params![playlist_id], |r| r.get::<_, String>(0))?;
    let mut v = Vec::new();
    for r in rows {
        v.push(r?);
    }
    Ok(v)
}

/// Make stored membership for the playlist equal the current remote id set
/// with minimal add/remove operations. Replaying the same set is a no-op.
pub fn sync_playlist_songs(
    conn: &Connection,
    playlist_id: &str,
    current_song_ids: &[String],
) -> Result<SyncOutcome> {
    let stored: HashSet<String> = song_ids_in_playlist(conn, playlist_id)?.into_iter().collect();
    let current: HashSet<String> = current_song_ids.iter().cloned().collect();

    let mut songs_added: Vec<String> = current.difference(&stored).cloned().collect();
    let mut songs_removed: Vec<String> = stored.difference(&current).cloned().collect();
    // stable order for logging
    songs_added.sort();
    songs_removed.sort();

    for song_id in &songs_added {
        insert_playlist_song(conn, playlist_id, song_id)?;
    }
    for song_id in &songs_removed {
        delete_playlist_song(conn, playlist_id, song_id)?;
    }

    Ok(SyncOutcome {
        added: songs_added.len(),
        removed: songs_removed.len(),
        songs_added,
        songs_removed,
    })
}

// --- Song-artist junction ---

pub fn insert_song_artist(conn: &Connection, song_id: &str, artist_id: &str) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO song_artists (song_id, artist_id) VALUES (?1, ?2)",
        params![song_id, artist_id],
    )?;
    Ok(())
}

pub fn artist_ids_for_song(conn: &Connection, song_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT artist_id FROM song_artists WHERE song_id = ?1")?;
    let rows = stmt.query_map(params![song_id], |r| r.get::<_, String>(0))?;
    let mut v = Vec::new();
    for r in rows {
        v.push(r?);
    }
    Ok(v)
}

// --- Orphan queries ---

/// Playlists no longer in the tracked set. An empty tracked set orphans
/// everything.
pub fn get_orphaned_playlists(
    conn: &Connection,
    tracked_ids: &[String],
) -> Result<Vec<(String, String)>> {
    let mut v = Vec::new();
    if tracked_ids.is_empty() {
        let mut stmt = conn.prepare("SELECT id, name FROM playlists")?;
        let rows = stmt.query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)))?;
        for r in rows {
            v.push(r?);
        }
        return Ok(v);
    }
    let placeholders = vec!["?"; tracked_ids.len()].join(",");
    let query = format!("SELECT id, name FROM playlists WHERE id NOT IN ({})", placeholders);
    let mut stmt = conn.prepare(&query)?;
    let rows = stmt.query_map(params_from_iter(tracked_ids.iter()), |r| {
        Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
    })?;
    for r in rows {
        v.push(r?);
    }
    Ok(v)
}

/// Junction and queue rows go first so the playlist row is never the last
/// thing referencing them. Returns (junction rows removed, queue rows
/// removed).
pub fn delete_playlist_and_relationships(
    conn: &Connection,
    playlist_id: &str,
) -> Result<(usize, usize)> {
    let songs_removed =
        conn.execute("DELETE FROM playlist_songs WHERE playlist_id = ?1", params![playlist_id])?;
    let queue_removed =
        conn.execute("DELETE FROM queue WHERE playlist_id = ?1", params![playlist_id])?;
    conn.execute("DELETE FROM playlists WHERE id = ?1", params![playlist_id])?;
    Ok((songs_removed, queue_removed))
}

pub fn delete_orphaned_playlist_songs(conn: &Connection) -> Result<usize> {
    let removed = conn.execute(
        "DELETE FROM playlist_songs WHERE playlist_id NOT IN (SELECT id FROM playlists)",
        [],
    )?;
    Ok(removed)
}

pub fn get_orphaned_songs(conn: &Connection) -> Result<Vec<(String, String)>> {
    let mut stmt = conn.prepare(
        "SELECT s.id, s.name FROM songs s LEFT JOIN playlist_songs ps ON s.id = ps.song_id WHERE ps.song_id IS NULL",
    )?;
    let rows = stmt.query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)))?;
    let mut v = Vec::new();
    for r in rows {
        v.push(r?);
    }
    Ok(v)
}

pub fn delete_orphaned_song_artists(conn: &Connection) -> Result<usize> {
    let removed = conn.execute(
        "DELETE FROM song_artists WHERE song_id NOT IN (SELECT id FROM songs)",
        [],
    )?;
    Ok(removed)
}

pub fn get_orphaned_artists(conn: &Connection) -> Result<Vec<(String, String)>> {
    let mut stmt = conn.prepare(
        "SELECT a.id, a.name FROM artists a LEFT JOIN song_artists sa ON a.id = sa.artist_id WHERE sa.artist_id IS NULL",
    )?;
    let rows = stmt.query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)))?;
    let mut v = Vec::new();
    for r in rows {
        v.push(r?);
    }
    Ok(v)
}

// --- Action log ---

#[allow(clippy::too_many_arguments)]
pub fn log_action(
    conn: &Connection,
    action_type: &str,
    entity_type: &str,
    entity_id: Option<&str>,
    entity_name: Option<&str>,
    reason: &str,
    details: Option<&str>,
    success: bool,
    error_message: Option<&str>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO action_log (action_type, entity_type, entity_id, entity_name, reason, details, success, error_message) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            action_type,
            entity_type,
            entity_id,
            entity_name,
            reason,
            details,
            success as i64,
            error_message,
        ],
    )?;
    Ok(())
}

#[derive(Debug, Default, Clone)]
pub struct ActionLogFilter<'a> {
    pub action_type: Option<&'a str>,
    pub entity_type: Option<&'a str>,
    pub entity_id: Option<&'a str>,
    pub success: Option<bool>,
    pub limit: Option<usize>,
}

pub fn get_action_logs(conn: &Connection, filter: &ActionLogFilter<'_>) -> Result<Vec<ActionLogEntry>> {
    let mut query = String::from(
        "SELECT id, action_type, entity_type, entity_id, entity_name, reason, details, success, error_message, timestamp FROM action_log WHERE 1=1",
    );
    let mut args: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
    if let Some(at) = filter.action_type {
        query.push_str(" AND action_type = ?");
        args.push(Box::new(at.to_string()));
    }
    if let Some(et) = filter.entity_type {
        query.push_str(" AND entity_type = ?");
        args.push(Box::new(et.to_string()));
    }
    if let Some(eid) = filter.entity_id {
        query.push_str(" AND entity_id = ?");
        args.push(Box::new(eid.to_string()));
    }
    if let Some(s) = filter.success {
        query.push_str(" AND success = ?");
        args.push(Box::new(s as i64));
    }
    query.push_str(" ORDER BY timestamp DESC, id DESC");
    if let Some(limit) = filter.limit {
        query.push_str(&format!(" LIMIT {}", limit));
    }

    let mut stmt = conn.prepare(&query)?;
    let rows = stmt.query_map(params_from_iter(args.iter().map(|a| a.as_ref())), |r| {
        Ok(ActionLogEntry {
            id: r.get(0)?,
            action_type: r.get(1)?,
            entity_type: r.get(2)?,
            entity_id: r.get(3)?,
            entity_name: r.get(4)?,
            reason: r.get(5)?,
            details: r.get(6)?,
            success: r.get::<_, i64>(7)? != 0,
            error_message: r.get(8)?,
            timestamp: r.get(9)?,
        })
    })?;
    let mut v = Vec::new();
    for r in rows {
        v.push(r?);
    }
    Ok(v)
}

/// Retention purge; the only path that ever deletes audit rows.
pub fn clear_old_action_logs(conn: &Connection, days_to_keep: u32) -> Result<usize> {
    let cutoff = format!("-{} days", days_to_keep);
    let removed = conn.execute(
        "DELETE FROM action_log WHERE timestamp < datetime('now', ?1)",
        params![cutoff],
    )?;
    Ok(removed)
}

// --- Managed playlists (generation subsystem) ---

pub fn save_managed_playlist(conn: &Connection, managed: &ManagedPlaylist) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO managed_playlists (slug, playlist_id, title, description, public, add_to_profile, library_folder) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            managed.slug,
            managed.playlist_id,
            managed.title,
            managed.description,
            managed.public as i64,
            managed.add_to_profile as i64,
            managed.library_folder,
        ],
    )?;
    Ok(())
}

fn map_managed_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<ManagedPlaylist> {
    Ok(ManagedPlaylist {
        slug: r.get(0)?,
        playlist_id: r.get(1)?,
        title: r.get(2)?,
        description: r.get::<_, Option<String>>(3)?.unwrap_or_default(),
        public: r.get::<_, i64>(4)? != 0,
        add_to_profile: r.get::<_, i64>(5)? != 0,
        library_folder: r.get(6)?,
    })
}

pub fn get_managed_playlist(conn: &Connection, slug: &str) -> Result<Option<ManagedPlaylist>> {
    let mut stmt = conn.prepare(
        "SELECT slug, playlist_id, title, description, public, add_to_profile, library_folder FROM managed_playlists WHERE slug = ?1",
    )?;
    let row = stmt.query_row(params![slug], |r| map_managed_row(r)).optional()?;
    Ok(row)
}

pub fn get_all_managed_playlists(conn: &Connection) -> Result<Vec<ManagedPlaylist>> {
    let mut stmt = conn.prepare(
        "SELECT slug, playlist_id, title, description, public, add_to_profile, library_folder FROM managed_playlists",
    )?;
    let rows = stmt.query_map([], |r| map_managed_row(r))?;
    let mut v = Vec::new();
    for r in rows {
        v.push(r?);
    }
    Ok(v)
}

pub fn delete_managed_playlist(conn: &Connection, slug: &str) -> Result<()> {
    conn.execute("DELETE FROM managed_playlists WHERE slug = ?1", params![slug])?;
    Ok(())
}
