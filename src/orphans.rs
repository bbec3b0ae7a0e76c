use crate::db;
use crate::models::CleanupStats;
use anyhow::Result;
use log::{error, info};
use rusqlite::Connection;

/// Remove every row no longer reachable from the currently-tracked
/// playlist set. Stage order matters: playlists (with their junction and
/// queue rows) go first, then stale playlist-song links, then unreferenced
/// songs, then stale song-artist links, then unreferenced artists — each
/// stage makes the next stage's orphans visible, so a single sweep fully
/// cascades. Stage failures are logged and do not stop later stages.
pub fn collect_orphans(conn: &Connection, tracked_ids: &[String]) -> Result<CleanupStats> {
    info!("Starting comprehensive orphan cleanup...");
    info!("Currently tracking {} playlist(s)", tracked_ids.len());
    let mut stats = CleanupStats::default();

    info!("Cleaning up orphaned playlists...");
    match db::get_orphaned_playlists(conn, tracked_ids) {
        Ok(orphaned) => {
            if orphaned.is_empty() {
                info!("No orphaned playlists found");
            } else {
                info!("Found {} orphaned playlist(s) to remove", orphaned.len());
                for (playlist_id, playlist_name) in orphaned {
                    info!("Removing orphaned playlist: '{}' (ID: {})", playlist_name, playlist_id);
                    match db::delete_playlist_and_relationships(conn, &playlist_id) {
                        Ok((songs_removed, queue_removed)) => {
                            stats.playlists_deleted += 1;
                            stats.playlist_songs_removed += songs_removed;
                            stats.queue_entries_removed += queue_removed;
                        }
                        Err(e) => {
                            error!("Failed to delete playlist '{}': {}", playlist_name, e);
                        }
                    }
                }
            }
        }
        Err(e) => error!("Error during orphaned playlist cleanup: {}", e),
    }

    info!("Cleaning up orphaned playlist-song relationships...");
    match db::delete_orphaned_playlist_songs(conn) {
        Ok(n) => {
            stats.orphaned_links_removed = n;
            if n > 0 {
                info!("Removed {} orphaned playlist-song relationship(s)", n);
            } else {
                info!("No orphaned playlist-song relationships found");
            }
        }
        Err(e) => error!("Error cleaning up orphaned playlist-song relationships: {}", e),
    }

    info!("Cleaning up orphaned songs...");
    match db::get_orphaned_songs(conn) {
        Ok(orphaned) => {
            if orphaned.is_empty() {
                info!("No orphaned songs found");
            } else {
                info!("Found {} orphaned song(s) to delete", orphaned.len());
                for (song_id, song_name) in orphaned {
                    info!("Deleting orphaned song: '{}' (ID: {})", song_name, song_id);
                    match db::delete_song(conn, &song_id) {
                        Ok(()) => stats.songs_deleted += 1,
                        Err(e) => error!("Failed to delete song '{}': {}", song_name, e),
                    }
                }
            }
        }
        Err(e) => error!("Error during orphaned songs cleanup: {}", e),
    }

    info!("Cleaning up orphaned song-artist relationships...");
    match db::delete_orphaned_song_artists(conn) {
        Ok(n) => {
            stats.song_artist_links_removed = n;
            if n > 0 {
                info!("Removed {} orphaned song-artist relationship(s)", n);
            } else {
                info!("No orphaned song-artist relationships found");
            }
        }
        Err(e) => error!("Error cleaning up orphaned song-artist relationships: {}", e),
    }

    info!("Cleaning up orphaned artists...");
    match db::get_orphaned_artists(conn) {
        Ok(orphaned) => {
            if orphaned.is_empty() {
                info!("No orphaned artists found");
            } else {
                info!("Found {} orphaned artist(s) to delete", orphaned.len());
                for (artist_id, artist_name) in orphaned {
                    info!("Deleting orphaned artist: '{}' (ID: {})", artist_name, artist_id);
                    match db::delete_artist(conn, &artist_id) {
                        Ok(()) => stats.artists_deleted += 1,
                        Err(e) => error!("Failed to delete artist '{}': {}", artist_name, e),
                    }
                }
            }
        }
        Err(e) => error!("Error during orphaned artists cleanup: {}", e),
    }

    info!("Orphan cleanup results:");
    info!("  Orphaned playlists deleted: {}", stats.playlists_deleted);
    info!("    Playlist-song relationships removed: {}", stats.playlist_songs_removed);
    info!("    Queue entries removed: {}", stats.queue_entries_removed);
    info!("  Orphaned playlist-song links cleaned: {}", stats.orphaned_links_removed);
    info!("  Orphaned songs deleted: {}", stats.songs_deleted);
    info!("  Orphaned song-artist links cleaned: {}", stats.song_artist_links_removed);
    info!("  Orphaned artists deleted: {}", stats.artists_deleted);

    if stats.total() > 0 {
        info!("Cleanup complete: {} total items removed", stats.total());
    } else {
        info!("Cleanup complete: Database is already clean");
    }

    Ok(stats)
}
