use crate::api::{is_rate_limit_fatal, Catalog};
use crate::db;
use crate::models::{SyncOutcome, TrackSnapshot};
use anyhow::Result;
use log::{error, info, warn};
use rusqlite::Connection;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Default, Clone)]
pub struct ReconcileOptions {
    /// Rewrite song/artist metadata for tracks already in the store
    /// instead of treating first-sight metadata as final.
    pub refresh_track_metadata: bool,
}

/// Drain the reconciliation queue: for each distinct queued playlist,
/// re-validate it, fetch its authoritative track list, store unseen songs
/// and artists, and reconcile membership. One playlist's failure never
/// aborts the batch; its queue entries are kept so it is retried on the
/// next pass. The quota circuit breaker is the only error that stops the
/// whole drain.
pub async fn process_queue(
    conn: &Connection,
    catalog: &dyn Catalog,
    opts: &ReconcileOptions,
) -> Result<()> {
    let entries = db::get_queue(conn)?;
    let mut seen: HashSet<String> = HashSet::new();

    for entry in entries {
        // several entries may exist per playlist; one sync clears them all
        if !seen.insert(entry.playlist_id.clone()) {
            continue;
        }
        let playlist_id = entry.playlist_id;
        let playlist_name = entry.playlist_name.unwrap_or_default();
        info!("Processing queued playlist: {}", playlist_name);

        info!("Validating accessibility for playlist: {}", playlist_name);
        let validation = catalog.validate_playlist(&playlist_id).await?;

        if !validation.valid {
            let err_text = validation.error.unwrap_or_else(|| "unknown validation error".into());
            error!(
                "Playlist '{}' (ID: {}) is no longer valid: {}",
                playlist_name, playlist_id, err_text
            );
            db::log_action(
                conn,
                "REMOVE_FROM_QUEUE",
                "PLAYLIST",
                Some(&playlist_id),
                Some(&playlist_name),
                "Playlist validation failed - no longer exists or invalid ID",
                Some(&format!("Validation error: {}", err_text)),
                true,
                None,
            )?;
            db::delete_queue_for_playlist(conn, &playlist_id)?;
            info!("Removed invalid playlist '{}' from processing queue", playlist_name);
            continue;
        }

        if !validation.accessible {
            let err_text = validation.error.unwrap_or_else(|| "unknown accessibility error".into());
            warn!(
                "Playlist '{}' (ID: {}) is no longer accessible: {}",
                playlist_name, playlist_id, err_text
            );
            db::log_action(
                conn,
                "REMOVE_FROM_QUEUE",
                "PLAYLIST",
                Some(&playlist_id),
                Some(&playlist_name),
                "Playlist became inaccessible - private or permissions changed",
                Some(&format!("Accessibility error: {}", err_text)),
                true,
                None,
            )?;
            db::delete_queue_for_playlist(conn, &playlist_id)?;
            info!("Removed inaccessible playlist '{}' from processing queue", playlist_name);
            continue;
        }

        info!("Playlist '{}' is accessible. Starting sync...", playlist_name);
        db::log_action(
            conn,
            "SYNC_START",
            "PLAYLIST",
            Some(&playlist_id),
            Some(&playlist_name),
            "Playlist passed validation checks and is ready for sync",
            None,
            true,
            None,
        )?;

        match sync_playlist(conn, catalog, &playlist_id, opts).await {
            Ok(outcome) => {
                info!("Playlist sync complete for '{}':", playlist_name);
                info!("  Songs added: {}", outcome.added);
                info!("  Songs removed: {}", outcome.removed);
                db::log_action(
                    conn,
                    "SYNC_COMPLETE",
                    "PLAYLIST",
                    Some(&playlist_id),
                    Some(&playlist_name),
                    "Playlist sync completed successfully",
                    Some(&format!(
                        "Added: {} songs, Removed: {} songs",
                        outcome.added, outcome.removed
                    )),
                    true,
                    None,
                )?;
                info!("Removing '{}' from processing queue...", playlist_name);
                db::delete_queue_for_playlist(conn, &playlist_id)?;
            }
            Err(e) => {
                if is_rate_limit_fatal(&e) {
                    return Err(e);
                }
                error!("Error syncing playlist '{}': {}", playlist_name, e);
                db::log_action(
                    conn,
                    "SYNC_FAILED",
                    "PLAYLIST",
                    Some(&playlist_id),
                    Some(&playlist_name),
                    "Playlist sync failed due to unexpected error",
                    Some(&format!("Error: {}", e)),
                    false,
                    Some(&e.to_string()),
                )?;
                // queue entries deliberately kept: the playlist is retried
                // on the next pass
            }
        }
    }
    Ok(())
}

async fn sync_playlist(
    conn: &Connection,
    catalog: &dyn Catalog,
    playlist_id: &str,
    opts: &ReconcileOptions,
) -> Result<SyncOutcome> {
    let tracks = catalog.get_playlist_tracks(playlist_id).await?;

    let mut current_song_ids: Vec<String> = Vec::new();
    let mut new_tracks: Vec<TrackSnapshot> = Vec::new();
    for track in tracks {
        if track.id.is_empty() || track.name.is_empty() {
            warn!("Skipping track with missing data: {:?}", track);
            continue;
        }
        current_song_ids.push(track.id.clone());
        let known = db::get_song_by_id(conn, &track.id)?.is_some();
        if !known || opts.refresh_track_metadata {
            new_tracks.push(track);
        }
    }

    if !new_tracks.is_empty() {
        info!("Batch processing artist info for {} new tracks", new_tracks.len());
        // one batch sequence over the union of artist ids, not one call per track
        let mut artist_ids: Vec<String> = Vec::new();
        let mut seen_artists: HashSet<String> = HashSet::new();
        for track in &new_tracks {
            for artist in &track.artists {
                if seen_artists.insert(artist.id.clone()) {
                    artist_ids.push(artist.id.clone());
                }
            }
        }
        let artist_data = if artist_ids.is_empty() {
            HashMap::new()
        } else {
            catalog.get_artists_batch(&artist_ids).await?
        };

        for track in &new_tracks {
            db::upsert_song(conn, track)?;
            for artist in &track.artists {
                let artist_info = match artist_data.get(&artist.id) {
                    Some(a) => a.clone(),
                    None => {
                        warn!("Artist {} not found in batch, fetching individually", artist.id);
                        catalog.get_artist(&artist.id).await?
                    }
                };
                db::upsert_artist(conn, &artist_info)?;
                db::insert_song_artist(conn, &track.id, &artist.id)?;
            }
        }
    }

    db::sync_playlist_songs(conn, playlist_id, &current_song_ids)
}
