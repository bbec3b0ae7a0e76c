use crate::db;
use crate::models::{ChangeType, PlaylistSnapshot};
use anyhow::Result;
use log::{error, info};
use rusqlite::Connection;

/// Playlists whose display name contains this marker were produced by the
/// generation subsystem and are never queued for sync, to prevent the
/// engine from reconciling its own output. This is a plain substring test:
/// a user playlist that happens to contain the marker is skipped too.
pub const AUTO_PLAYLIST_MARKER: &str = "#auto";

#[derive(Debug, Default, Clone, PartialEq)]
pub struct DiffSummary {
    pub queued_new: usize,
    pub queued_modified: usize,
    pub skipped: usize,
}

/// Classify every remote snapshot against the stored fingerprint, enqueue
/// NEW/MODIFIED playlists, then refresh every stored playlist row
/// regardless of classification. A failure on one playlist never aborts
/// the others.
pub fn detect_changes(conn: &Connection, snapshots: &[PlaylistSnapshot]) -> Result<DiffSummary> {
    info!("Checking for playlist modifications...");
    let mut summary = DiffSummary::default();

    for playlist in snapshots {
        if playlist.name.contains(AUTO_PLAYLIST_MARKER) {
            info!("Skipping auto playlist: '{}' (ID: {})", playlist.name, playlist.id);
            if let Err(e) = db::log_action(
                conn,
                "SKIP",
                "PLAYLIST",
                Some(&playlist.id),
                Some(&playlist.name),
                "Auto playlist detected - contains '#auto' in name",
                Some("Auto playlists are excluded from sync to prevent sync loops"),
                true,
                None,
            ) {
                error!("Failed to record skip for '{}': {}", playlist.name, e);
            }
            summary.skipped += 1;
            continue;
        }

        let old_snapshot = match db::get_playlist_snapshot_id(conn, &playlist.id) {
            Ok(s) => s,
            Err(e) => {
                error!(
                    "Failed to read stored snapshot for '{}' (ID: {}): {}",
                    playlist.name, playlist.id, e
                );
                continue;
            }
        };

        match old_snapshot {
            None => {
                info!("NEW: '{}' (ID: {})", playlist.name, playlist.id);
                if let Err(e) = enqueue(conn, playlist, ChangeType::New, None) {
                    error!("Failed to queue new playlist '{}': {}", playlist.name, e);
                    continue;
                }
                summary.queued_new += 1;
            }
            Some(old) if old != playlist.snapshot_id => {
                info!("MODIFIED: '{}' (ID: {})", playlist.name, playlist.id);
                info!("  Old snapshot: {}", old);
                info!("  New snapshot: {}", playlist.snapshot_id);
                if let Err(e) = enqueue(conn, playlist, ChangeType::Modified, Some(&old)) {
                    error!("Failed to queue modified playlist '{}': {}", playlist.name, e);
                    continue;
                }
                summary.queued_modified += 1;
            }
            Some(_) => {}
        }
    }

    if summary.queued_new == 0 && summary.queued_modified == 0 {
        info!("No playlist modifications detected.");
        if let Err(e) = db::log_action(
            conn,
            "CHECK_COMPLETE",
            "SYSTEM",
            None,
            Some("Playlist Modification Check"),
            "Completed checking all tracked playlists for modifications",
            Some(&format!("Checked {} playlists, no modifications found", snapshots.len())),
            true,
            None,
        ) {
            error!("Failed to record modification check: {}", e);
        }
    }

    // keep stored metadata fresh even for unchanged and skipped playlists
    info!("Updating playlist database...");
    for playlist in snapshots {
        if let Err(e) = db::upsert_playlist(conn, playlist) {
            error!("Failed to upsert playlist '{}' (ID: {}): {}", playlist.name, playlist.id, e);
        }
    }

    Ok(summary)
}

fn enqueue(
    conn: &Connection,
    playlist: &PlaylistSnapshot,
    change_type: ChangeType,
    old_snapshot: Option<&str>,
) -> Result<()> {
    db::enqueue_change(
        conn,
        &playlist.id,
        &playlist.name,
        change_type,
        old_snapshot,
        &playlist.snapshot_id,
    )?;
    let (reason, details) = match change_type {
        ChangeType::New => (
            "New playlist detected - first time tracking",
            format!("Snapshot ID: {}", playlist.snapshot_id),
        ),
        ChangeType::Modified => (
            "Playlist modification detected - snapshot ID changed",
            format!(
                "Old snapshot: {}, New snapshot: {}",
                old_snapshot.unwrap_or("none"),
                playlist.snapshot_id
            ),
        ),
    };
    db::log_action(
        conn,
        "ADD_TO_QUEUE",
        "PLAYLIST",
        Some(&playlist.id),
        Some(&playlist.name),
        reason,
        Some(&details),
        true,
        None,
    )?;
    Ok(())
}
