use crate::api::{is_rate_limit_fatal, Catalog};
use crate::config::Config;
use crate::db;
use crate::diff;
use crate::models::PlaylistSnapshot;
use crate::orphans;
use crate::reconciler::{self, ReconcileOptions};
use crate::util;
use anyhow::Result;
use log::{error, info, warn};
use rusqlite::Connection;

/// Resolve the configured usernames and playlist ids to the set of remote
/// playlist snapshots to track this pass. Invalid or inaccessible entries
/// are skipped with the reason logged; they never abort the rest.
pub async fn collect_tracked_playlists(
    cfg: &Config,
    catalog: &dyn Catalog,
) -> Result<Vec<PlaylistSnapshot>> {
    let mut playlists: Vec<PlaylistSnapshot> = Vec::new();

    for username in &cfg.usernames {
        let username = username.trim();
        if username.is_empty() {
            continue;
        }
        info!("Validating user: {}", username);
        let validation = catalog.validate_user(username).await?;
        if !validation.valid {
            error!(
                "Invalid user ID '{}': {}",
                username,
                validation.error.unwrap_or_default()
            );
            continue;
        }
        if !validation.accessible {
            warn!(
                "User '{}' exists but is not accessible: {}",
                username,
                validation.error.unwrap_or_default()
            );
            continue;
        }
        info!("Fetching playlists for user: {}", username);
        match catalog.list_user_playlists(username).await {
            Ok(user_playlists) => {
                info!(
                    "Successfully fetched {} playlists for user '{}'",
                    user_playlists.len(),
                    username
                );
                playlists.extend(user_playlists);
            }
            Err(e) => {
                if is_rate_limit_fatal(&e) {
                    return Err(e);
                }
                error!("Error fetching playlists for user {}: {}", username, e);
            }
        }
    }

    for raw_id in &cfg.playlists_to_track {
        let playlist_id = util::normalize_playlist_id(raw_id);
        if playlist_id.is_empty() {
            error!("Invalid playlist ID '{}': ID must be a non-empty string", raw_id);
            continue;
        }
        info!("Validating playlist ID: {}", playlist_id);
        let validation = catalog.validate_playlist(&playlist_id).await?;
        if !validation.valid {
            error!(
                "Invalid playlist ID '{}': {}",
                playlist_id,
                validation.error.unwrap_or_default()
            );
            continue;
        }
        if !validation.accessible {
            warn!(
                "Playlist '{}' exists but is not accessible: {}",
                playlist_id,
                validation.error.unwrap_or_default()
            );
            continue;
        }
        match catalog.get_playlist(&playlist_id).await {
            Ok(playlist) => {
                info!("Successfully fetched playlist '{}' (ID: {})", playlist.name, playlist_id);
                playlists.push(playlist);
            }
            Err(e) => {
                if is_rate_limit_fatal(&e) {
                    return Err(e);
                }
                error!("Error fetching playlist by ID {}: {}", playlist_id, e);
            }
        }
    }

    Ok(playlists)
}

/// One full sync pass: diff against the store, drain the reconciliation
/// queue, then sweep orphans with the final tracked-id set. The store
/// connection is released on every path when it drops.
pub async fn run_sync_once(cfg: &Config, catalog: &dyn Catalog) -> Result<()> {
    info!("Initializing database...");
    let conn = db::open_or_create(&cfg.db_path)?;

    info!("=== PLAYLIST SYNC STARTED ===");
    db::log_action(
        &conn,
        "SYNC_SESSION_START",
        "SYSTEM",
        None,
        Some("Sync Session"),
        "Starting new sync session",
        None,
        true,
        None,
    )?;

    let processed = run_pass(cfg, catalog, &conn).await?;

    db::log_action(
        &conn,
        "SYNC_SESSION_COMPLETE",
        "SYSTEM",
        None,
        Some("Sync Session"),
        "Sync session completed successfully",
        Some(&format!("Processed {} playlists", processed)),
        true,
        None,
    )?;
    info!("=== PLAYLIST SYNC COMPLETED ===");
    Ok(())
}

async fn run_pass(cfg: &Config, catalog: &dyn Catalog, conn: &Connection) -> Result<usize> {
    info!("Loading playlists to track...");
    let playlists = collect_tracked_playlists(cfg, catalog).await?;
    if playlists.is_empty() {
        info!("No valid playlists to track. Nothing to do.");
        return Ok(0);
    }
    info!("Total playlists to track: {}", playlists.len());

    info!("Starting playlist update process...");
    diff::detect_changes(conn, &playlists)?;
    info!("Playlist update process complete.");

    info!("Starting song update process...");
    let opts = ReconcileOptions { refresh_track_metadata: cfg.refresh_track_metadata };
    reconciler::process_queue(conn, catalog, &opts).await?;
    info!("Song update process complete.");

    info!("Starting comprehensive orphan cleanup...");
    let tracked_ids: Vec<String> = playlists.iter().map(|p| p.id.clone()).collect();
    orphans::collect_orphans(conn, &tracked_ids)?;
    info!("Comprehensive orphan cleanup complete.");

    Ok(playlists.len())
}
