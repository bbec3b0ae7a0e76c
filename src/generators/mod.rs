pub mod genre_mix;
pub mod hidden_gems;

use crate::api::{is_rate_limit_fatal, Catalog};
use crate::config::Config;
use crate::db;
use crate::models::{ManagedPlaylist, PlaylistSnapshot};
use anyhow::Result;
use async_trait::async_trait;
use log::{error, info, warn};
use rusqlite::Connection;
use std::collections::HashSet;

/// A producer of one auto-generated playlist. The engine owns creation,
/// updating and bookkeeping; implementations only decide what the playlist
/// is called and which track URIs it should contain.
#[async_trait(?Send)]
pub trait PlaylistGenerator {
    /// Stable key into the managed_playlists table.
    fn slug(&self) -> &'static str;

    /// Display name. Must contain the auto marker so the sync engine never
    /// re-ingests the generated playlist.
    fn name(&self) -> String;

    fn description(&self) -> String;

    fn public(&self) -> bool {
        false
    }

    fn add_to_profile(&self) -> bool {
        false
    }

    fn library_folder(&self) -> Option<&'static str> {
        None
    }

    async fn tracks(&self, conn: &Connection, catalog: &dyn Catalog) -> Result<Vec<String>>;
}

/// Static registry of generator implementations assembled at startup.
pub fn registry() -> Vec<Box<dyn PlaylistGenerator>> {
    vec![Box::new(hidden_gems::HiddenGems), Box::new(genre_mix::GenreMix)]
}

/// Drop managed_playlists rows whose generator is no longer registered.
pub fn cleanup_unmanaged_playlists(
    conn: &Connection,
    generators: &[Box<dyn PlaylistGenerator>],
) -> Result<usize> {
    info!("Cleaning up unmanaged playlists from database...");
    let current: HashSet<&str> = generators.iter().map(|g| g.slug()).collect();
    let mut removed = 0usize;
    for managed in db::get_all_managed_playlists(conn)? {
        if !current.contains(managed.slug.as_str()) {
            info!(
                "Removing unmanaged playlist from database: {} (ID: {})",
                managed.slug, managed.playlist_id
            );
            db::delete_managed_playlist(conn, &managed.slug)?;
            removed += 1;
        }
    }
    if removed > 0 {
        info!("Cleaned up {} unmanaged playlist(s) from database", removed);
    } else {
        info!("No unmanaged playlists found in database");
    }
    Ok(removed)
}

/// A remote playlist only counts as ours if it still exists, is owned by
/// the authenticated user and appears in their library; unfollowing in the
/// Spotify client leaves a resolvable id behind otherwise.
async fn playlist_still_ours(catalog: &dyn Catalog, playlist_id: &str) -> Result<bool> {
    let playlist = match catalog.get_playlist(playlist_id).await {
        Ok(p) => p,
        Err(e) => {
            if is_rate_limit_fatal(&e) {
                return Err(e);
            }
            info!("Playlist {} not found (deleted or never existed)", playlist_id);
            return Ok(false);
        }
    };
    let me = catalog.current_user_id().await?;
    if playlist.owner_id != me {
        info!("Playlist {} exists but is not owned by current user", playlist_id);
        return Ok(false);
    }
    let mine = catalog.my_playlists().await?;
    Ok(mine.iter().any(|p| p.id == playlist_id))
}

/// Create or update the remote playlist for one generator and record it in
/// managed_playlists.
pub async fn apply_generator(
    conn: &Connection,
    catalog: &dyn Catalog,
    generator: &dyn PlaylistGenerator,
) -> Result<PlaylistSnapshot> {
    if let Some(managed) = db::get_managed_playlist(conn, generator.slug())? {
        let playlist_id = managed.playlist_id.clone();
        info!(
            "Found existing managed playlist '{}' with ID: {}",
            generator.name(),
            playlist_id
        );

        if playlist_still_ours(catalog, &playlist_id).await? {
            let needs_update = managed.title != generator.name()
                || managed.description != generator.description()
                || managed.public != generator.public()
                || managed.add_to_profile != generator.add_to_profile()
                || managed.library_folder.as_deref() != generator.library_folder();

            if needs_update {
                info!("Updating playlist details for '{}'", generator.name());
                catalog
                    .update_playlist_details(
                        &playlist_id,
                        &generator.name(),
                        &generator.description(),
                        generator.public(),
                    )
                    .await?;
                db::save_managed_playlist(conn, &managed_record(generator, &playlist_id))?;
            }

            let tracks = generator.tracks(conn, catalog).await?;
            info!("Replacing tracks in playlist '{}'", generator.name());
            catalog.replace_playlist_tracks(&playlist_id, &tracks).await?;

            return catalog.get_playlist(&playlist_id).await;
        }

        warn!("Playlist {} no longer exists on Spotify, creating new one", playlist_id);
        db::delete_managed_playlist(conn, generator.slug())?;
    }

    info!("Creating new playlist: {}", generator.name());
    let tracks = generator.tracks(conn, catalog).await?;
    let playlist = catalog
        .create_playlist(&generator.name(), &generator.description(), generator.public())
        .await?;
    if !tracks.is_empty() {
        catalog.replace_playlist_tracks(&playlist.id, &tracks).await?;
    } else {
        warn!("No tracks produced for playlist '{}'", generator.name());
    }
    db::save_managed_playlist(conn, &managed_record(generator, &playlist.id))?;
    info!(
        "Successfully created and saved managed playlist '{}' with ID: {}",
        generator.name(),
        playlist.id
    );
    if let Some(folder) = generator.library_folder() {
        info!("Playlist '{}' organized in folder: '{}'", generator.name(), folder);
    }
    Ok(playlist)
}

fn managed_record(generator: &dyn PlaylistGenerator, playlist_id: &str) -> ManagedPlaylist {
    ManagedPlaylist {
        slug: generator.slug().to_string(),
        playlist_id: playlist_id.to_string(),
        title: generator.name(),
        description: generator.description(),
        public: generator.public(),
        add_to_profile: generator.add_to_profile(),
        library_folder: generator.library_folder().map(String::from),
    }
}

/// Apply every registered generator; returns how many produced a playlist.
/// A single generator's failure is logged and the rest still run.
pub async fn run_generation(cfg: &Config, catalog: &dyn Catalog) -> Result<usize> {
    info!("Starting playlist creation/update process...");
    let conn = db::open_or_create(&cfg.db_path)?;

    let generators = registry();
    cleanup_unmanaged_playlists(&conn, &generators)?;

    let mut managed = 0usize;
    for generator in &generators {
        match apply_generator(&conn, catalog, generator.as_ref()).await {
            Ok(playlist) => {
                managed += 1;
                info!("Managed: {}", playlist.name);
            }
            Err(e) => {
                if is_rate_limit_fatal(&e) {
                    return Err(e);
                }
                error!("Error managing playlist '{}': {}", generator.name(), e);
            }
        }
    }
    Ok(managed)
}
