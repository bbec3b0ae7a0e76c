use super::PlaylistGenerator;
use crate::api::Catalog;
use crate::db;
use crate::diff::AUTO_PLAYLIST_MARKER;
use anyhow::Result;
use async_trait::async_trait;
use log::{info, warn};
use rusqlite::Connection;

const MAX_TRACKS: usize = 50;

/// Random low-popularity songs drawn from the mirrored library.
pub struct HiddenGems;

#[async_trait(?Send)]
impl PlaylistGenerator for HiddenGems {
    fn slug(&self) -> &'static str {
        "hidden_gems"
    }

    fn name(&self) -> String {
        format!("lesser listened to tracks {}", AUTO_PLAYLIST_MARKER)
    }

    fn description(&self) -> String {
        "songs from my playlists that are not very popular according to spotify - refreshes approx. every 3 hrs".to_string()
    }

    fn public(&self) -> bool {
        true
    }

    fn add_to_profile(&self) -> bool {
        true
    }

    fn library_folder(&self) -> Option<&'static str> {
        Some("auto playlists")
    }

    async fn tracks(&self, conn: &Connection, _catalog: &dyn Catalog) -> Result<Vec<String>> {
        info!("Fetching random hidden gems (popularity 0-5) from database...");
        let songs = db::get_filtered_songs(conn, 0, 5, MAX_TRACKS)?;
        if songs.is_empty() {
            warn!("No songs found with popularity 0-5 in database");
            return Ok(Vec::new());
        }
        info!("Found {} songs in database", songs.len());

        let mut tracks = Vec::new();
        for song in songs {
            match song.uri {
                Some(uri) => tracks.push(uri),
                None => warn!("Song {} has no URI", song.name),
            }
        }
        info!("Successfully prepared {} hidden gem tracks for playlist", tracks.len());
        Ok(tracks)
    }
}
