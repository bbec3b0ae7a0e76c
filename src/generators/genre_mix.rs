use super::PlaylistGenerator;
use crate::api::{is_rate_limit_fatal, Catalog};
use crate::diff::AUTO_PLAYLIST_MARKER;
use anyhow::Result;
use async_trait::async_trait;
use log::{info, warn};
use rusqlite::Connection;

const SEARCH_TERMS: [&str; 3] = ["pop", "electronic", "indie"];
const MAX_TRACKS: usize = 50;

/// Fresh picks from live genre searches against the catalog.
pub struct GenreMix;

#[async_trait(?Send)]
impl PlaylistGenerator for GenreMix {
    fn slug(&self) -> &'static str {
        "genre_mix"
    }

    fn name(&self) -> String {
        format!("Pop, Electronic, and Indie Mix {}", AUTO_PLAYLIST_MARKER)
    }

    fn description(&self) -> String {
        "dynamically created playlist based on search terms: pop, electronic, indie".to_string()
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

    async fn tracks(&self, _conn: &Connection, catalog: &dyn Catalog) -> Result<Vec<String>> {
        let mut tracks: Vec<String> = Vec::new();
        'terms: for term in SEARCH_TERMS {
            info!("Searching for tracks with term: {}", term);
            let results = match catalog.search_tracks(&format!("genre:{}", term), MAX_TRACKS).await
            {
                Ok(r) => r,
                Err(e) => {
                    if is_rate_limit_fatal(&e) {
                        return Err(e);
                    }
                    warn!("Error searching for dynamic tracks: {}", e);
                    continue;
                }
            };
            for track in results {
                if let Some(uri) = track.uri {
                    if !tracks.contains(&uri) {
                        info!(
                            "Found track: {} by {}",
                            track.name,
                            track.artists.first().map(|a| a.name.as_str()).unwrap_or("Unknown")
                        );
                        tracks.push(uri);
                    }
                }
                if tracks.len() >= MAX_TRACKS {
                    break 'terms;
                }
            }
        }
        Ok(tracks)
    }
}
