/// Accepts a bare playlist id, a spotify:playlist: URI or an
/// open.spotify.com link and returns the bare id.
pub fn normalize_playlist_id(raw: &str) -> String {
    let raw = raw.trim();
    if let Some(rest) = raw.strip_prefix("spotify:playlist:") {
        return rest.to_string();
    }
    if let Some(rest) = raw.strip_prefix("https://open.spotify.com/playlist/") {
        return rest.split('?').next().unwrap_or("").to_string();
    }
    raw.to_string()
}
