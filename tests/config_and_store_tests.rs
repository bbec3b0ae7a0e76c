use std::fs::File;
use std::io::Write;
use tempfile::tempdir;

use spotify_playlist_mirror::config::Config;
use spotify_playlist_mirror::db;
use spotify_playlist_mirror::models::PlaylistSnapshot;
use spotify_playlist_mirror::util::normalize_playlist_id;

#[test]
fn config_from_path_parses_toml() {
    let td = tempdir().unwrap();
    let cfg_path = td.path().join("cfg.toml");
    let mut f = File::create(&cfg_path).unwrap();
    let toml = r#"
usernames = ["alice"]
playlists_to_track = ["37i9dQZF1DXcBWIGoYBM5M"]
db_path = "/tmp/test.db"
log_dir = "/tmp"
"#;
    f.write_all(toml.as_bytes()).unwrap();
    let cfg = Config::from_path(&cfg_path).expect("parse config");
    assert_eq!(cfg.usernames, vec!["alice"]);
    assert_eq!(cfg.db_path.to_str().unwrap(), "/tmp/test.db");
    assert_eq!(cfg.requests_per_minute, 90);
    assert!(!cfg.refresh_track_metadata);
    cfg.validate().expect("valid config");
}

#[test]
fn config_without_tracking_targets_is_invalid() {
    let td = tempdir().unwrap();
    let cfg_path = td.path().join("cfg.toml");
    let mut f = File::create(&cfg_path).unwrap();
    f.write_all(b"db_path = \"/tmp/test.db\"\n").unwrap();
    let cfg = Config::from_path(&cfg_path).expect("parse config");
    assert!(cfg.validate().is_err());

    // whitespace-only entries do not count either
    let mut f = File::create(&cfg_path).unwrap();
    f.write_all(b"usernames = [\"  \"]\nplaylists_to_track = [\"\"]\n").unwrap();
    let cfg = Config::from_path(&cfg_path).expect("parse config");
    assert!(cfg.validate().is_err());
}

#[test]
fn create_tables_is_idempotent() {
    let td = tempdir().unwrap();
    let db_path = td.path().join("test.db");
    let conn = db::open_or_create(&db_path).unwrap();
    // a second run must not fail
    db::create_tables(&conn).expect("create tables twice");

    for table in [
        "playlists",
        "queue",
        "action_log",
        "songs",
        "artists",
        "playlist_songs",
        "song_artists",
        "managed_playlists",
    ] {
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name=?1")
            .unwrap();
        let found = stmt.exists([table]).unwrap();
        assert!(found, "{} table should exist after startup", table);
    }
}

#[test]
fn playlist_upsert_refreshes_row() {
    let td = tempdir().unwrap();
    let conn = db::open_or_create(&td.path().join("test.db")).unwrap();

    let mut playlist = PlaylistSnapshot {
        id: "p1".into(),
        name: "Road Trip".into(),
        owner_id: "alice".into(),
        snapshot_id: "s1".into(),
        tracks_total: 10,
        ..Default::default()
    };
    db::upsert_playlist(&conn, &playlist).unwrap();
    assert_eq!(db::get_playlist_snapshot_id(&conn, "p1").unwrap(), Some("s1".into()));

    playlist.name = "Road Trip 2".into();
    playlist.snapshot_id = "s2".into();
    db::upsert_playlist(&conn, &playlist).unwrap();

    let stored = db::get_playlist_by_id(&conn, "p1").unwrap().unwrap();
    assert_eq!(stored.name, "Road Trip 2");
    assert_eq!(stored.snapshot_id, "s2");
}

#[test]
fn action_log_filters_and_retention() {
    let td = tempdir().unwrap();
    let conn = db::open_or_create(&td.path().join("test.db")).unwrap();

    db::log_action(&conn, "SYNC_START", "PLAYLIST", Some("p1"), Some("Mix"), "ready", None, true, None)
        .unwrap();
    db::log_action(
        &conn,
        "SYNC_FAILED",
        "PLAYLIST",
        Some("p1"),
        Some("Mix"),
        "boom",
        Some("Error: boom"),
        false,
        Some("boom"),
    )
    .unwrap();

    let failures = db::get_action_logs(
        &conn,
        &db::ActionLogFilter { success: Some(false), ..Default::default() },
    )
    .unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].action_type, "SYNC_FAILED");
    assert_eq!(failures[0].error_message.as_deref(), Some("boom"));

    let by_type = db::get_action_logs(
        &conn,
        &db::ActionLogFilter { action_type: Some("SYNC_START"), ..Default::default() },
    )
    .unwrap();
    assert_eq!(by_type.len(), 1);

    // retention purge removes only rows past the cutoff
    conn.execute(
        "INSERT INTO action_log (action_type, entity_type, reason, success, timestamp) VALUES ('OLD', 'SYSTEM', 'ancient', 1, datetime('now', '-40 days'))",
        [],
    )
    .unwrap();
    let removed = db::clear_old_action_logs(&conn, 30).unwrap();
    assert_eq!(removed, 1);
    let remaining = db::get_action_logs(&conn, &db::ActionLogFilter::default()).unwrap();
    assert_eq!(remaining.len(), 2);
}

#[test]
fn normalize_playlist_id_handles_uris_and_links() {
    assert_eq!(normalize_playlist_id("abc123"), "abc123");
    assert_eq!(normalize_playlist_id(" abc123 "), "abc123");
    assert_eq!(normalize_playlist_id("spotify:playlist:abc123"), "abc123");
    assert_eq!(
        normalize_playlist_id("https://open.spotify.com/playlist/abc123?si=xyz"),
        "abc123"
    );
    assert_eq!(normalize_playlist_id(""), "");
}
