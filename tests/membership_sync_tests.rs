use spotify_playlist_mirror::db;
use tempfile::tempdir;

fn ids(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}

#[test]
fn reconcile_membership_converges_then_noops() {
    let td = tempdir().unwrap();
    let conn = db::open_or_create(&td.path().join("test.db")).unwrap();

    db::insert_playlist_song(&conn, "p1", "a").unwrap();
    db::insert_playlist_song(&conn, "p1", "b").unwrap();

    let current = ids(&["a", "c"]);
    let outcome = db::sync_playlist_songs(&conn, "p1", &current).unwrap();
    assert_eq!(outcome.added, 1);
    assert_eq!(outcome.removed, 1);
    assert_eq!(outcome.songs_added, vec!["c".to_string()]);
    assert_eq!(outcome.songs_removed, vec!["b".to_string()]);

    let mut stored = db::song_ids_in_playlist(&conn, "p1").unwrap();
    stored.sort();
    assert_eq!(stored, ids(&["a", "c"]));

    // replaying the same current set is a no-op
    let outcome = db::sync_playlist_songs(&conn, "p1", &current).unwrap();
    assert_eq!(outcome.added, 0);
    assert_eq!(outcome.removed, 0);
    let mut stored = db::song_ids_in_playlist(&conn, "p1").unwrap();
    stored.sort();
    assert_eq!(stored, ids(&["a", "c"]));
}

#[test]
fn reconcile_membership_is_order_independent_and_dedups() {
    let td = tempdir().unwrap();
    let conn = db::open_or_create(&td.path().join("test.db")).unwrap();

    let outcome = db::sync_playlist_songs(&conn, "p1", &ids(&["b", "a", "b", "a"])).unwrap();
    assert_eq!(outcome.added, 2);

    let outcome = db::sync_playlist_songs(&conn, "p1", &ids(&["a", "b"])).unwrap();
    assert_eq!(outcome.added, 0);
    assert_eq!(outcome.removed, 0);
}

#[test]
fn empty_current_set_clears_membership() {
    let td = tempdir().unwrap();
    let conn = db::open_or_create(&td.path().join("test.db")).unwrap();

    db::insert_playlist_song(&conn, "p1", "a").unwrap();
    db::insert_playlist_song(&conn, "p1", "b").unwrap();
    // membership of another playlist must not be affected
    db::insert_playlist_song(&conn, "p2", "a").unwrap();

    let outcome = db::sync_playlist_songs(&conn, "p1", &[]).unwrap();
    assert_eq!(outcome.removed, 2);
    assert!(db::song_ids_in_playlist(&conn, "p1").unwrap().is_empty());
    assert_eq!(db::song_ids_in_playlist(&conn, "p2").unwrap(), ids(&["a"]));
}
