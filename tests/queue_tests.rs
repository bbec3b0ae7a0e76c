use spotify_playlist_mirror::db;
use spotify_playlist_mirror::models::ChangeType;
use tempfile::tempdir;

#[test]
fn queue_reads_newest_first_and_deletes_per_playlist() {
    let td = tempdir().unwrap();
    let conn = db::open_or_create(&td.path().join("test.db")).unwrap();

    db::enqueue_change(&conn, "p1", "First", ChangeType::New, None, "s1").unwrap();
    db::enqueue_change(&conn, "p2", "Second", ChangeType::Modified, Some("s1"), "s2").unwrap();
    db::enqueue_change(&conn, "p1", "First", ChangeType::Modified, Some("s1"), "s3").unwrap();

    let all = db::get_queue(&conn).unwrap();
    assert_eq!(all.len(), 3);
    // detection-time descending; same-second rows fall back to id order
    assert_eq!(all[0].playlist_id, "p1");
    assert_eq!(all[0].new_snapshot_id.as_deref(), Some("s3"));
    assert_eq!(all[2].new_snapshot_id.as_deref(), Some("s1"));

    let for_p1 = db::get_queue_for_playlist(&conn, "p1").unwrap();
    assert_eq!(for_p1.len(), 2);
    assert!(for_p1.iter().all(|e| e.playlist_id == "p1"));

    // completion removes every entry for the playlist id
    let removed = db::delete_queue_for_playlist(&conn, "p1").unwrap();
    assert_eq!(removed, 2);
    let all = db::get_queue(&conn).unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].playlist_id, "p2");
}

#[test]
fn deleting_absent_playlist_is_a_noop() {
    let td = tempdir().unwrap();
    let conn = db::open_or_create(&td.path().join("test.db")).unwrap();

    db::enqueue_change(&conn, "p1", "Only", ChangeType::New, None, "s1").unwrap();

    let removed = db::delete_queue_for_playlist(&conn, "nope").unwrap();
    assert_eq!(removed, 0);
    // a repeat delete for an already-cleared id is fine too
    db::delete_queue_for_playlist(&conn, "nope").unwrap();

    let all = db::get_queue(&conn).unwrap();
    assert_eq!(all.len(), 1, "other playlists' entries must be untouched");
}

#[test]
fn clear_queue_empties_everything() {
    let td = tempdir().unwrap();
    let conn = db::open_or_create(&td.path().join("test.db")).unwrap();

    db::enqueue_change(&conn, "p1", "A", ChangeType::New, None, "s1").unwrap();
    db::enqueue_change(&conn, "p2", "B", ChangeType::New, None, "s1").unwrap();

    assert_eq!(db::clear_queue(&conn).unwrap(), 2);
    assert!(db::get_queue(&conn).unwrap().is_empty());
}

#[test]
fn change_type_round_trips_through_storage() {
    let td = tempdir().unwrap();
    let conn = db::open_or_create(&td.path().join("test.db")).unwrap();

    db::enqueue_change(&conn, "p1", "A", ChangeType::Modified, Some("s1"), "s2").unwrap();
    let entries = db::get_queue(&conn).unwrap();
    let entry = &entries[0];
    assert_eq!(entry.change_type, ChangeType::Modified);
    assert_eq!(entry.old_snapshot_id.as_deref(), Some("s1"));
    assert_eq!(entry.playlist_name.as_deref(), Some("A"));
}
