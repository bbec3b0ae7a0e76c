use mockito::{Matcher, Server};
use serde_json::json;
use spotify_playlist_mirror::api::spotify::{SpotifyAuth, SpotifyClient};
use spotify_playlist_mirror::api::Catalog;
use std::env;

#[test]
fn spotify_client_reads_validate_and_paginate() {
    // Create mock server outside of any tokio runtime
    let mut server = Server::new();
    let base = server.url();
    env::set_var("SPOTIFY_API_BASE", &base);
    env::set_var("SPOTIFY_AUTH_BASE", &base);

    let _m_token = server
        .mock("POST", "/api/token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "access_token": "mock_token",
                "token_type": "Bearer",
                "expires_in": 3600,
            })
            .to_string(),
        )
        .create();

    // user playlist listing: two pages linked by a next cursor
    let _m_page1 = server
        .mock("GET", "/users/u1/playlists")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "items": [
                    {"id": "p1", "name": "First", "owner": {"id": "u1"}, "snapshot_id": "s1", "tracks": {"total": 2}}
                ],
                "next": format!("{}/users-page2", base),
            })
            .to_string(),
        )
        .create();
    let _m_page2 = server
        .mock("GET", "/users-page2")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "items": [
                    {"id": "p2", "name": "Second", "owner": {"id": "u1"}, "snapshot_id": "s2", "tracks": {"total": 0}}
                ],
                "next": null,
            })
            .to_string(),
        )
        .create();

    // track listing containing deleted/partial stubs the client must skip
    let _m_tracks = server
        .mock("GET", "/playlists/p1/tracks")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "items": [
                    {"track": {"id": "t1", "name": "Song One", "duration_ms": 1000, "explicit": false,
                               "popularity": 33, "uri": "spotify:track:t1",
                               "artists": [{"id": "a1", "name": "Artist"}],
                               "album": {"id": "al1", "name": "Album"}}},
                    {"track": null},
                    {"track": {"id": "t3", "name": null}}
                ],
                "next": null,
            })
            .to_string(),
        )
        .create();

    // batched artist lookup tolerating a null entry
    let _m_artists = server
        .mock("GET", "/artists")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "artists": [
                    {"id": "a1", "name": "Artist", "genres": ["pop", "indie"],
                     "popularity": 55, "followers": {"total": 1234}},
                    null
                ]
            })
            .to_string(),
        )
        .create();

    // validation status mapping
    let _m_gone = server
        .mock("GET", "/playlists/gone")
        .match_query(Matcher::Any)
        .with_status(404)
        .with_header("content-type", "application/json")
        .with_body(json!({"error": {"status": 404, "message": "Not found."}}).to_string())
        .create();
    let _m_locked = server
        .mock("GET", "/playlists/locked")
        .match_query(Matcher::Any)
        .with_status(403)
        .with_header("content-type", "application/json")
        .with_body(json!({"error": {"status": 403, "message": "Forbidden."}}).to_string())
        .create();

    let client = SpotifyClient::new(
        SpotifyAuth::ClientCredentials {
            client_id: "cid".into(),
            client_secret: "csecret".into(),
        },
        6000,
    );

    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async move {
        let playlists = client.list_user_playlists("u1").await.unwrap();
        assert_eq!(playlists.len(), 2, "pagination follows the next cursor");
        assert_eq!(playlists[0].id, "p1");
        assert_eq!(playlists[1].id, "p2");

        let tracks = client.get_playlist_tracks("p1").await.unwrap();
        assert_eq!(tracks.len(), 1, "null and partial track stubs are skipped");
        assert_eq!(tracks[0].id, "t1");
        assert_eq!(tracks[0].artists[0].id, "a1");
        assert_eq!(tracks[0].album_name.as_deref(), Some("Album"));

        let batch = client
            .get_artists_batch(&["a1".to_string(), "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(batch.len(), 1, "missing ids are absent, not errors");
        let a1 = batch.get("a1").unwrap();
        assert_eq!(a1.genres, vec!["pop".to_string(), "indie".to_string()]);
        assert_eq!(a1.followers_total, 1234);

        // 404 -> invalid; the URI form is normalized before the call
        let v = client.validate_playlist("spotify:playlist:gone").await.unwrap();
        assert!(!v.valid);
        assert!(!v.accessible);
        assert!(v.error.unwrap().contains("not found"));

        // 403 -> exists but private
        let v = client.validate_playlist("locked").await.unwrap();
        assert!(v.valid);
        assert!(!v.accessible);
        assert!(v.error.unwrap().contains("private"));

        // empty id never reaches the network
        let v = client.validate_playlist("  ").await.unwrap();
        assert!(!v.valid);
    });
}
