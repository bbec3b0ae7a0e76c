use mockito::{Matcher, Server};
use serde_json::json;
use spotify_playlist_mirror::api::spotify::{SpotifyAuth, SpotifyClient};
use spotify_playlist_mirror::api::{is_rate_limit_fatal, Catalog, RateLimitExceeded};
use std::env;

#[test]
fn http_429_trips_the_circuit_breaker() {
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

    let m_boom = server
        .mock("GET", "/playlists/boom")
        .match_query(Matcher::Any)
        .with_status(429)
        .with_header("retry-after", "3")
        .with_header("content-type", "application/json")
        .with_body(json!({"error": {"status": 429, "message": "Too many requests"}}).to_string())
        .expect(1)
        .create();

    let client = SpotifyClient::new(
        SpotifyAuth::ClientCredentials {
            client_id: "cid".into(),
            client_secret: "csecret".into(),
        },
        6000,
    );

    let rt = tokio::runtime::Runtime::new().unwrap();
    let res = rt.block_on(async move { client.get_playlist("boom").await });

    let err = res.expect_err("429 must not be swallowed");
    assert!(is_rate_limit_fatal(&err), "error chain carries the breaker: {err:#}");
    assert!(err
        .chain()
        .any(|c| c.downcast_ref::<RateLimitExceeded>().is_some()));
    // exactly one request: the breaker is never retried
    m_boom.assert();
}
