//! Core library for spotify-playlist-mirror: mirrors tracked playlists into
//! a local SQLite store, replays a durable reconciliation queue against the
//! Spotify Web API, and maintains auto-generated playlists.
pub mod api;
pub mod config;
pub mod db;
pub mod diff;
pub mod generators;
pub mod models;
pub mod orphans;
pub mod reconciler;
pub mod sync;
pub mod util;
