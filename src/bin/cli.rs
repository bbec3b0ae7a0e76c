use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use spotify_playlist_mirror as lib;
use lib::api::is_rate_limit_fatal;
use lib::api::spotify::SpotifyClient;
use lib::config::Config;
use std::path::{Path, PathBuf};
use tracing::subscriber as tracing_subscriber_global;
use tracing_appender::rolling::RollingFileAppender;
use tracing_log::LogTracer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "spotify-playlist-mirror", version)]
struct Cli {
    /// Path to config TOML
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one sync pass: diff, queue, reconcile, collect orphans
    Sync,
    /// Build or refresh the auto-generated playlists
    Generate,
    /// Show the contents of the reconciliation queue
    QueueStatus,
    /// Remove every entry from the reconciliation queue
    QueueClear,
    /// Delete action-log entries older than the retention window
    LogsPrune,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    // Resolve config path: explicit --config overrides; otherwise prefer
    // the system-wide config and fall back to the repository example
    // config for local/dev usage.
    let resolved_config_path: PathBuf = match &cli.config {
        Some(p) => p.clone(),
        None => {
            let etc_path = Path::new("/etc/spotify-playlist-mirror/config.toml");
            if etc_path.exists() {
                etc_path.to_path_buf()
            } else {
                PathBuf::from("config/example-config.toml")
            }
        }
    };

    let cfg = Config::from_path(&resolved_config_path)
        .with_context(|| format!("loading config from {}", resolved_config_path.display()))?;

    // Initialize log->tracing bridge and structured logging.
    // Logs go to both stdout and a daily-rotated file in cfg.log_dir.
    let _ = LogTracer::init();
    let file_appender: RollingFileAppender =
        tracing_appender::rolling::daily(&cfg.log_dir, "playlist-mirror.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // Honor RUST_LOG if set, otherwise default to info.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = fmt::layer().with_writer(non_blocking);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer);

    tracing_subscriber_global::set_global_default(subscriber)
        .expect("failed to set global tracing subscriber");

    match cli.command {
        Commands::Sync => {
            if let Err(e) = cfg.validate() {
                log::error!("Invalid configuration: {}. Please check the config file.", e);
                std::process::exit(1);
            }
            let catalog = match SpotifyClient::from_env(cfg.requests_per_minute) {
                Ok(c) => c,
                Err(e) => {
                    log::error!("Spotify credentials missing or invalid: {}", e);
                    std::process::exit(1);
                }
            };
            if let Err(e) = lib::sync::run_sync_once(&cfg, &catalog).await {
                if is_rate_limit_fatal(&e) {
                    log::error!("Rate limit exceeded during sync process.");
                    log::error!("The application will exit to prevent further rate limit violations.");
                    log::error!("Error details: {}", e);
                    std::process::exit(1);
                }
                return Err(e).context("running sync pass");
            }
        }
        Commands::Generate => {
            let catalog = match SpotifyClient::user_from_env(cfg.requests_per_minute) {
                Ok(c) => c,
                Err(e) => {
                    log::error!("Spotify credentials missing or invalid: {}", e);
                    std::process::exit(1);
                }
            };
            match lib::generators::run_generation(&cfg, &catalog).await {
                Ok(0) => {
                    log::error!("No playlists were managed");
                    std::process::exit(1);
                }
                Ok(n) => {
                    log::info!("Successfully managed {} playlist(s)", n);
                }
                Err(e) => {
                    if is_rate_limit_fatal(&e) {
                        log::error!("Rate limit exceeded during playlist generation.");
                        log::error!("The application will exit to prevent further rate limit violations.");
                        log::error!("Error details: {}", e);
                        std::process::exit(1);
                    }
                    return Err(e).context("running playlist generation");
                }
            }
        }
        Commands::QueueStatus => {
            let conn = lib::db::open_or_create(&cfg.db_path)?;
            let entries = lib::db::get_queue(&conn)?;
            println!("Queue contains {} pending entry(ies):", entries.len());
            for entry in entries {
                println!(
                    "- id: {} | playlist: {} ({}) | change: {} | old: {:?} | new: {:?} | detected: {}",
                    entry.id,
                    entry.playlist_name.as_deref().unwrap_or("?"),
                    entry.playlist_id,
                    entry.change_type.as_str(),
                    entry.old_snapshot_id,
                    entry.new_snapshot_id,
                    entry.detected_at
                );
            }
        }
        Commands::QueueClear => {
            let conn = lib::db::open_or_create(&cfg.db_path)?;
            let removed = lib::db::clear_queue(&conn)?;
            println!("Cleared {} entry(ies) from the queue.", removed);
        }
        Commands::LogsPrune => {
            let conn = lib::db::open_or_create(&cfg.db_path)?;
            let removed = lib::db::clear_old_action_logs(&conn, cfg.log_retention_days)?;
            println!(
                "Pruned {} action-log entry(ies) older than {} days.",
                removed, cfg.log_retention_days
            );
        }
    }

    Ok(())
}
