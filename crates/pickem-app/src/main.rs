// Pick'em leaderboard service entry point.
//
// Startup sequence:
// 1. Initialize tracing (log to file)
// 2. Load config
// 3. Open database
// 4. Build the contest and import entries
// 5. Build the game lookup and leaderboard service
// 6. Spawn WebSocket server and poller (first refresh runs at once)
// 7. Wait for Ctrl+C, then shut down

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use pickem_app::app::{self, LeaderboardService, RequestHandler};
use pickem_app::config::{self, SourceKind};
use pickem_app::db::Database;
use pickem_app::espn::{EspnClient, SnapshotLookup};
use pickem_app::ws_server;
use pickem_core::lookup::GameLookup;
use tokio::sync::watch;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing()?;
    info!("Pick'em service starting up");

    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: contest={} ({}), week {}",
        config.contest.id,
        config.contest.name,
        config.contest.week_key()
    );

    let db = Database::open(&config.db_path).context("failed to open database")?;
    info!("Database opened at {}", config.db_path);

    let contest = config
        .contest
        .build_contest()
        .context("invalid contest definition")?;

    let csv_path = Path::new(&config.contest.entries_csv);
    let contest_entries =
        app::load_contest_entries(&db, &config.contest.id, &contest, csv_path)?;
    info!("{} entries in contest", contest_entries.len());

    let lookup: Arc<dyn GameLookup> = match config.source.kind {
        SourceKind::Espn => {
            let timeout = Duration::from_secs(config.source.timeout_secs);
            Arc::new(EspnClient::new(config.source.base_url.clone(), timeout)?)
        }
        SourceKind::Snapshot => Arc::new(SnapshotLookup::new(config.source.snapshot_dir.clone())),
    };

    let service = Arc::new(LeaderboardService::new(
        config.contest.id.clone(),
        contest,
        config.contest.week_key(),
        contest_entries,
        config.tie_policy,
        lookup,
        db,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let ws_port = config.ws_port;
    let handler: Arc<dyn RequestHandler> = service.clone();
    let updates = service.subscribe();
    let ws_handle = tokio::spawn(async move {
        match ws_server::bind(ws_port).await {
            Ok(listener) => {
                if let Err(e) = ws_server::run(listener, handler, updates).await {
                    error!("WebSocket server error: {}", e);
                }
            }
            Err(e) => {
                error!("Failed to bind WebSocket server on port {}: {}", ws_port, e);
            }
        }
    });

    let poll_interval = Duration::from_secs(config.poll_interval_secs);
    let poller_handle = tokio::spawn(app::run_poller(service.clone(), poll_interval, shutdown_rx));

    info!("Ready. WebSocket server listening on 127.0.0.1:{}", ws_port);

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;
    info!("Shutdown requested");

    let _ = shutdown_tx.send(true);
    let _ = tokio::time::timeout(Duration::from_secs(5), async {
        let _ = poller_handle.await;
    })
    .await;

    // The server loops forever.
    ws_handle.abort();

    info!("Pick'em service shut down cleanly");
    Ok(())
}

/// Initialize tracing to log to `logs/pickem.log`.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("pickem.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("pickem=info,pickem_app=info,pickem_core=info,warn")
        }))
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
