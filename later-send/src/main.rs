//! later-send - Background daemon for scheduled publishing
//!
//! Monitors the draft store and automatically publishes due drafts to
//! their target platform at the scheduled time.

use clap::Parser;
use liblatercast::credentials::CredentialManager;
use liblatercast::platforms::youtube::YoutubePublisher;
use liblatercast::platforms::Publisher;
use liblatercast::{
    Config, Database, FsMediaStore, OauthClient, Result, Scheduler, SchedulerOptions,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "later-send")]
#[command(version)]
#[command(about = "Background daemon for scheduled publishing")]
#[command(long_about = "\
later-send - Background daemon for scheduled publishing

DESCRIPTION:
    later-send is a long-running daemon that scans the Latercast draft
    store and automatically publishes due drafts to their target platform.

    Once per tick it fetches a bounded page of candidates, claims the due
    ones, refreshes the owner's OAuth credential when needed, streams the
    media object to the platform's upload endpoint, and deletes the draft
    on success. Failed attempts roll back and are retried on a later tick.

USAGE:
    # Run in foreground (logs to stderr)
    later-send

    # Run with custom poll interval
    later-send --poll-interval 30

    # Enable verbose logging
    later-send --verbose

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown (finishes the current tick)

CONFIGURATION:
    Configuration file: ~/.config/latercast/config.toml
    Database location: ~/.local/share/latercast/drafts.db

    [scheduler]
    poll_interval = 60          # seconds between ticks
    scan_limit = 500            # candidate drafts fetched per tick
    max_concurrency = 4         # drafts processed concurrently per tick
    per_draft_timeout_secs = 600
    pending_reclaim_ticks = 10  # pending older than this many ticks rolls back

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime error
    2 - Configuration error
")]
struct Cli {
    /// Poll interval in seconds (overrides config)
    #[arg(long, value_name = "SECONDS")]
    #[arg(help = "How often to scan for due drafts (default: 60)")]
    poll_interval: Option<u64>,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    #[arg(help = "Enable verbose logging (useful for debugging)")]
    verbose: bool,

    /// Run one tick and exit (for testing)
    #[arg(long, hide = true)]
    #[arg(help = "Process due drafts once and exit (for testing)")]
    once: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        error!("later-send failed: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let db = Database::new(&config.database.path).await?;

    info!("later-send daemon starting");

    let media = Arc::new(FsMediaStore::new(&config.media.root, &config.media.base_url));
    let oauth = Arc::new(OauthClient::new(config.oauth.clone()));
    let credentials = CredentialManager::new(db.clone(), oauth);
    let publishers: Vec<Arc<dyn Publisher>> = vec![Arc::new(YoutubePublisher::new())];

    let scheduler = Scheduler::new(
        db,
        media,
        credentials,
        publishers,
        SchedulerOptions::from_config(&config.scheduler),
    );

    // Set up graceful shutdown
    let shutdown = Arc::new(AtomicBool::new(false));
    setup_signal_handlers(shutdown.clone())?;

    let poll_interval = cli.poll_interval.unwrap_or(config.scheduler.poll_interval);
    info!("Poll interval: {}s", poll_interval);

    if cli.once {
        run_tick(&scheduler).await;
        info!("later-send: processed drafts once, exiting");
    } else {
        run_daemon_loop(&scheduler, poll_interval, shutdown).await;
    }

    info!("later-send daemon stopped");
    Ok(())
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: bool) {
    use liblatercast::logging::{LogFormat, LoggingConfig};

    let format = std::env::var("LATERCAST_LOG_FORMAT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(LogFormat::Text);
    let level = std::env::var("LATERCAST_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

    LoggingConfig::new(format, level, verbose).init();
}

/// Set up signal handlers for graceful shutdown
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM]).map_err(|e| {
        liblatercast::LatercastError::InvalidInput(format!("Signal setup failed: {}", e))
    })?;

    let shutdown_clone = shutdown.clone();
    std::thread::spawn(move || {
        for sig in signals.forever() {
            match sig {
                SIGTERM | SIGINT => {
                    info!("Received shutdown signal, stopping gracefully...");
                    shutdown_clone.store(true, Ordering::Relaxed);
                    break;
                }
                _ => {}
            }
        }
    });

    Ok(())
}

/// Main daemon loop. Ticks are serialized: one runs to completion before
/// the timer schedules the next.
async fn run_daemon_loop(scheduler: &Scheduler, poll_interval: u64, shutdown: Arc<AtomicBool>) {
    loop {
        if shutdown.load(Ordering::Relaxed) {
            info!("Shutdown requested, stopping daemon loop");
            break;
        }

        run_tick(scheduler).await;

        // Sleep until next tick (check shutdown every second)
        for _ in 0..poll_interval {
            if shutdown.load(Ordering::Relaxed) {
                break;
            }
            sleep(Duration::from_secs(1)).await;
        }
    }
}

/// One tick; a failed scan aborts only this tick and the next proceeds
/// independently.
async fn run_tick(scheduler: &Scheduler) {
    match scheduler.tick().await {
        Ok(summary) => {
            if summary.due > 0 || summary.reclaimed > 0 {
                info!(
                    "tick: scanned {}, due {}, published {}, deferred {}, failed {}, reclaimed {}",
                    summary.scanned,
                    summary.due,
                    summary.published,
                    summary.deferred,
                    summary.failed,
                    summary.reclaimed
                );
            }
        }
        Err(e) => {
            error!("tick aborted: {}", e);
        }
    }
}
