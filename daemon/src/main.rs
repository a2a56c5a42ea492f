mod scheduler;

use anyhow::Result;
use clap::Parser;
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::time::Duration;

use common::{
    Applier, ChangeOutcome, Config, ConfigStore, RotationEngine, RotationMode, SystemDesktop,
};

use crate::scheduler::{LoggingSink, SchedulerHandle};

/// Rotating desktop wallpaper daemon
#[derive(Parser, Debug)]
#[command(name = "rotawall", version, about)]
struct Args {
    /// Configuration file (defaults to the per-user config directory)
    #[arg(long, env = "ROTAWALL_CONFIG")]
    config: Option<PathBuf>,

    /// How often to check whether a change is due, in milliseconds
    #[arg(long, default_value_t = 1000, value_parser = clap::value_parser!(u64).range(10..))]
    tick_ms: u64,

    /// Set and persist the time-mode interval in minutes before starting
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    interval: Option<u64>,

    /// Change the wallpaper once and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    log::info!("Starting Rotawall v{}", env!("CARGO_PKG_VERSION"));

    let store = match args.config {
        Some(path) => ConfigStore::open(path),
        None => ConfigStore::open_default()?,
    };
    log::info!("Using config at: {}", store.path().display());
    log_config_summary(store.config());

    let engine = RotationEngine::new(store, Applier::new(SystemDesktop));

    if args.once {
        let outcome = tokio::task::spawn_blocking(move || {
            let mut engine = engine;
            engine.change_now(chrono::Local::now().naive_local())
        })
        .await?;

        match outcome {
            ChangeOutcome::Applied(item) => {
                log::info!("✓ Wallpaper set: {}", item.path().display());
                return Ok(());
            }
            ChangeOutcome::NoMedia => log::error!("No wallpapers available for the current mode"),
            ChangeOutcome::Failed(item) => {
                log::error!("Failed to set wallpaper: {}", item.path().display())
            }
        }
        std::process::exit(1);
    }

    let handle = scheduler::spawn(
        engine,
        LoggingSink::default(),
        Duration::from_millis(args.tick_ms),
    );

    if let Some(minutes) = args.interval {
        match handle.update(interval_update(minutes)).await {
            Ok(()) => log::info!("Interval set to {} min", minutes),
            Err(e) => log::error!("Failed to set interval: {:#}", e),
        }
    }

    wait_for_shutdown(&handle).await;

    if !handle.stop(Duration::from_secs(2)).await {
        log::warn!("Exiting with a rotation still in progress");
    }

    log::info!("Daemon shutting down");
    Ok(())
}

fn interval_update(minutes: u64) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert("interval_minutes".to_string(), Value::from(minutes));
    fields
}

fn log_config_summary(cfg: &Config) {
    log::info!("✓ Configuration loaded");
    log::info!("  Mode: {}", cfg.mode.as_str());
    match cfg.mode {
        RotationMode::Time => {
            log::info!("    - Interval: {} min", cfg.interval().num_minutes());
            if cfg.use_folder {
                log::info!(
                    "    - Source: folder {}",
                    cfg.wallpaper_folder.as_deref().unwrap_or("(not set)")
                );
            } else {
                log::info!("    - Source: {} listed file(s)", cfg.wallpapers.len());
            }
        }
        RotationMode::Weekday => {
            let assigned = cfg
                .weekday_playlists
                .iter()
                .filter(|(key, playlist)| {
                    (playlist.use_folder && playlist.folder.is_some())
                        || !playlist.images.is_empty()
                        || cfg.weekday_wallpapers.get(*key).is_some_and(Option::is_some)
                })
                .count();
            log::info!("    - Days with media: {}/7", assigned);
        }
    }
    match cfg.last_change {
        Some(ts) => log::info!("  Last change: {}", ts.format("%Y-%m-%d %H:%M:%S")),
        None => log::info!("  Last change: never"),
    }
}

/// Block until SIGINT or SIGTERM. SIGUSR1 changes the wallpaper now and
/// SIGHUP logs the live configuration.
#[cfg(unix)]
async fn wait_for_shutdown(handle: &SchedulerHandle) {
    use tokio::signal::unix::{SignalKind, signal};

    let (mut sigterm, mut sigint, mut sigusr1, mut sighup) = match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
        signal(SignalKind::user_defined1()),
        signal(SignalKind::hangup()),
    ) {
        (Ok(term), Ok(int), Ok(usr1), Ok(hup)) => (term, int, usr1, hup),
        _ => {
            log::warn!("Failed to set up signal handlers, only Ctrl-C will stop the daemon");
            wait_for_ctrl_c().await;
            return;
        }
    };

    loop {
        tokio::select! {
            _ = sigterm.recv() => {
                log::info!("Received SIGTERM, shutting down...");
                return;
            }
            _ = sigint.recv() => {
                log::info!("Received SIGINT, shutting down...");
                return;
            }
            _ = sigusr1.recv() => match handle.change_now().await {
                Ok(outcome) => log::info!("Manual change: {:?}", outcome),
                Err(e) => log::error!("Manual change failed: {}", e),
            },
            _ = sighup.recv() => match handle.snapshot().await {
                Ok(cfg) => log_config_summary(&cfg),
                Err(e) => log::error!("Failed to read configuration: {}", e),
            },
            _ = tokio::time::sleep(Duration::from_secs(1)) => {}
        }

        if !handle.is_running() {
            log::error!("Scheduler stopped unexpectedly");
            return;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown(handle: &SchedulerHandle) {
    tokio::select! {
        _ = wait_for_ctrl_c() => {}
        _ = async {
            while handle.is_running() {
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        } => log::error!("Scheduler stopped unexpectedly"),
    }
}

async fn wait_for_ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => log::info!("Received Ctrl-C, shutting down..."),
        Err(e) => log::error!("Failed to listen for Ctrl-C: {}", e),
    }
}
