//! Periodic rotation task
//!
//! The scheduler owns the [`RotationEngine`] outright. Everything else talks
//! to it through a [`SchedulerHandle`], which forwards requests over a
//! channel, so configuration reads and writes never race with a rotation in
//! progress. Engine work touches the disk and the desktop, so it runs on the
//! blocking pool with the engine moved in and back out.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use serde_json::{Map, Value};
use std::time::Duration;
use tokio::select;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use common::{ChangeOutcome, Config, DesktopBackend, RotationEngine, RotationState};

/// Receives status updates after every poll
pub trait StatusSink: Send + 'static {
    /// Time left until the next time-mode change
    fn countdown(&mut self, minutes: u64, seconds: u64);

    /// Short description of the current mode; only sent when it changes
    fn title(&mut self, title: &str);
}

/// Status sink that writes to the log
#[derive(Debug, Default)]
pub struct LoggingSink {
    last_minutes: Option<u64>,
}

impl StatusSink for LoggingSink {
    fn countdown(&mut self, minutes: u64, seconds: u64) {
        if self.last_minutes != Some(minutes) {
            log::debug!("Next change in {:02}:{:02}", minutes, seconds);
            self.last_minutes = Some(minutes);
        }
    }

    fn title(&mut self, title: &str) {
        log::info!("{}", title);
    }
}

enum Command {
    ChangeNow(oneshot::Sender<ChangeOutcome>),
    Snapshot(oneshot::Sender<Config>),
    Update(Map<String, Value>, oneshot::Sender<common::Result<()>>),
}

/// Handle to a running scheduler
pub struct SchedulerHandle {
    commands: mpsc::Sender<Command>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Change the wallpaper immediately, whether or not a change is due
    #[cfg_attr(not(unix), allow(dead_code))]
    pub async fn change_now(&self) -> Result<ChangeOutcome> {
        self.request(Command::ChangeNow).await
    }

    /// Copy of the configuration as the scheduler currently sees it
    #[cfg_attr(not(unix), allow(dead_code))]
    pub async fn snapshot(&self) -> Result<Config> {
        self.request(Command::Snapshot).await
    }

    /// Apply and persist several top-level fields at once
    pub async fn update(&self, updates: Map<String, Value>) -> Result<()> {
        self.request(|reply| Command::Update(updates, reply))
            .await?
            .context("Failed to update configuration")
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Cancel the task and wait up to `timeout` for it to finish.
    /// Returns `false` if it was still busy when the timeout elapsed.
    pub async fn stop(self, timeout: Duration) -> bool {
        self.cancel.cancel();
        match tokio::time::timeout(timeout, self.task).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                log::error!("Scheduler task failed: {}", e);
                true
            }
            Err(_) => {
                log::warn!("Scheduler did not stop within {:?}", timeout);
                false
            }
        }
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(command(reply_tx))
            .await
            .map_err(|_| anyhow::anyhow!("Scheduler is not running"))?;
        reply_rx.await.context("Scheduler stopped before replying")
    }
}

/// Start polling `engine` every `tick`
pub fn spawn<B, S>(engine: RotationEngine<B>, sink: S, tick: Duration) -> SchedulerHandle
where
    B: DesktopBackend + 'static,
    S: StatusSink,
{
    let (commands, command_rx) = mpsc::channel(16);
    let cancel = CancellationToken::new();
    let task = tokio::spawn(run(engine, sink, tick, command_rx, cancel.clone()));

    SchedulerHandle {
        commands,
        cancel,
        task,
    }
}

async fn run<B, S>(
    mut engine: RotationEngine<B>,
    mut sink: S,
    tick: Duration,
    mut command_rx: mpsc::Receiver<Command>,
    cancel: CancellationToken,
) where
    B: DesktopBackend + 'static,
    S: StatusSink,
{
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_title: Option<String> = None;

    log::info!("Scheduler started (poll every {:?})", tick);

    loop {
        select! {
            _ = cancel.cancelled() => break,

            _ = interval.tick() => {
                let Some((next, state)) = with_engine(engine, |engine| {
                    engine.store_mut().reload_if_changed();
                    engine.run_once(now())
                })
                .await else {
                    break;
                };
                engine = next;

                match state {
                    RotationState::Applied(item) => {
                        log::info!("Rotated to {} {}", item.kind_label(), item.path().display());
                    }
                    RotationState::Skipped => log::debug!("Rotation due but skipped"),
                    RotationState::Idle => {}
                }
                publish_status(&engine, &mut sink, &mut last_title);
            }

            command = command_rx.recv() => {
                let Some(command) = command else {
                    log::debug!("All scheduler handles dropped");
                    break;
                };

                match command {
                    Command::ChangeNow(reply) => {
                        let Some((next, outcome)) = with_engine(engine, |engine| {
                            engine.store_mut().reload_if_changed();
                            engine.change_now(now())
                        })
                        .await else {
                            break;
                        };
                        engine = next;
                        let _ = reply.send(outcome);
                        publish_status(&engine, &mut sink, &mut last_title);
                    }
                    Command::Snapshot(reply) => {
                        let _ = reply.send(engine.config().clone());
                    }
                    Command::Update(updates, reply) => {
                        let Some((next, result)) = with_engine(engine, |engine| -> common::Result<()> {
                            let store = engine.store_mut();
                            store.reload_if_changed();
                            store.update(updates)?;
                            store.save();
                            Ok(())
                        })
                        .await else {
                            break;
                        };
                        engine = next;
                        let _ = reply.send(result);
                        publish_status(&engine, &mut sink, &mut last_title);
                    }
                }
            }
        }
    }

    log::info!("Scheduler stopped");
}

/// Run `f` on the blocking pool. `None` if it panicked, which ends the loop.
async fn with_engine<B, T, F>(
    mut engine: RotationEngine<B>,
    f: F,
) -> Option<(RotationEngine<B>, T)>
where
    B: DesktopBackend + 'static,
    T: Send + 'static,
    F: FnOnce(&mut RotationEngine<B>) -> T + Send + 'static,
{
    let joined = tokio::task::spawn_blocking(move || {
        let out = f(&mut engine);
        (engine, out)
    })
    .await;

    match joined {
        Ok(pair) => Some(pair),
        Err(e) => {
            log::error!("Rotation step panicked: {}", e);
            None
        }
    }
}

fn publish_status<B: DesktopBackend, S: StatusSink>(
    engine: &RotationEngine<B>,
    sink: &mut S,
    last_title: &mut Option<String>,
) {
    let now = now();
    if let Some(seconds) = engine.seconds_until_next_change(now) {
        sink.countdown(seconds / 60, seconds % 60);
    }

    let title = engine.status_title(now);
    if last_title.as_deref() != Some(title.as_str()) {
        sink.title(&title);
        *last_title = Some(title);
    }
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Applier, ConfigStore, MediaItem};
    use serde_json::json;
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct FakeDesktop {
        calls: Arc<Mutex<Vec<PathBuf>>>,
    }

    impl DesktopBackend for FakeDesktop {
        fn set_wallpaper(&self, path: &Path) -> common::Result<()> {
            self.calls.lock().unwrap().push(path.to_path_buf());
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct RecordingSink {
        countdowns: Arc<Mutex<Vec<(u64, u64)>>>,
        titles: Arc<Mutex<Vec<String>>>,
    }

    impl StatusSink for RecordingSink {
        fn countdown(&mut self, minutes: u64, seconds: u64) {
            self.countdowns.lock().unwrap().push((minutes, seconds));
        }

        fn title(&mut self, title: &str) {
            self.titles.lock().unwrap().push(title.to_string());
        }
    }

    struct Fixture {
        dir: tempfile::TempDir,
        desktop: FakeDesktop,
        sink: RecordingSink,
    }

    impl Fixture {
        fn new(files: &[&str]) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let mut store = ConfigStore::open(dir.path().join("config.json"));
            for name in files {
                let path = dir.path().join(name);
                std::fs::write(&path, b"data").unwrap();
                store
                    .config_mut()
                    .add_wallpaper(path.to_string_lossy().to_string());
            }
            assert!(store.save());

            Self {
                dir,
                desktop: FakeDesktop::default(),
                sink: RecordingSink::default(),
            }
        }

        fn spawn(&self, tick: Duration) -> SchedulerHandle {
            let store = ConfigStore::open(self.dir.path().join("config.json"));
            let applier =
                Applier::with_scratch_dir(self.desktop.clone(), self.dir.path().join("scratch"));
            spawn(RotationEngine::new(store, applier), self.sink.clone(), tick)
        }
    }

    #[tokio::test]
    async fn test_first_tick_applies_and_reports_status() {
        let fx = Fixture::new(&["a.jpg", "b.jpg"]);
        let handle = fx.spawn(Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(200)).await;

        let snapshot = handle.snapshot().await.unwrap();
        assert!(snapshot.last_change.is_some());
        assert_eq!(snapshot.current_index, 1);
        // Interval is 30 minutes, so only the first tick changes anything
        assert_eq!(fx.desktop.calls.lock().unwrap().len(), 1);
        assert!(fx.sink.countdowns.lock().unwrap().iter().any(|&(m, _)| m >= 29));
        assert_eq!(
            fx.sink.titles.lock().unwrap().as_slice(),
            ["Rotawall - time mode"]
        );

        assert!(handle.stop(Duration::from_secs(2)).await);
    }

    #[tokio::test]
    async fn test_change_now_rotates_immediately() {
        let fx = Fixture::new(&["a.jpg", "b.jpg"]);
        let handle = fx.spawn(Duration::from_secs(3600));

        // The interval's first tick fires at once; wait for it to settle
        tokio::time::sleep(Duration::from_millis(100)).await;
        let outcome = handle.change_now().await.unwrap();
        let ChangeOutcome::Applied(item) = outcome else {
            panic!("expected a change, got {outcome:?}");
        };
        assert!(item.path().ends_with("b.jpg"));
        assert_eq!(fx.desktop.calls.lock().unwrap().len(), 2);

        assert!(handle.stop(Duration::from_secs(2)).await);
    }

    #[tokio::test]
    async fn test_update_is_validated_and_persisted() {
        let fx = Fixture::new(&[]);
        let handle = fx.spawn(Duration::from_secs(3600));

        let mut bad = Map::new();
        bad.insert("interval_minutes".into(), json!("soon"));
        assert!(handle.update(bad).await.is_err());

        let mut good = Map::new();
        good.insert("interval_minutes".into(), json!(5));
        handle.update(good).await.unwrap();
        assert_eq!(handle.snapshot().await.unwrap().interval_minutes, 5);

        let on_disk = ConfigStore::open(fx.dir.path().join("config.json"));
        assert_eq!(on_disk.config().interval_minutes, 5);

        assert!(handle.stop(Duration::from_secs(2)).await);
    }

    #[tokio::test]
    async fn test_external_edits_are_picked_up() {
        let fx = Fixture::new(&[]);
        let handle = fx.spawn(Duration::from_secs(3600));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(handle.change_now().await.unwrap(), ChangeOutcome::NoMedia);

        let added = fx.dir.path().join("added-later.png");
        std::fs::write(&added, b"png").unwrap();
        let mut other = ConfigStore::open(fx.dir.path().join("config.json"));
        other
            .config_mut()
            .add_wallpaper(added.to_string_lossy().to_string());
        assert!(other.save());

        assert_eq!(
            handle.change_now().await.unwrap(),
            ChangeOutcome::Applied(MediaItem::classify(&added))
        );
        assert!(handle.stop(Duration::from_secs(2)).await);
    }

    #[tokio::test]
    async fn test_stop_ends_the_task() {
        let fx = Fixture::new(&[]);
        let handle = fx.spawn(Duration::from_millis(10));
        assert!(handle.is_running());
        assert!(handle.stop(Duration::from_secs(2)).await);
    }

    #[test]
    fn test_logging_sink_tracks_minutes() {
        let mut sink = LoggingSink::default();
        sink.countdown(4, 59);
        sink.countdown(4, 58);
        assert_eq!(sink.last_minutes, Some(4));
        sink.countdown(3, 59);
        assert_eq!(sink.last_minutes, Some(3));
    }
}
