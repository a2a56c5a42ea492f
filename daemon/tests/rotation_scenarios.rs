/// End-to-end rotation behaviour against a real config file on disk,
/// with the desktop replaced by a recorder.
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use common::{
    Applier, ConfigStore, DesktopBackend, MediaItem, RotationEngine, RotationMode, RotationState,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
struct RecordingDesktop {
    calls: Arc<Mutex<Vec<PathBuf>>>,
}

impl DesktopBackend for RecordingDesktop {
    fn set_wallpaper(&self, path: &Path) -> common::Result<()> {
        self.calls.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }
}

fn engine_in(dir: &Path, desktop: &RecordingDesktop) -> RotationEngine<RecordingDesktop> {
    let store = ConfigStore::open(dir.join("config.json"));
    let applier = Applier::with_scratch_dir(desktop.clone(), dir.join("scratch"));
    RotationEngine::new(store, applier)
}

fn touch(dir: &Path, name: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, b"data").unwrap();
    path.to_string_lossy().to_string()
}

/// 2024-05-01 was a Wednesday
fn wednesday(h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 5, 1)
        .unwrap()
        .and_hms_opt(h, m, 0)
        .unwrap()
}

#[test]
fn test_empty_manual_list_does_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let desktop = RecordingDesktop::default();
    let mut engine = engine_in(dir.path(), &desktop);

    assert_eq!(engine.select_next(wednesday(9, 0)), None);
    assert_eq!(engine.run_once(wednesday(9, 0)), RotationState::Skipped);
    assert!(engine.config().last_change.is_none());
    assert!(desktop.calls.lock().unwrap().is_empty());
}

#[test]
fn test_time_mode_first_run_and_persistence() {
    let dir = tempfile::tempdir().unwrap();
    let desktop = RecordingDesktop::default();
    let a = touch(dir.path(), "a.jpg");
    let b = touch(dir.path(), "b.mp4");
    let c = touch(dir.path(), "c.png");

    let mut engine = engine_in(dir.path(), &desktop);
    for path in [&a, &b, &c] {
        engine.store_mut().config_mut().add_wallpaper(path.as_str());
    }

    let now = wednesday(9, 0);
    assert_eq!(
        engine.run_once(now),
        RotationState::Applied(MediaItem::Image(PathBuf::from(&a)))
    );
    assert_eq!(engine.config().current_index, 1);
    assert_eq!(engine.config().last_change, Some(now));

    // Both the cursor and the timestamp survive a restart
    let reopened = ConfigStore::open(dir.path().join("config.json"));
    assert_eq!(reopened.config().current_index, 1);
    assert_eq!(reopened.config().last_change, Some(now));

    // Not due again until the 30 minute default interval has passed
    assert_eq!(
        engine.run_once(now + TimeDelta::minutes(29)),
        RotationState::Idle
    );
    let state = engine.run_once(now + TimeDelta::minutes(30));
    assert!(matches!(state, RotationState::Applied(MediaItem::Video(_))));

    let calls = desktop.calls.lock().unwrap();
    assert_eq!(calls.len(), 2);
    assert!(calls[0].ends_with("a.jpg"));
    assert!(!calls[1].ends_with("b.mp4"));
}

#[test]
fn test_weekday_mode_changes_once_on_the_new_day() {
    let dir = tempfile::tempdir().unwrap();
    let desktop = RecordingDesktop::default();
    let image = touch(dir.path(), "c.jpg");

    let mut engine = engine_in(dir.path(), &desktop);
    {
        let config = engine.store_mut().config_mut();
        config.mode = RotationMode::Weekday;
        config
            .weekday_wallpapers
            .insert("2".to_string(), Some(image.clone()));
        config.last_change = Some(wednesday(9, 0) - TimeDelta::days(1));
    }

    assert_eq!(
        engine.run_once(wednesday(8, 0)),
        RotationState::Applied(MediaItem::Image(PathBuf::from(&image)))
    );
    assert_eq!(engine.config().last_change, Some(wednesday(8, 0)));
    assert_eq!(engine.run_once(wednesday(20, 0)), RotationState::Idle);
    assert_eq!(desktop.calls.lock().unwrap().len(), 1);
}

#[test]
fn test_folder_source_replaces_manual_list() {
    let dir = tempfile::tempdir().unwrap();
    let desktop = RecordingDesktop::default();
    let folder = dir.path().join("walls");
    std::fs::create_dir(&folder).unwrap();
    touch(&folder, "y.mp4");
    touch(&folder, "x.png");
    touch(&folder, "notes.txt");

    let mut engine = engine_in(dir.path(), &desktop);
    {
        let config = engine.store_mut().config_mut();
        config.add_wallpaper("z.jpg");
        config.use_folder_source(folder.to_string_lossy().to_string());
    }

    assert_eq!(
        engine.active_source(),
        vec![folder.join("x.png"), folder.join("y.mp4")]
    );
}

#[test]
fn test_external_edit_then_reload() {
    let dir = tempfile::tempdir().unwrap();
    let desktop = RecordingDesktop::default();
    let mut engine = engine_in(dir.path(), &desktop);
    assert!(engine.store_mut().save());

    let added = touch(dir.path(), "later.jpg");
    let mut editor = ConfigStore::open(dir.path().join("config.json"));
    editor.config_mut().add_wallpaper(added.as_str());
    editor.config_mut().interval_minutes = 5;
    assert!(editor.save());

    assert!(engine.store_mut().reload_if_changed());
    assert_eq!(engine.config().interval_minutes, 5);
    assert!(matches!(
        engine.run_once(wednesday(9, 0)),
        RotationState::Applied(_)
    ));
}
