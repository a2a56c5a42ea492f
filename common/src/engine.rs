//! Rotation engine
//!
//! Decides whether a wallpaper change is due, picks the next item and applies
//! it. All state lives in the [`Config`] owned by the engine's [`ConfigStore`];
//! the conceptual states are:
//!
//! - `Idle`: nothing is due yet
//! - `Applied`: an item was shown and `last_change` moved to now
//! - `Skipped`: a change was due but there was no media or applying failed;
//!   nothing but the time-mode cursor changes and the next poll retries

use chrono::{NaiveDate, NaiveDateTime};
use std::path::PathBuf;

use crate::applier::{Applier, DesktopBackend, SystemDesktop};
use crate::config::{Config, RotationMode, expand_path, weekday_key};
use crate::media::{MediaItem, list_media};
use crate::store::ConfigStore;

/// Result of one poll of the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RotationState {
    Idle,
    Applied(MediaItem),
    Skipped,
}

/// Result of a user-initiated change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeOutcome {
    Applied(MediaItem),
    NoMedia,
    Failed(MediaItem),
}

pub struct RotationEngine<B = SystemDesktop> {
    store: ConfigStore,
    applier: Applier<B>,
}

impl<B: DesktopBackend> RotationEngine<B> {
    pub fn new(store: ConfigStore, applier: Applier<B>) -> Self {
        Self { store, applier }
    }

    pub fn config(&self) -> &Config {
        self.store.config()
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ConfigStore {
        &mut self.store
    }

    pub fn applier(&self) -> &Applier<B> {
        &self.applier
    }

    /// Time-mode rotation source: the folder listing or the manual list
    pub fn active_source(&self) -> Vec<PathBuf> {
        let config = self.config();
        if config.use_folder {
            config
                .wallpaper_folder
                .as_deref()
                .map(|folder| list_media(expand_path(folder)))
                .unwrap_or_default()
        } else {
            config.wallpapers.iter().map(|p| expand_path(p)).collect()
        }
    }

    /// Media assigned to the weekday of `date`
    pub fn weekday_source(&self, date: NaiveDate) -> Vec<PathBuf> {
        self.day_source(&weekday_key(date))
    }

    /// Media assigned to one weekday key (`"0"` = Monday): the day's playlist,
    /// or the legacy single image when the playlist resolves empty
    pub fn day_source(&self, key: &str) -> Vec<PathBuf> {
        let config = self.config();

        let from_playlist: Vec<PathBuf> = match config.weekday_playlists.get(key) {
            Some(playlist) if playlist.use_folder => playlist
                .folder
                .as_deref()
                .map(|folder| list_media(expand_path(folder)))
                .unwrap_or_default(),
            Some(playlist) => playlist.images.iter().map(|p| expand_path(p)).collect(),
            None => Vec::new(),
        };

        if !from_playlist.is_empty() {
            return from_playlist;
        }

        config
            .weekday_wallpapers
            .get(key)
            .and_then(|path| path.as_deref())
            .map(|path| vec![expand_path(path)])
            .unwrap_or_default()
    }

    /// Whether a change is due at `now`
    pub fn should_change(&self, now: NaiveDateTime) -> bool {
        let config = self.config();
        let Some(last_change) = config.last_change else {
            return true;
        };

        match config.mode {
            RotationMode::Time => now - last_change >= config.interval(),
            RotationMode::Weekday => last_change.date() != now.date(),
        }
    }

    /// Pick the next item.
    ///
    /// In time mode the cursor advances and is persisted before the caller
    /// knows whether applying succeeds, so a failing item still uses its slot.
    pub fn select_next(&mut self, now: NaiveDateTime) -> Option<MediaItem> {
        match self.config().mode {
            RotationMode::Time => self.select_round_robin(),
            RotationMode::Weekday => self
                .weekday_source(now.date())
                .into_iter()
                .next()
                .map(MediaItem::classify),
        }
    }

    fn select_round_robin(&mut self) -> Option<MediaItem> {
        let source = self.active_source();
        if source.is_empty() {
            return None;
        }

        let mut index = self.config().current_index;
        if index >= source.len() {
            log::debug!(
                "Cursor {} out of range for {} items, restarting",
                index,
                source.len()
            );
            index = 0;
        }

        let item = MediaItem::classify(source[index].clone());
        self.store.config_mut().current_index = (index + 1) % source.len();
        self.store.save();

        Some(item)
    }

    /// One poll: change the wallpaper if a change is due
    pub fn run_once(&mut self, now: NaiveDateTime) -> RotationState {
        if !self.should_change(now) {
            return RotationState::Idle;
        }

        match self.change_now(now) {
            ChangeOutcome::Applied(item) => RotationState::Applied(item),
            ChangeOutcome::NoMedia => {
                log::debug!("Change due but no media available");
                RotationState::Skipped
            }
            ChangeOutcome::Failed(_) => RotationState::Skipped,
        }
    }

    /// Change the wallpaper now, regardless of whether a change is due
    pub fn change_now(&mut self, now: NaiveDateTime) -> ChangeOutcome {
        let Some(item) = self.select_next(now) else {
            return ChangeOutcome::NoMedia;
        };

        if !self.applier.apply(&item) {
            return ChangeOutcome::Failed(item);
        }

        self.store.config_mut().last_change = Some(now);
        self.store.save();
        ChangeOutcome::Applied(item)
    }

    /// Seconds until the next time-mode change; `None` in weekday mode
    pub fn seconds_until_next_change(&self, now: NaiveDateTime) -> Option<u64> {
        let config = self.config();
        if config.mode != RotationMode::Time {
            return None;
        }

        let Some(last_change) = config.last_change else {
            return Some(0);
        };

        let next = last_change.checked_add_signed(config.interval())?;
        Some((next - now).num_seconds().max(0) as u64)
    }

    /// Short description of the current mode for status displays
    pub fn status_title(&self, now: NaiveDateTime) -> String {
        match self.config().mode {
            RotationMode::Time => "Rotawall - time mode".to_string(),
            RotationMode::Weekday => format!("Rotawall - weekday mode ({})", now.format("%A")),
        }
    }
}
