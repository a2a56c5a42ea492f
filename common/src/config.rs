use chrono::{Datelike, NaiveDate, NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Rotation strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationMode {
    /// Round-robin through the rotation source every `interval_minutes`
    #[default]
    Time,
    /// One wallpaper per calendar day, keyed by weekday
    Weekday,
}

impl RotationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Time => "time",
            Self::Weekday => "weekday",
        }
    }
}

/// Media assigned to one day of the week
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct WeekdayPlaylist {
    #[serde(default)]
    pub use_folder: bool,

    #[serde(default)]
    pub folder: Option<String>,

    #[serde(default, alias = "wallpapers")]
    pub images: Vec<String>,
}

/// Main configuration document, persisted as JSON
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub mode: RotationMode,

    #[serde(default = "default_interval")]
    pub interval_minutes: u64,

    /// Manual rotation list; order is rotation order
    #[serde(default)]
    pub wallpapers: Vec<String>,

    #[serde(default)]
    pub wallpaper_folder: Option<String>,

    #[serde(default)]
    pub use_folder: bool,

    /// Legacy single image per day
    #[serde(default = "default_weekday_wallpapers")]
    pub weekday_wallpapers: BTreeMap<String, Option<String>>,

    #[serde(default = "default_weekday_playlists")]
    pub weekday_playlists: BTreeMap<String, WeekdayPlaylist>,

    #[serde(default = "default_interval")]
    pub weekday_rotation_minutes: u64,

    #[serde(default)]
    pub last_change: Option<NaiveDateTime>,

    /// Round-robin cursor into the active source (time mode)
    #[serde(default)]
    pub current_index: usize,

    /// Fields this version does not know about, kept verbatim
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_interval() -> u64 {
    30
}

/// Weekday keys, Monday first
pub const WEEKDAY_KEYS: [&str; 7] = ["0", "1", "2", "3", "4", "5", "6"];

pub const WEEKDAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

fn default_weekday_wallpapers() -> BTreeMap<String, Option<String>> {
    WEEKDAY_KEYS.iter().map(|k| (k.to_string(), None)).collect()
}

fn default_weekday_playlists() -> BTreeMap<String, WeekdayPlaylist> {
    WEEKDAY_KEYS
        .iter()
        .map(|k| (k.to_string(), WeekdayPlaylist::default()))
        .collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: RotationMode::default(),
            interval_minutes: default_interval(),
            wallpapers: Vec::new(),
            wallpaper_folder: None,
            use_folder: false,
            weekday_wallpapers: default_weekday_wallpapers(),
            weekday_playlists: default_weekday_playlists(),
            weekday_rotation_minutes: default_interval(),
            last_change: None,
            current_index: 0,
            extra: serde_json::Map::new(),
        }
    }
}

/// Weekday key for a date (`"0"` = Monday)
pub fn weekday_key(date: NaiveDate) -> String {
    date.weekday().num_days_from_monday().to_string()
}

/// Parse a weekday given as `0`-`6` or an English day name
pub fn parse_weekday(input: &str) -> Option<String> {
    let lower = input.trim().to_lowercase();
    if let Ok(n) = lower.parse::<u8>() {
        return (n < 7).then(|| n.to_string());
    }

    WEEKDAY_NAMES
        .iter()
        .position(|name| lower.len() >= 3 && name.to_lowercase().starts_with(&lower))
        .map(|i| i.to_string())
}

/// Display name for a weekday key
pub fn weekday_name(key: &str) -> Option<&'static str> {
    let index: usize = key.parse().ok()?;
    WEEKDAY_NAMES.get(index).copied()
}

/// Expand a leading `~` in a stored path
pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).to_string())
}

impl Config {
    /// Time-mode interval, never shorter than one minute
    pub fn interval(&self) -> TimeDelta {
        TimeDelta::minutes(self.interval_minutes.clamp(1, u32::MAX as u64) as i64)
    }

    /// Append a path unless it is already present. Returns `false` if it was.
    pub fn add_wallpaper(&mut self, path: impl Into<String>) -> bool {
        let path = path.into();
        if self.wallpapers.contains(&path) {
            return false;
        }
        self.wallpapers.push(path);
        true
    }

    /// Remove a path from the manual list. Returns `false` if it was absent.
    pub fn remove_wallpaper(&mut self, path: &str) -> bool {
        let before = self.wallpapers.len();
        self.wallpapers.retain(|p| p != path);
        let removed = self.wallpapers.len() != before;
        if removed && self.current_index >= self.wallpapers.len() {
            self.current_index = 0;
        }
        removed
    }

    pub fn clear_wallpapers(&mut self) {
        self.wallpapers.clear();
        self.current_index = 0;
    }

    /// Rotate through the manual list
    pub fn use_manual_list(&mut self) {
        if self.use_folder {
            self.use_folder = false;
            self.current_index = 0;
        }
    }

    /// Rotate through every supported file in `folder`
    pub fn use_folder_source(&mut self, folder: impl Into<String>) {
        let folder = folder.into();
        if !self.use_folder || self.wallpaper_folder.as_deref() != Some(folder.as_str()) {
            self.current_index = 0;
        }
        self.wallpaper_folder = Some(folder);
        self.use_folder = true;
    }

    /// Replace one weekday playlist, keeping the legacy single-image entry in step
    pub fn set_weekday_playlist(&mut self, day: &str, playlist: WeekdayPlaylist) {
        let legacy = if playlist.use_folder {
            None
        } else {
            playlist.images.first().cloned()
        };
        self.weekday_wallpapers.insert(day.to_string(), legacy);
        self.weekday_playlists.insert(day.to_string(), playlist);
    }

    /// Enforce the invariants a freshly loaded document must satisfy
    pub(crate) fn normalize(&mut self) {
        let mut seen = std::collections::HashSet::new();
        let before = self.wallpapers.len();
        self.wallpapers.retain(|p| seen.insert(p.clone()));
        if self.wallpapers.len() != before {
            log::warn!(
                "Dropped {} duplicate wallpaper entries",
                before - self.wallpapers.len()
            );
        }

        for key in WEEKDAY_KEYS {
            self.weekday_wallpapers.entry(key.to_string()).or_insert(None);
            self.weekday_playlists.entry(key.to_string()).or_default();
        }
    }
}
