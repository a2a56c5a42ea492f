//! JSON-backed configuration store.
//!
//! Loading never fails: a missing or malformed document falls back to the
//! defaults, and a partially valid one is merged over the defaults field by
//! field so that one bad entry does not discard the rest.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::config::Config;
use crate::{Result, WallpaperError};

/// Modification time and length of the backing file when last seen
type Fingerprint = (Option<SystemTime>, u64);

pub struct ConfigStore {
    path: PathBuf,
    config: Config,
    fingerprint: Option<Fingerprint>,
}

impl ConfigStore {
    /// Open the store at the default per-user location
    pub fn open_default() -> Result<Self> {
        Ok(Self::open(crate::default_config_path()?))
    }

    /// Open the store backed by `path`, loading whatever is there
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let mut store = Self {
            path: path.into(),
            config: Config::default(),
            fingerprint: None,
        };
        store.load();
        store
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// (Re)load the document from disk, replacing the in-memory copy
    pub fn load(&mut self) {
        self.config = load_document(&self.path);
        self.fingerprint = fingerprint(&self.path);
    }

    /// Write the whole configuration as indented JSON. Never panics or errors out;
    /// failures are logged and reported as `false`.
    pub fn save(&mut self) -> bool {
        match self.write_document() {
            Ok(()) => {
                self.fingerprint = fingerprint(&self.path);
                log::debug!("Saved configuration to {}", self.path.display());
                true
            }
            Err(e) => {
                log::error!("Failed to save config {}: {}", self.path.display(), e);
                false
            }
        }
    }

    fn write_document(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(&self.config)?;
        fs::write(&self.path, json)?;
        Ok(())
    }

    /// Reload if another process rewrote the file since we last touched it
    pub fn reload_if_changed(&mut self) -> bool {
        let current = fingerprint(&self.path);
        if current.is_none() || current == self.fingerprint {
            return false;
        }

        log::info!("Configuration changed on disk, reloading {}", self.path.display());
        self.load();
        true
    }

    /// Read one top-level field, falling back to `None` when absent or of another shape
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let doc = serde_json::to_value(&self.config).ok()?;
        let value = doc.get(key)?.clone();
        serde_json::from_value(value).ok()
    }

    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    /// Set one top-level field. Unknown keys are kept verbatim; a value that
    /// does not fit a known field is rejected and nothing changes.
    pub fn set<T: Serialize>(&mut self, key: &str, value: T) -> Result<()> {
        let mut updates = Map::new();
        updates.insert(key.to_string(), serde_json::to_value(value)?);
        self.update(updates)
    }

    /// Set several top-level fields at once (all or nothing)
    pub fn update(&mut self, updates: Map<String, Value>) -> Result<()> {
        let mut doc = serde_json::to_value(&self.config)?;
        let Some(fields) = doc.as_object_mut() else {
            return Err(WallpaperError::Config(
                "configuration is not an object".to_string(),
            ));
        };
        for (key, value) in updates {
            fields.insert(key, value);
        }

        self.config = serde_json::from_value(doc)?;
        Ok(())
    }
}

/// Load a configuration document, merging it over the defaults
pub fn load_document(path: &Path) -> Config {
    if !path.exists() {
        log::info!("Config file not found at {}, using defaults", path.display());
        return Config::default();
    }

    let loaded = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            log::warn!("Failed to read config file {}: {}", path.display(), e);
            return Config::default();
        }
    };

    let loaded: Value = match serde_json::from_str(&loaded) {
        Ok(value) => value,
        Err(e) => {
            log::warn!("Failed to parse config file {}: {}", path.display(), e);
            return Config::default();
        }
    };

    let mut config = merge_over_defaults(loaded);
    config.normalize();
    log::info!("Loaded configuration from {}", path.display());
    config
}

/// Merge `loaded` over the defaults one top-level field at a time, skipping
/// fields whose value would make the document invalid.
fn merge_over_defaults(loaded: Value) -> Config {
    let Value::Object(mut loaded) = loaded else {
        log::warn!("Config document is not a JSON object, using defaults");
        return Config::default();
    };
    rename_legacy_playlist_keys(&mut loaded);

    let mut accepted = match serde_json::to_value(Config::default()) {
        Ok(value) => value,
        Err(_) => return Config::default(),
    };

    for (key, value) in loaded {
        let mut candidate = accepted.clone();
        if let Some(fields) = candidate.as_object_mut() {
            let slot = fields.entry(key.clone()).or_insert(Value::Null);
            merge_values(slot, value);
        }

        if serde_json::from_value::<Config>(candidate.clone()).is_ok() {
            accepted = candidate;
        } else {
            log::warn!("Ignoring invalid config field '{}'", key);
        }
    }

    serde_json::from_value(accepted).unwrap_or_default()
}

/// Playlists written by older versions keep their images under `wallpapers`.
/// Move them to `images` before merging, or the merged record would carry both.
fn rename_legacy_playlist_keys(loaded: &mut Map<String, Value>) {
    let Some(Value::Object(playlists)) = loaded.get_mut("weekday_playlists") else {
        return;
    };

    for playlist in playlists.values_mut() {
        if let Value::Object(fields) = playlist
            && let Some(images) = fields.remove("wallpapers")
            && !fields.contains_key("images")
        {
            fields.insert("images".to_string(), images);
        }
    }
}

/// Recursively merge `overlay` into `base`; objects merge key by key,
/// everything else replaces.
fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                merge_values(base.entry(key).or_insert(Value::Null), value);
            }
        }
        (base, overlay) => *base = overlay,
    }
}

fn fingerprint(path: &Path) -> Option<Fingerprint> {
    let metadata = fs::metadata(path).ok()?;
    Some((metadata.modified().ok(), metadata.len()))
}
