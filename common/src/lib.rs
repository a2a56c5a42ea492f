//! Common types and utilities for Rotawall.
//!
//! This crate holds everything the daemon (`rotawall`) and the control
//! client (`rwctl`) share: the persisted rotation configuration, media
//! classification, the wallpaper applier and the rotation engine itself.
//!
//! # Examples
//!
//! ```no_run
//! use common::{Applier, ConfigStore, RotationEngine, SystemDesktop};
//!
//! let store = ConfigStore::open_default().unwrap();
//! let applier = Applier::new(SystemDesktop);
//! let mut engine = RotationEngine::new(store, applier);
//!
//! // One poll: change the wallpaper if a change is due.
//! let state = engine.run_once(chrono::Local::now().naive_local());
//! println!("{state:?}");
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod applier;
pub mod config;
pub mod engine;
pub mod media;
pub mod store;
pub mod video;

pub use applier::{Applier, DesktopBackend, SystemDesktop};
pub use config::{Config, RotationMode, WeekdayPlaylist};
pub use engine::{ChangeOutcome, RotationEngine, RotationState};
pub use media::{MediaItem, is_supported, is_video, list_media};
pub use store::ConfigStore;

/// Common error types shared between client and daemon.
#[derive(Error, Debug, Serialize, Deserialize)]
pub enum WallpaperError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Media error: {0}")]
    Media(String),

    #[error("Video error: {0}")]
    Video(String),

    #[error("Desktop error: {0}")]
    Desktop(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unsupported file type: {0}")]
    Unsupported(String),
}

impl From<std::io::Error> for WallpaperError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<serde_json::Error> for WallpaperError {
    fn from(e: serde_json::Error) -> Self {
        Self::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, WallpaperError>;

/// Name of the per-user application directory (config and cache).
pub const APP_DIR: &str = "rotawall";

/// Default location of the configuration document.
pub fn default_config_path() -> Result<std::path::PathBuf> {
    let dir = dirs::config_dir()
        .ok_or_else(|| WallpaperError::NotFound("user config directory".to_string()))?;
    Ok(dir.join(APP_DIR).join("config.json"))
}

/// Scratch directory for extracted video frames and placeholders.
pub fn default_scratch_dir() -> std::path::PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallpaper_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let wall_err: WallpaperError = io_err.into();
        assert!(matches!(wall_err, WallpaperError::Io(_)));

        let json_err = serde_json::from_str::<Config>("invalid json").unwrap_err();
        let wall_err: WallpaperError = json_err.into();
        assert!(matches!(wall_err, WallpaperError::Config(_)));
    }

    #[test]
    fn test_default_config_path() {
        if let Ok(path) = default_config_path() {
            assert!(path.ends_with("rotawall/config.json"));
        }
    }

    #[test]
    fn test_scratch_dir_is_app_scoped() {
        assert!(default_scratch_dir().ends_with(APP_DIR));
    }
}
