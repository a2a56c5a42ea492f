use std::path::{Path, PathBuf};

use crate::media::MediaItem;
use crate::{Result, WallpaperError, video};

/// The operating system's "set desktop background" facility
pub trait DesktopBackend: Send {
    /// Show the image at `path` (absolute) as the desktop background
    fn set_wallpaper(&self, path: &Path) -> Result<()>;
}

/// Backend that talks to the real desktop.
///
/// On Windows this ends up in `SystemParametersInfoW(SPI_SETDESKWALLPAPER)`
/// with `SPIF_UPDATEINIFILE | SPIF_SENDCHANGE`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemDesktop;

impl DesktopBackend for SystemDesktop {
    fn set_wallpaper(&self, path: &Path) -> Result<()> {
        let path_str = path
            .to_str()
            .ok_or_else(|| WallpaperError::Desktop(format!("Non UTF-8 path: {}", path.display())))?;

        wallpaper::set_from_path(path_str).map_err(|e| WallpaperError::Desktop(e.to_string()))
    }
}

/// Applies media items to the desktop, turning videos into still images first
pub struct Applier<B = SystemDesktop> {
    backend: B,
    scratch_dir: PathBuf,
}

impl<B: DesktopBackend> Applier<B> {
    pub fn new(backend: B) -> Self {
        Self::with_scratch_dir(backend, crate::default_scratch_dir())
    }

    pub fn with_scratch_dir(backend: B, scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            backend,
            scratch_dir: scratch_dir.into(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Apply `item` as the desktop wallpaper. Failures are logged, never raised.
    pub fn apply(&self, item: &MediaItem) -> bool {
        let result = match item {
            MediaItem::Image(path) => self.apply_image(path),
            MediaItem::Video(path) => self.apply_video(path),
        };

        match result {
            Ok(()) => {
                log::info!("Wallpaper set: {}", item.path().display());
                true
            }
            Err(e) => {
                log::warn!("Failed to set wallpaper {}: {}", item.path().display(), e);
                false
            }
        }
    }

    fn apply_image(&self, path: &Path) -> Result<()> {
        let absolute = std::path::absolute(path)?;
        if !absolute.is_file() {
            return Err(WallpaperError::NotFound(absolute.display().to_string()));
        }
        self.backend.set_wallpaper(&absolute)
    }

    /// Best effort: a still frame of the video, else a placeholder naming it
    fn apply_video(&self, path: &Path) -> Result<()> {
        if !path.is_file() {
            return Err(WallpaperError::NotFound(path.display().to_string()));
        }

        let still = match video::extract_frame(path, &self.scratch_dir) {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("Frame extraction unavailable ({}), using placeholder", e);
                video::render_placeholder(path, &self.scratch_dir)?
            }
        };

        self.apply_image(&still)
    }
}
