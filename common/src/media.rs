//! Media classification by file extension.
//!
//! A path is a video when its extension is in [`VIDEO_EXTENSIONS`]; anything
//! else is treated as a candidate image. No decoding happens here.

use std::path::{Path, PathBuf};

/// Video container extensions (lowercase, without the dot).
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "wmv", "mkv", "flv", "webm", "m4v"];

/// Still image extensions (lowercase, without the dot).
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];

/// A rotation entry, classified once when it is resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaItem {
    Image(PathBuf),
    Video(PathBuf),
}

impl MediaItem {
    /// Classify a path by its extension
    pub fn classify(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if is_video(&path) {
            Self::Video(path)
        } else {
            Self::Image(path)
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::Image(path) | Self::Video(path) => path,
        }
    }

    pub fn is_video(&self) -> bool {
        matches!(self, Self::Video(_))
    }

    /// Human readable kind, used by the CLI
    pub fn kind_label(&self) -> &'static str {
        match self {
            Self::Image(_) => "image",
            Self::Video(_) => "video",
        }
    }
}

fn lowercase_extension(path: &Path) -> Option<String> {
    path.extension().map(|ext| ext.to_string_lossy().to_lowercase())
}

/// Check if a file is a video (case-insensitive extension match)
pub fn is_video(path: impl AsRef<Path>) -> bool {
    lowercase_extension(path.as_ref())
        .is_some_and(|ext| VIDEO_EXTENSIONS.contains(&ext.as_str()))
}

/// Check if a file has any supported image or video extension
pub fn is_supported(path: impl AsRef<Path>) -> bool {
    lowercase_extension(path.as_ref()).is_some_and(|ext| {
        IMAGE_EXTENSIONS.contains(&ext.as_str()) || VIDEO_EXTENSIONS.contains(&ext.as_str())
    })
}

/// List supported media directly inside `folder`, sorted by full path.
///
/// Not recursive. A missing or unreadable folder yields an empty list.
pub fn list_media(folder: impl AsRef<Path>) -> Vec<PathBuf> {
    let folder = folder.as_ref();

    let entries = match std::fs::read_dir(folder) {
        Ok(entries) => entries,
        Err(e) => {
            log::debug!("Cannot read media folder {}: {}", folder.display(), e);
            return Vec::new();
        }
    };

    let mut media: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_supported(path))
        .collect();

    media.sort();
    media
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_video_case_insensitive() {
        assert!(is_video("a.mp4"));
        assert!(is_video("a.MP4"));
        assert!(is_video("/videos/clip.WebM"));
        assert!(!is_video("a.jpg"));
        assert!(!is_video("no_extension"));
    }

    #[test]
    fn test_unknown_extension_is_image_candidate() {
        let item = MediaItem::classify("/tmp/picture.tiff");
        assert!(matches!(item, MediaItem::Image(_)));
        assert!(!is_supported("/tmp/picture.tiff"));
    }

    #[test]
    fn test_is_supported() {
        assert!(is_supported("x.JPEG"));
        assert!(is_supported("x.bmp"));
        assert!(is_supported("x.m4v"));
        assert!(!is_supported("x.txt"));
        assert!(!is_supported("x.gif"));
    }

    #[test]
    fn test_list_media_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.png", "a.MP4", "c.txt", "d.jpeg"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.png")).unwrap();

        let media = list_media(dir.path());
        let names: Vec<_> = media
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.MP4", "b.png", "d.jpeg"]);

        // Same contents, same order
        assert_eq!(list_media(dir.path()), media);
    }

    #[test]
    fn test_list_media_missing_folder() {
        assert!(list_media("/definitely/not/a/real/folder").is_empty());
    }
}
