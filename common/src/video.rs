//! Static stand-ins for video wallpapers
//!
//! The desktop can only show a still image, so a video is represented by one
//! of its frames (extracted with FFmpeg) or, when that is not possible, by a
//! rendered placeholder that names the file.

use resvg::{tiny_skia, usvg};
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::{Result, WallpaperError};

/// File name of the extracted frame inside the scratch directory
pub const FRAME_FILE: &str = "video_frame.jpg";

/// File name of the rendered placeholder inside the scratch directory
pub const PLACEHOLDER_FILE: &str = "video_placeholder.png";

const PLACEHOLDER_WIDTH: u32 = 1920;
const PLACEHOLDER_HEIGHT: u32 = 1080;

/// Extract the first frame of `video` into `scratch_dir`
///
/// # Errors
///
/// Returns an error if:
/// - The video file doesn't exist
/// - FFmpeg is not available
/// - FFmpeg fails or produces no output
pub fn extract_frame(video: &Path, scratch_dir: &Path) -> Result<PathBuf> {
    if !video.exists() {
        return Err(WallpaperError::NotFound(video.display().to_string()));
    }

    std::fs::create_dir_all(scratch_dir)?;
    let frame_path = scratch_dir.join(FRAME_FILE);
    remove_stale(&frame_path)?;

    log::info!(
        "Extracting still frame: {} -> {}",
        video.display(),
        frame_path.display()
    );

    // -ss before -i seeks on the input, -frames:v 1 stops after one picture,
    // -q:v 2 keeps JPEG quality high
    let output = Command::new("ffmpeg")
        .arg("-ss")
        .arg("0")
        .arg("-i")
        .arg(video)
        .arg("-frames:v")
        .arg("1")
        .arg("-q:v")
        .arg("2")
        .arg("-an")
        .arg("-loglevel")
        .arg("error")
        .arg("-y")
        .arg(&frame_path)
        .output()
        .map_err(|e| WallpaperError::Video(format!("Failed to execute ffmpeg: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(WallpaperError::Video(format!(
            "FFmpeg frame extraction failed: {}",
            stderr.trim()
        )));
    }

    if !frame_path.exists() {
        return Err(WallpaperError::Video("FFmpeg produced no frame".to_string()));
    }

    Ok(frame_path)
}

/// Drop a still left over from an earlier video so it cannot be mistaken for new output
fn remove_stale(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Render a placeholder image naming `video` into `scratch_dir`
pub fn render_placeholder(video: &Path, scratch_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(scratch_dir)?;
    let placeholder_path = scratch_dir.join(PLACEHOLDER_FILE);

    let name = video
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| video.display().to_string());
    let svg = placeholder_svg(&name);

    let mut options = usvg::Options::default();
    options.fontdb_mut().load_system_fonts();

    let tree = usvg::Tree::from_str(&svg, &options)
        .map_err(|e| WallpaperError::Video(format!("Invalid placeholder SVG: {}", e)))?;

    let mut pixmap = tiny_skia::Pixmap::new(PLACEHOLDER_WIDTH, PLACEHOLDER_HEIGHT)
        .ok_or_else(|| WallpaperError::Video("Failed to allocate placeholder".to_string()))?;
    resvg::render(&tree, tiny_skia::Transform::default(), &mut pixmap.as_mut());

    // The background is opaque, so premultiplied and straight RGBA coincide
    let rgba = image::RgbaImage::from_raw(
        PLACEHOLDER_WIDTH,
        PLACEHOLDER_HEIGHT,
        pixmap.data().to_vec(),
    )
    .ok_or_else(|| WallpaperError::Video("Placeholder buffer size mismatch".to_string()))?;

    image::DynamicImage::ImageRgba8(rgba)
        .to_rgb8()
        .save(&placeholder_path)
        .map_err(|e| WallpaperError::Media(format!("Failed to write placeholder: {}", e)))?;

    log::info!("Rendered video placeholder: {}", placeholder_path.display());
    Ok(placeholder_path)
}

fn placeholder_svg(file_name: &str) -> String {
    let cx = PLACEHOLDER_WIDTH / 2;
    let y = PLACEHOLDER_HEIGHT / 2 - 100;
    format!(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">
  <rect width="100%" height="100%" fill="#000000"/>
  <g font-family="Arial, Helvetica, sans-serif" text-anchor="middle">
    <text x="{cx}" y="{y0}" font-size="48" fill="#ffffff">VIDEO WALLPAPER</text>
    <text x="{cx}" y="{y1}" font-size="24" fill="#add8e6">{name}</text>
    <text x="{cx}" y="{y2}" font-size="24" fill="#ffa500">Video playback unavailable - showing a static image</text>
  </g>
</svg>"##,
        w = PLACEHOLDER_WIDTH,
        h = PLACEHOLDER_HEIGHT,
        cx = cx,
        y0 = y,
        y1 = y + 60,
        y2 = y + 120,
        name = escape_xml(file_name),
    )
}

fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("a&b<c>.mp4"), "a&amp;b&lt;c&gt;.mp4");
        assert_eq!(escape_xml("it's \"x\""), "it&apos;s &quot;x&quot;");
    }

    #[test]
    fn test_placeholder_svg_names_file() {
        let svg = placeholder_svg("beach & sun.mp4");
        assert!(svg.contains("beach &amp; sun.mp4"));
        assert!(svg.contains("VIDEO WALLPAPER"));
    }

    #[test]
    fn test_render_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let path = render_placeholder(Path::new("/videos/clip.mp4"), dir.path()).unwrap();
        assert_eq!(path, dir.path().join(PLACEHOLDER_FILE));

        let img = image::open(&path).unwrap();
        assert_eq!(img.width(), PLACEHOLDER_WIDTH);
        assert_eq!(img.height(), PLACEHOLDER_HEIGHT);
    }

    #[test]
    fn test_failed_extraction_leaves_no_stale_frame() {
        let dir = tempfile::tempdir().unwrap();
        let stale = dir.path().join(FRAME_FILE);
        std::fs::write(&stale, b"frame from another video").unwrap();

        // Not a decodable video, so FFmpeg fails (or is missing)
        let clip = dir.path().join("clip.mp4");
        std::fs::write(&clip, b"not really a video").unwrap();

        assert!(extract_frame(&clip, dir.path()).is_err());
        assert!(!stale.exists());
    }

    #[test]
    fn test_remove_stale_ignores_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(remove_stale(&dir.path().join(FRAME_FILE)).is_ok());
    }

    #[test]
    fn test_extract_frame_missing_video() {
        let dir = tempfile::tempdir().unwrap();
        let result = extract_frame(Path::new("/no/such/video.mp4"), dir.path());
        assert!(matches!(result, Err(WallpaperError::NotFound(_))));
    }
}
