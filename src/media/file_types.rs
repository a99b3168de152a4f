//! Shared file typing helpers
//!
//! Centralizes extension tables, artwork filename conventions, and the
//! on-disk extension normalization used by the artwork fetcher.

use std::ffi::OsStr;
use std::path::Path;

use super::ArtworkKind;

/// Video file extensions (lowercase, no dot)
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mkv", "mp4", "avi", "m4v", "mov", "wmv", "flv", "webm", "mpeg", "mpg", "ts", "m2ts",
];

/// Image file extensions (lowercase, no dot)
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp", "tbn"];

/// Check if a file is a video file based on extension
pub fn is_video_file(path: &Path) -> bool {
    has_extension_in(path, VIDEO_EXTENSIONS)
}

/// Check if a file is an image file based on extension
pub fn is_image_file(path: &Path) -> bool {
    has_extension_in(path, IMAGE_EXTENSIONS)
}

fn has_extension_in(path: &Path, table: &[&str]) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .map(|ext| table.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Normalize an artwork filename for on-disk consistency: `.jpeg` (any case)
/// becomes `.jpg`, everything else passes through untouched.
pub fn normalize_artwork_extension(filename: &str) -> String {
    let path = Path::new(filename);
    match path.extension().and_then(OsStr::to_str) {
        Some(ext) if ext.eq_ignore_ascii_case("jpeg") => path
            .with_extension("jpg")
            .to_string_lossy()
            .into_owned(),
        _ => filename.to_string(),
    }
}

/// Map a conventional artwork filename (e.g. `poster.jpg`, `fanart.png`)
/// to its artwork kind. Only image files qualify.
pub fn artwork_kind_for_filename(path: &Path) -> Option<ArtworkKind> {
    if !is_image_file(path) {
        return None;
    }
    let stem = path.file_stem().and_then(OsStr::to_str)?.to_lowercase();
    match stem.as_str() {
        "poster" | "cover" | "folder" => Some(ArtworkKind::Poster),
        "fanart" | "backdrop" => Some(ArtworkKind::Fanart),
        "banner" => Some(ArtworkKind::Banner),
        "thumb" | "landscape" => Some(ArtworkKind::Thumb),
        "clearart" => Some(ArtworkKind::ClearArt),
        "disc" | "discart" => Some(ArtworkKind::Disc),
        "logo" => Some(ArtworkKind::Logo),
        "clearlogo" => Some(ArtworkKind::ClearLogo),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_video_file() {
        assert!(is_video_file(Path::new("movie.mkv")));
        assert!(is_video_file(Path::new("MOVIE.MKV")));
        assert!(is_video_file(Path::new("/path/to/video.mp4")));
        assert!(!is_video_file(Path::new("poster.jpg")));
        assert!(!is_video_file(Path::new("no_extension")));
    }

    #[test]
    fn test_normalize_artwork_extension() {
        assert_eq!(normalize_artwork_extension("poster.jpeg"), "poster.jpg");
        assert_eq!(normalize_artwork_extension("poster.JPEG"), "poster.jpg");
        assert_eq!(normalize_artwork_extension("poster.jpg"), "poster.jpg");
        assert_eq!(normalize_artwork_extension("fanart.png"), "fanart.png");
        assert_eq!(normalize_artwork_extension("noext"), "noext");
    }

    #[test]
    fn test_artwork_kind_for_filename() {
        assert_eq!(
            artwork_kind_for_filename(Path::new("poster.jpg")),
            Some(ArtworkKind::Poster)
        );
        assert_eq!(
            artwork_kind_for_filename(Path::new("FANART.PNG")),
            Some(ArtworkKind::Fanart)
        );
        assert_eq!(
            artwork_kind_for_filename(Path::new("clearlogo.png")),
            Some(ArtworkKind::ClearLogo)
        );
        // right stem, wrong extension
        assert_eq!(artwork_kind_for_filename(Path::new("poster.mkv")), None);
        assert_eq!(artwork_kind_for_filename(Path::new("episode1.jpg")), None);
    }
}
