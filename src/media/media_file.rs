//! Media file records and media information gathering

use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncReadExt;
use tracing::debug;

use super::ArtworkKind;

/// What a file on disk is to the library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaFileKind {
    Video,
    Poster,
    Fanart,
    Banner,
    Thumb,
    ClearArt,
    Disc,
    Logo,
    ClearLogo,
    Subtitle,
    Unknown,
}

impl MediaFileKind {
    /// Whether this kind is one of the artwork kinds.
    pub fn is_artwork(&self) -> bool {
        ArtworkKind::from_media_file_kind(*self).is_some()
    }
}

impl From<ArtworkKind> for MediaFileKind {
    fn from(kind: ArtworkKind) -> Self {
        match kind {
            ArtworkKind::Poster => MediaFileKind::Poster,
            ArtworkKind::Fanart => MediaFileKind::Fanart,
            ArtworkKind::Banner => MediaFileKind::Banner,
            ArtworkKind::Thumb => MediaFileKind::Thumb,
            ArtworkKind::ClearArt => MediaFileKind::ClearArt,
            ArtworkKind::Disc => MediaFileKind::Disc,
            ArtworkKind::Logo => MediaFileKind::Logo,
            ArtworkKind::ClearLogo => MediaFileKind::ClearLogo,
        }
    }
}

/// A single file belonging to a media entity, plus whatever media
/// information has been gathered for it so far.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaFile {
    pub path: PathBuf,
    pub kind: MediaFileKind,

    /// File size in bytes (0 until probed)
    #[serde(default)]
    pub size: u64,

    /// Container format derived from the extension (e.g. "mkv")
    #[serde(default)]
    pub container: Option<String>,

    /// Mime type; for artwork this is sniffed from the actual bytes
    #[serde(default)]
    pub mime: Option<String>,

    #[serde(default)]
    pub modified: Option<DateTime<Utc>>,

    /// Whether media information has been gathered for this file
    #[serde(default)]
    pub probed: bool,
}

impl MediaFile {
    pub fn new(path: impl Into<PathBuf>, kind: MediaFileKind) -> Self {
        Self {
            path: path.into(),
            kind,
            size: 0,
            container: None,
            mime: None,
            modified: None,
            probed: false,
        }
    }

    /// Gather media information from the filesystem.
    ///
    /// A no-op when already probed, unless `force` is set. Extensions lie, so
    /// artwork files additionally get their real type sniffed from the first
    /// bytes.
    pub async fn gather_media_information(&mut self, force: bool) -> io::Result<()> {
        if self.probed && !force {
            return Ok(());
        }

        let metadata = tokio::fs::metadata(&self.path).await?;
        self.size = metadata.len();
        self.modified = metadata.modified().ok().map(DateTime::<Utc>::from);
        self.container = self
            .path
            .extension()
            .and_then(OsStr::to_str)
            .map(|ext| ext.to_lowercase());
        self.mime = mime_guess::from_path(&self.path)
            .first()
            .map(|m| m.essence_str().to_string());

        if self.kind.is_artwork() {
            if let Some(sniffed) = sniff_mime(&self.path).await? {
                self.mime = Some(sniffed);
            }
        }

        self.probed = true;
        debug!(
            path = %self.path.display(),
            size = self.size,
            container = self.container.as_deref().unwrap_or(""),
            "gathered media information"
        );
        Ok(())
    }
}

/// Read the first bytes of a file and detect its actual type.
async fn sniff_mime(path: &Path) -> io::Result<Option<String>> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut head = [0u8; 512];
    let mut read = 0;
    while read < head.len() {
        let n = file.read(&mut head[read..]).await?;
        if n == 0 {
            break;
        }
        read += n;
    }
    Ok(infer::get(&head[..read]).map(|kind| kind.mime_type().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    // minimal valid PNG header
    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0, 0, 0, 0];

    #[tokio::test]
    async fn test_gather_media_information() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("episode.mkv");
        tokio::fs::write(&path, b"not really a video").await.unwrap();

        let mut file = MediaFile::new(&path, MediaFileKind::Video);
        file.gather_media_information(false).await.unwrap();

        assert!(file.probed);
        assert_eq!(file.size, 18);
        assert_eq!(file.container.as_deref(), Some("mkv"));
    }

    #[tokio::test]
    async fn test_artwork_mime_is_sniffed_not_guessed() {
        let dir = tempfile::tempdir().unwrap();
        // a PNG wearing a .jpg extension
        let path = dir.path().join("poster.jpg");
        tokio::fs::write(&path, PNG_MAGIC).await.unwrap();

        let mut file = MediaFile::new(&path, MediaFileKind::Poster);
        file.gather_media_information(false).await.unwrap();

        assert_eq!(file.mime.as_deref(), Some("image/png"));
    }

    #[tokio::test]
    async fn test_probe_is_idempotent_unless_forced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("episode.mkv");
        tokio::fs::write(&path, b"12345").await.unwrap();

        let mut file = MediaFile::new(&path, MediaFileKind::Video);
        file.gather_media_information(false).await.unwrap();
        assert_eq!(file.size, 5);

        tokio::fs::write(&path, b"1234567890").await.unwrap();
        file.gather_media_information(false).await.unwrap();
        assert_eq!(file.size, 5, "second probe without force must not re-read");

        file.gather_media_information(true).await.unwrap();
        assert_eq!(file.size, 10);
    }
}
