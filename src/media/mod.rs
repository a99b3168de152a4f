//! Media entity model
//!
//! The task engine only ever talks to entities through the narrow
//! [`MediaEntityOps`] callback interface; [`MediaItem`] is the concrete
//! directory-rooted entity the scanner produces.

pub mod entity;
pub mod file_types;
pub mod image_cache;
pub mod library;
pub mod media_file;

use serde::{Deserialize, Serialize};

pub use entity::{MediaEntityOps, MediaItem};
pub use image_cache::ImageCache;
pub use library::{EntityEvent, Library};
pub use media_file::{MediaFile, MediaFileKind};

/// The artwork kinds an entity can carry one canonical file of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtworkKind {
    Poster,
    Fanart,
    Banner,
    Thumb,
    ClearArt,
    Disc,
    Logo,
    ClearLogo,
}

impl ArtworkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtworkKind::Poster => "poster",
            ArtworkKind::Fanart => "fanart",
            ArtworkKind::Banner => "banner",
            ArtworkKind::Thumb => "thumb",
            ArtworkKind::ClearArt => "clearart",
            ArtworkKind::Disc => "disc",
            ArtworkKind::Logo => "logo",
            ArtworkKind::ClearLogo => "clearlogo",
        }
    }

    /// Inverse of `MediaFileKind::from(ArtworkKind)`.
    pub fn from_media_file_kind(kind: MediaFileKind) -> Option<Self> {
        match kind {
            MediaFileKind::Poster => Some(ArtworkKind::Poster),
            MediaFileKind::Fanart => Some(ArtworkKind::Fanart),
            MediaFileKind::Banner => Some(ArtworkKind::Banner),
            MediaFileKind::Thumb => Some(ArtworkKind::Thumb),
            MediaFileKind::ClearArt => Some(ArtworkKind::ClearArt),
            MediaFileKind::Disc => Some(ArtworkKind::Disc),
            MediaFileKind::Logo => Some(ArtworkKind::Logo),
            MediaFileKind::ClearLogo => Some(ArtworkKind::ClearLogo),
            _ => None,
        }
    }
}

impl std::fmt::Display for ArtworkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
