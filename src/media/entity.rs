//! Entity callback interface and the concrete library item
//!
//! Background jobs hold a shared handle to the entity they enrich and only
//! ever call through [`MediaEntityOps`]; they never inspect entity internals.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

use super::library::EntityEvent;
use super::media_file::{MediaFile, MediaFileKind};
use super::ArtworkKind;
use crate::fsops;

/// Sidecar filename written next to an item's media files.
pub const SIDECAR_NAME: &str = "curator.json";

/// Narrow callback contract between the task engine and whatever owns a
/// media record.
///
/// All bookkeeping methods are synchronous in-memory mutations; `persist`
/// is the only one that touches disk.
#[async_trait]
pub trait MediaEntityOps: Send + Sync {
    /// Current filename for this artwork kind, empty when none is set.
    fn artwork_filename(&self, kind: ArtworkKind) -> String;

    /// Drop all in-memory references to files of this artwork kind.
    /// Physical files are untouched.
    fn remove_artwork(&self, kind: ArtworkKind);

    /// Point the artwork reference of `kind` at `path`.
    fn set_artwork(&self, path: &Path, kind: ArtworkKind);

    /// Notify the entity that artwork of `kind` has been (re)written.
    fn artwork_written(&self, kind: ArtworkKind);

    /// Append or refresh a media file record (matched by path).
    fn add_media_file(&self, file: MediaFile);

    /// Directory the entity's files live in.
    fn base_dir(&self) -> PathBuf;

    /// Save the entity.
    async fn persist(&self) -> Result<()>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ItemState {
    artwork: HashMap<ArtworkKind, String>,
    media_files: Vec<MediaFile>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Sidecar {
    id: Uuid,
    title: String,
    #[serde(default)]
    artwork: HashMap<ArtworkKind, String>,
    #[serde(default)]
    media_files: Vec<MediaFile>,
}

/// A directory-rooted library item (movie, show, album).
///
/// Interior mutability keeps the [`MediaEntityOps`] methods callable from a
/// shared handle; state is persisted as a JSON sidecar written with the same
/// stage-then-rename discipline the artwork fetcher uses.
pub struct MediaItem {
    id: Uuid,
    title: String,
    base_dir: PathBuf,
    state: RwLock<ItemState>,
    events: broadcast::Sender<EntityEvent>,
}

impl MediaItem {
    pub fn new(
        base_dir: impl Into<PathBuf>,
        title: impl Into<String>,
        events: broadcast::Sender<EntityEvent>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            base_dir: base_dir.into(),
            state: RwLock::new(ItemState::default()),
            events,
        }
    }

    /// Load an item back from its sidecar, if the directory has one.
    pub async fn load(
        base_dir: &Path,
        events: broadcast::Sender<EntityEvent>,
    ) -> Result<Option<Self>> {
        let sidecar_path = base_dir.join(SIDECAR_NAME);
        let bytes = match tokio::fs::read(&sidecar_path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err).context("reading sidecar"),
        };
        let sidecar: Sidecar = serde_json::from_slice(&bytes)
            .with_context(|| format!("parsing {}", sidecar_path.display()))?;

        Ok(Some(Self {
            id: sidecar.id,
            title: sidecar.title,
            base_dir: base_dir.to_path_buf(),
            state: RwLock::new(ItemState {
                artwork: sidecar.artwork,
                media_files: sidecar.media_files,
            }),
            events,
        }))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn base_dir_ref(&self) -> &Path {
        &self.base_dir
    }

    /// All media file records, in insertion order.
    pub fn media_files(&self) -> Vec<MediaFile> {
        self.state.read().media_files.clone()
    }

    pub fn has_media_file(&self, path: &Path) -> bool {
        self.state
            .read()
            .media_files
            .iter()
            .any(|file| file.path == path)
    }

    fn publish(&self, event: EntityEvent) {
        let _ = self.events.send(event);
    }
}

impl std::fmt::Debug for MediaItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaItem")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("base_dir", &self.base_dir)
            .finish()
    }
}

#[async_trait]
impl MediaEntityOps for MediaItem {
    fn artwork_filename(&self, kind: ArtworkKind) -> String {
        self.state
            .read()
            .artwork
            .get(&kind)
            .cloned()
            .unwrap_or_default()
    }

    fn remove_artwork(&self, kind: ArtworkKind) {
        let mut state = self.state.write();
        state.artwork.remove(&kind);
        let file_kind = MediaFileKind::from(kind);
        state.media_files.retain(|file| file.kind != file_kind);
        debug!(item = %self.title, kind = %kind, "removed artwork references");
    }

    fn set_artwork(&self, path: &Path, kind: ArtworkKind) {
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        if filename.is_empty() {
            warn!(item = %self.title, path = %path.display(), "ignoring artwork path without filename");
            return;
        }

        let mut state = self.state.write();
        state.artwork.insert(kind, filename);

        let file_kind = MediaFileKind::from(kind);
        if !state.media_files.iter().any(|file| file.path == path) {
            state.media_files.push(MediaFile::new(path, file_kind));
        }
    }

    fn artwork_written(&self, kind: ArtworkKind) {
        self.publish(EntityEvent::ArtworkChanged {
            item: self.id,
            kind,
        });
    }

    fn add_media_file(&self, file: MediaFile) {
        let path = file.path.clone();
        let probed = file.probed;
        {
            let mut state = self.state.write();
            match state
                .media_files
                .iter_mut()
                .find(|existing| existing.path == file.path)
            {
                Some(existing) => *existing = file,
                None => state.media_files.push(file),
            }
        }
        if probed {
            self.publish(EntityEvent::MediaInfoUpdated {
                item: self.id,
                path,
            });
        }
    }

    fn base_dir(&self) -> PathBuf {
        self.base_dir.clone()
    }

    async fn persist(&self) -> Result<()> {
        let sidecar = {
            let state = self.state.read();
            Sidecar {
                id: self.id,
                title: self.title.clone(),
                artwork: state.artwork.clone(),
                media_files: state.media_files.clone(),
            }
        };
        let json = serde_json::to_vec_pretty(&sidecar).context("serializing sidecar")?;

        let path = self.base_dir.join(SIDECAR_NAME);
        // concurrent persists (scan + probe) stage under distinct names; the
        // final rename is atomic either way
        let staged = self.base_dir.join(format!(
            "{SIDECAR_NAME}.{}.part",
            chrono::Utc::now().timestamp_millis()
        ));
        tokio::fs::write(&staged, &json)
            .await
            .with_context(|| format!("writing {}", staged.display()))?;
        fsops::move_atomically(&staged, &path)
            .await
            .with_context(|| format!("replacing {}", path.display()))?;

        debug!(item = %self.title, path = %path.display(), "persisted sidecar");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> broadcast::Sender<EntityEvent> {
        broadcast::channel(16).0
    }

    #[test]
    fn test_artwork_bookkeeping() {
        let item = MediaItem::new("/library/Inception (2010)", "Inception", channel());
        assert_eq!(item.artwork_filename(ArtworkKind::Poster), "");

        item.set_artwork(
            Path::new("/library/Inception (2010)/poster.jpg"),
            ArtworkKind::Poster,
        );
        assert_eq!(item.artwork_filename(ArtworkKind::Poster), "poster.jpg");
        assert!(item.has_media_file(Path::new("/library/Inception (2010)/poster.jpg")));

        item.remove_artwork(ArtworkKind::Poster);
        assert_eq!(item.artwork_filename(ArtworkKind::Poster), "");
        assert!(!item.has_media_file(Path::new("/library/Inception (2010)/poster.jpg")));
    }

    #[test]
    fn test_add_media_file_upserts_by_path() {
        let item = MediaItem::new("/library/show", "Show", channel());

        let mut file = MediaFile::new("/library/show/e01.mkv", MediaFileKind::Video);
        item.add_media_file(file.clone());
        assert_eq!(item.media_files().len(), 1);
        assert_eq!(item.media_files()[0].size, 0);

        file.size = 42;
        file.probed = true;
        item.add_media_file(file);
        assert_eq!(item.media_files().len(), 1);
        assert_eq!(item.media_files()[0].size, 42);
    }

    #[tokio::test]
    async fn test_sidecar_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let events = channel();

        let item = MediaItem::new(dir.path(), "Inception", events.clone());
        item.set_artwork(&dir.path().join("poster.jpg"), ArtworkKind::Poster);
        item.persist().await.unwrap();

        // no staging leftovers
        let mut entries = tokio::fs::read_dir(dir.path()).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            assert!(
                !entry.file_name().to_string_lossy().ends_with(".part"),
                "staging leftover: {:?}",
                entry.file_name()
            );
        }

        let loaded = MediaItem::load(dir.path(), events)
            .await
            .unwrap()
            .expect("sidecar should load");
        assert_eq!(loaded.id(), item.id());
        assert_eq!(loaded.title(), "Inception");
        assert_eq!(loaded.artwork_filename(ArtworkKind::Poster), "poster.jpg");
    }

    #[tokio::test]
    async fn test_load_without_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        assert!(MediaItem::load(dir.path(), channel())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_artwork_written_publishes_event() {
        let (tx, mut rx) = broadcast::channel(16);
        let item = MediaItem::new("/library/x", "X", tx);

        item.artwork_written(ArtworkKind::Fanart);

        match rx.try_recv().unwrap() {
            EntityEvent::ArtworkChanged { item: id, kind } => {
                assert_eq!(id, item.id());
                assert_eq!(kind, ArtworkKind::Fanart);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
