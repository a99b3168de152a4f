//! In-memory library registry and entity event fan-out

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use super::entity::MediaItem;
use super::ArtworkKind;

/// Event broadcast when an entity changes.
#[derive(Debug, Clone)]
pub enum EntityEvent {
    ItemAdded { item: Uuid },
    ArtworkChanged { item: Uuid, kind: ArtworkKind },
    MediaInfoUpdated { item: Uuid, path: PathBuf },
}

/// Registry of all known media items, keyed by id.
///
/// Items publish their changes onto the library's broadcast channel; UI or
/// CLI layers subscribe instead of registering per-item listeners.
pub struct Library {
    items: RwLock<HashMap<Uuid, Arc<MediaItem>>>,
    events_tx: broadcast::Sender<EntityEvent>,
}

impl Library {
    pub fn new() -> Self {
        let (events_tx, _) = broadcast::channel(256);
        Self {
            items: RwLock::new(HashMap::new()),
            events_tx,
        }
    }

    /// Subscribe to entity change events.
    pub fn subscribe(&self) -> broadcast::Receiver<EntityEvent> {
        self.events_tx.subscribe()
    }

    pub fn get(&self, id: Uuid) -> Option<Arc<MediaItem>> {
        self.items.read().get(&id).cloned()
    }

    pub fn find_by_dir(&self, dir: &Path) -> Option<Arc<MediaItem>> {
        self.items
            .read()
            .values()
            .find(|item| item.base_dir_ref() == dir)
            .cloned()
    }

    pub fn items(&self) -> Vec<Arc<MediaItem>> {
        self.items.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// Create a fresh item rooted at `dir` and register it.
    pub fn create_item(&self, dir: impl Into<PathBuf>, title: impl Into<String>) -> Arc<MediaItem> {
        let item = Arc::new(MediaItem::new(dir, title, self.events_tx.clone()));
        self.insert(item.clone());
        item
    }

    /// Registered item for `dir`, loading its sidecar or creating it fresh.
    pub async fn get_or_load(&self, dir: &Path, title: &str) -> Result<Arc<MediaItem>> {
        if let Some(existing) = self.find_by_dir(dir) {
            return Ok(existing);
        }

        let item = match MediaItem::load(dir, self.events_tx.clone()).await? {
            Some(loaded) => {
                debug!(dir = %dir.display(), title = %loaded.title(), "loaded item from sidecar");
                Arc::new(loaded)
            }
            None => Arc::new(MediaItem::new(dir, title, self.events_tx.clone())),
        };

        self.insert(item.clone());
        Ok(item)
    }

    fn insert(&self, item: Arc<MediaItem>) {
        let id = item.id();
        self.items.write().insert(id, item);
        let _ = self.events_tx.send(EntityEvent::ItemAdded { item: id });
    }
}

impl Default for Library {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_or_load_reuses_registered_item() {
        let dir = tempfile::tempdir().unwrap();
        let library = Library::new();

        let first = library.get_or_load(dir.path(), "Title").await.unwrap();
        let second = library.get_or_load(dir.path(), "Other").await.unwrap();
        assert_eq!(first.id(), second.id());
        assert_eq!(library.len(), 1);
    }

    #[tokio::test]
    async fn test_item_added_event() {
        let library = Library::new();
        let mut rx = library.subscribe();

        let item = library.create_item("/library/x", "X");

        match rx.try_recv().unwrap() {
            EntityEvent::ItemAdded { item: id } => assert_eq!(id, item.id()),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
