//! Media-information probing
//!
//! Probe jobs run on their own pool so bulk I/O never starves main or
//! background work. One job per file is preferred over batching - progress
//! reporting stays granular.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{Task, TaskKind};
use crate::error::TaskError;
use crate::media::{MediaEntityOps, MediaFile};

/// Gathers media information for files and feeds the results back into the
/// owning entity.
pub struct MediaInfoProbeJob {
    entity: Option<Arc<dyn MediaEntityOps>>,
    files: Vec<MediaFile>,
    force: bool,
}

impl MediaInfoProbeJob {
    /// Probe a single file.
    pub fn new(file: MediaFile, entity: Option<Arc<dyn MediaEntityOps>>, force: bool) -> Self {
        Self {
            entity,
            files: vec![file],
            force,
        }
    }

    /// Probe several files under one task.
    pub fn many(files: Vec<MediaFile>, entity: Option<Arc<dyn MediaEntityOps>>, force: bool) -> Self {
        Self {
            entity,
            files,
            force,
        }
    }

    pub fn into_task(self) -> Task {
        let label = match self.files.as_slice() {
            [single] => format!("gathering media information: {}", single.path.display()),
            files => format!("gathering media information for {} files", files.len()),
        };
        Task::new(TaskKind::Probe, "MediaInformation", label, |cancel| {
            self.run(cancel)
        })
    }

    pub async fn run(self, cancel: CancellationToken) -> Result<(), TaskError> {
        for mut file in self.files {
            if cancel.is_cancelled() {
                return Err(TaskError::Interrupted);
            }

            file.gather_media_information(self.force).await?;
            debug!(path = %file.path.display(), "probed media file");

            if let Some(entity) = &self.entity {
                entity.add_media_file(file);
            }
        }

        if let Some(entity) = &self.entity {
            entity.persist().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{MediaFileKind, MediaItem};

    #[tokio::test]
    async fn test_probe_updates_entity_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("episode.mkv");
        tokio::fs::write(&video, b"0123456789").await.unwrap();

        let item = Arc::new(MediaItem::new(
            dir.path(),
            "Show",
            tokio::sync::broadcast::channel(8).0,
        ));
        let entity: Arc<dyn MediaEntityOps> = item.clone();
        entity.add_media_file(MediaFile::new(&video, MediaFileKind::Video));

        let job = MediaInfoProbeJob::new(
            MediaFile::new(&video, MediaFileKind::Video),
            Some(entity),
            false,
        );
        job.run(CancellationToken::new()).await.unwrap();

        let files = item.media_files();
        assert_eq!(files.len(), 1);
        assert!(files[0].probed);
        assert_eq!(files[0].size, 10);
        assert!(dir.path().join(crate::media::entity::SIDECAR_NAME).exists());
    }

    #[tokio::test]
    async fn test_probe_missing_file_fails_with_io() {
        let dir = tempfile::tempdir().unwrap();
        let job = MediaInfoProbeJob::new(
            MediaFile::new(dir.path().join("gone.mkv"), MediaFileKind::Video),
            None,
            false,
        );

        assert!(matches!(
            job.run(CancellationToken::new()).await,
            Err(TaskError::Io(_))
        ));
    }

    #[tokio::test]
    async fn test_cancelled_probe_interrupts() {
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let job = MediaInfoProbeJob::new(
            MediaFile::new(dir.path().join("any.mkv"), MediaFileKind::Video),
            None,
            false,
        );
        assert!(matches!(
            job.run(cancel).await,
            Err(TaskError::Interrupted)
        ));
    }
}
