//! Datasource scanning
//!
//! The canonical main task: walk the configured datasource directories,
//! register one library item per directory that holds video files, pick up
//! conventionally named artwork lying next to them, and queue probe jobs for
//! everything newly discovered.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::{MediaInfoProbeJob, Task, TaskKind, TaskManager};
use crate::error::TaskError;
use crate::media::file_types::{artwork_kind_for_filename, is_video_file};
use crate::media::{ArtworkKind, Library, MediaEntityOps, MediaFile, MediaFileKind};
use crate::messages::MessageSink;

/// One discovered directory worth of files.
#[derive(Debug, Default)]
struct DiscoveredDir {
    videos: Vec<PathBuf>,
    artwork: Vec<(PathBuf, ArtworkKind)>,
}

/// Walks datasources and refreshes the library. Runs on the main pool:
/// at most one datasource update at a time, process-wide.
pub struct DatasourceScanTask {
    library: Arc<Library>,
    manager: Arc<TaskManager>,
    datasources: Vec<PathBuf>,
    sink: MessageSink,
}

impl DatasourceScanTask {
    pub fn new(
        library: Arc<Library>,
        manager: Arc<TaskManager>,
        datasources: Vec<PathBuf>,
        sink: MessageSink,
    ) -> Self {
        Self {
            library,
            manager,
            datasources,
            sink,
        }
    }

    pub fn into_task(self) -> Task {
        Task::new(
            TaskKind::Main,
            "UpdateDatasource",
            "updating datasources",
            |cancel| self.run(cancel),
        )
    }

    pub async fn run(self, cancel: CancellationToken) -> Result<(), TaskError> {
        for datasource in &self.datasources {
            if cancel.is_cancelled() {
                return Err(TaskError::Interrupted);
            }

            if !datasource.is_dir() {
                warn!(datasource = %datasource.display(), "datasource not available");
                self.sink.warning(
                    "UpdateDatasource",
                    format!("datasource not available: {}", datasource.display()),
                );
                continue;
            }

            self.scan_datasource(datasource, &cancel).await?;
        }
        Ok(())
    }

    async fn scan_datasource(
        &self,
        datasource: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), TaskError> {
        info!(datasource = %datasource.display(), "scanning datasource");

        let discovered = discover(datasource.to_path_buf()).await?;
        info!(
            datasource = %datasource.display(),
            directories = discovered.len(),
            "datasource walk finished"
        );

        let mut new_files = 0usize;
        for (dir, found) in discovered {
            if cancel.is_cancelled() {
                return Err(TaskError::Interrupted);
            }

            let title = dir
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| dir.display().to_string());
            let item = self.library.get_or_load(&dir, &title).await?;

            for video in found.videos {
                if item.has_media_file(&video) {
                    continue;
                }
                let file = MediaFile::new(&video, MediaFileKind::Video);
                item.add_media_file(file.clone());
                new_files += 1;

                let entity: Arc<dyn MediaEntityOps> = item.clone();
                self.manager
                    .submit_probe(MediaInfoProbeJob::new(file, Some(entity), false).into_task());
            }

            for (path, kind) in found.artwork {
                if item.artwork_filename(kind).is_empty() {
                    debug!(item = %item.title(), kind = %kind, path = %path.display(), "adopting existing artwork");
                    item.set_artwork(&path, kind);
                }
            }

            item.persist().await?;
        }

        info!(
            datasource = %datasource.display(),
            new_files,
            items = self.library.len(),
            "datasource scan complete"
        );
        Ok(())
    }
}

/// Walk a datasource on the blocking pool and group findings per directory.
async fn discover(root: PathBuf) -> Result<BTreeMap<PathBuf, DiscoveredDir>, TaskError> {
    tokio::task::spawn_blocking(move || {
        let mut found: BTreeMap<PathBuf, DiscoveredDir> = BTreeMap::new();

        for entry in WalkDir::new(&root)
            .follow_links(true)
            .into_iter()
            .filter_map(|entry| entry.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let Some(parent) = path.parent() else {
                continue;
            };
            // items live in subdirectories; loose files in the datasource
            // root stay untouched
            if parent == root {
                continue;
            }

            if is_video_file(path) {
                found
                    .entry(parent.to_path_buf())
                    .or_default()
                    .videos
                    .push(path.to_path_buf());
            } else if let Some(kind) = artwork_kind_for_filename(path) {
                found
                    .entry(parent.to_path_buf())
                    .or_default()
                    .artwork
                    .push((path.to_path_buf(), kind));
            }
        }

        // directories with artwork but no video are not library items
        found.retain(|_, dir| !dir.videos.is_empty());
        found
    })
    .await
    .map_err(|err| TaskError::Unexpected(anyhow::anyhow!("datasource walk crashed: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::MessageLevel;
    use crate::tasks::TaskManagerConfig;
    use std::time::Duration;

    async fn drain(manager: &TaskManager) {
        for _ in 0..300 {
            if !manager.is_any_running() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("manager did not drain");
    }

    #[tokio::test]
    async fn test_scan_registers_items_and_probes_files() {
        let datasource = tempfile::tempdir().unwrap();
        let movie_dir = datasource.path().join("Inception (2010)");
        tokio::fs::create_dir(&movie_dir).await.unwrap();
        tokio::fs::write(movie_dir.join("inception.mkv"), b"video bytes")
            .await
            .unwrap();
        tokio::fs::write(movie_dir.join("poster.jpg"), b"poster bytes")
            .await
            .unwrap();
        // noise that must be ignored
        tokio::fs::write(movie_dir.join("notes.txt"), b"x").await.unwrap();

        let sink = MessageSink::with_defaults();
        let manager = Arc::new(TaskManager::new(TaskManagerConfig::default(), sink.clone()));
        let library = Arc::new(Library::new());

        let scan = DatasourceScanTask::new(
            library.clone(),
            manager.clone(),
            vec![datasource.path().to_path_buf()],
            sink,
        );
        assert!(manager.submit_main(scan.into_task()));
        drain(&manager).await;

        assert_eq!(library.len(), 1);
        let item = library.find_by_dir(&movie_dir).expect("item registered");
        assert_eq!(item.title(), "Inception (2010)");
        assert_eq!(item.artwork_filename(ArtworkKind::Poster), "poster.jpg");

        let files = item.media_files();
        let video = files
            .iter()
            .find(|file| file.kind == MediaFileKind::Video)
            .expect("video recorded");
        assert!(video.probed, "probe job must have run");
        assert_eq!(video.size, 11);
    }

    #[tokio::test]
    async fn test_missing_datasource_posts_warning() {
        let sink = MessageSink::with_defaults();
        let mut messages = sink.subscribe();
        let manager = Arc::new(TaskManager::new(TaskManagerConfig::default(), sink.clone()));
        let library = Arc::new(Library::new());

        let scan = DatasourceScanTask::new(
            library,
            manager.clone(),
            vec![PathBuf::from("/definitely/not/here")],
            sink,
        );
        assert!(manager.submit_main(scan.into_task()));
        drain(&manager).await;

        let message = messages.recv().await.unwrap();
        assert_eq!(message.level, MessageLevel::Warning);
        assert!(message.text.contains("datasource not available"));
    }
}
