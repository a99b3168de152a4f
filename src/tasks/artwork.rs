//! Artwork acquisition
//!
//! One [`ArtworkFetchJob`] per requested asset: download into a staged
//! `.part` file, validate, then atomically swap it onto the destination. The
//! destination is only ever the old file or the complete new one - a partial
//! write can exist solely under the staged name, which is cleaned up on every
//! exit path. Primary jobs roll the entity back to its previous artwork
//! reference when anything fails.
//!
//! Caller contract: never run two primary jobs for the same entity and
//! artwork kind concurrently; nothing in here serializes them.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use super::{Task, TaskKind};
use crate::error::TaskError;
use crate::fetch::UrlFetcher;
use crate::fsops;
use crate::media::file_types::normalize_artwork_extension;
use crate::media::{ArtworkKind, ImageCache, MediaEntityOps, MediaFile, MediaFileKind};

const COPY_BUFFER: usize = 64 * 1024;

/// Shared surroundings of every artwork job: where bytes come from, where
/// staging happens, and which cache to invalidate.
pub struct ArtworkContext {
    pub fetcher: Arc<dyn UrlFetcher>,
    pub image_cache: ImageCache,
    /// Shared staging area; per-job timestamps keep concurrent jobs apart.
    pub temp_dir: PathBuf,
    /// Pause after the durable sync, for filesystems with delayed-visibility
    /// semantics. Zero disables.
    pub settle: Duration,
}

impl ArtworkContext {
    pub fn new(
        fetcher: Arc<dyn UrlFetcher>,
        image_cache: ImageCache,
        temp_dir: impl Into<PathBuf>,
        settle: Duration,
    ) -> Self {
        Self {
            fetcher,
            image_cache,
            temp_dir: temp_dir.into(),
            settle,
        }
    }
}

/// Downloads one asset for one entity and applies it atomically.
pub struct ArtworkFetchJob {
    entity: Arc<dyn MediaEntityOps>,
    url: Url,
    kind: ArtworkKind,
    filename: String,
    /// Whether this job defines the canonical asset of its kind (vs. an
    /// additional gallery image).
    primary: bool,
    /// Millisecond timestamp baked into the staged filename; disambiguates
    /// concurrent jobs targeting the same filename.
    timestamp: i64,
    context: Arc<ArtworkContext>,
}

impl ArtworkFetchJob {
    pub fn new(
        entity: Arc<dyn MediaEntityOps>,
        url: Url,
        kind: ArtworkKind,
        filename: impl Into<String>,
        primary: bool,
        context: Arc<ArtworkContext>,
    ) -> Self {
        Self {
            entity,
            url,
            kind,
            filename: filename.into(),
            primary,
            timestamp: Utc::now().timestamp_millis(),
            context,
        }
    }

    /// Wrap this job as a background task.
    pub fn into_task(self) -> Task {
        let label = format!("downloading {} {}", self.kind, self.filename);
        Task::new(TaskKind::Background, "ArtworkDownload", label, |cancel| {
            self.run(cancel)
        })
    }

    /// Execute the acquisition protocol.
    ///
    /// Failures are returned after rollback and staging cleanup have already
    /// happened; the pool wrapper owns user-visible reporting.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<(), TaskError> {
        if self.filename.trim().is_empty() {
            return Ok(());
        }
        // provider-supplied filenames: strip anything the OS would reject,
        // then normalize the extension for on-disk consistency
        self.filename = normalize_artwork_extension(&sanitize_filename::sanitize(&self.filename));

        // remember the current primary file so a failed fetch can restore it;
        // the physical old file stays in place until the new one is staged
        let mut old_filename = None;
        if self.primary {
            let previous = self.entity.artwork_filename(self.kind);
            if !previous.trim().is_empty() {
                old_filename = Some(previous);
            }
            self.entity.remove_artwork(self.kind);
        }

        debug!(kind = %self.kind, filename = %self.filename, url = %self.url, "writing artwork");

        let dest = self.entity.base_dir().join(&self.filename);
        let staged = self.staged_path().await;

        let result = self
            .fetch_and_apply(&cancel, &dest, &staged, old_filename.as_deref())
            .await;

        // cleanup phase, regardless of outcome
        fsops::delete_if_exists(&staged).await;

        if let Err(err) = result {
            self.rollback(old_filename).await;
            return Err(err);
        }
        Ok(())
    }

    async fn fetch_and_apply(
        &self,
        cancel: &CancellationToken,
        dest: &Path,
        staged: &Path,
        old_filename: Option<&str>,
    ) -> Result<(), TaskError> {
        // the "new" asset may already be the file on disk (picked locally)
        let same_file = self.url.scheme() == "file"
            && self
                .url
                .to_file_path()
                .map(|path| path == dest)
                .unwrap_or(false);

        if !same_file {
            self.download_to(cancel, staged).await?;

            let staged_len = tokio::fs::metadata(staged)
                .await
                .map(|meta| meta.len())
                .unwrap_or(0);
            if staged_len == 0 {
                fsops::delete_if_exists(staged).await;
                return Err(TaskError::EmptyDownload {
                    filename: self.filename.clone(),
                });
            }

            // only now may the previous file go away
            if let Some(old) = old_filename {
                fsops::delete_if_exists(&self.entity.base_dir().join(old)).await;
            }
            fsops::delete_if_exists(dest).await;

            fsops::move_atomically(staged, dest)
                .await
                .map_err(|source| TaskError::MoveFailed {
                    dest: dest.to_path_buf(),
                    source,
                })?;
        }

        // cancellation after the swap suppresses the entity update only; the
        // file on disk is already correctly placed
        if cancel.is_cancelled() {
            debug!(filename = %self.filename, "cancelled after swap, skipping entity update");
            return Ok(());
        }

        if self.primary {
            debug!(kind = %self.kind, filename = %self.filename, "setting primary artwork");
            self.context.image_cache.invalidate(dest).await;
            self.entity.set_artwork(dest, self.kind);
            self.entity.artwork_written(self.kind);
            self.entity.persist().await?;
        } else {
            let mut artwork = MediaFile::new(dest, MediaFileKind::from(self.kind));
            artwork.gather_media_information(false).await?;
            self.entity.add_media_file(artwork);
        }

        Ok(())
    }

    /// Stream the source into the staged file, durably.
    async fn download_to(&self, cancel: &CancellationToken, staged: &Path) -> Result<(), TaskError> {
        let mut stream = self.context.fetcher.open(&self.url).await?;
        let mut out = tokio::fs::File::create(staged).await?;

        let mut buf = vec![0u8; COPY_BUFFER];
        loop {
            let read = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(TaskError::Interrupted),
                read = stream.read(&mut buf) => read?,
            };
            if read == 0 {
                break;
            }
            out.write_all(&buf[..read]).await?;
        }

        out.flush().await?;
        // wait until the bytes are actually on disk...
        out.sync_all().await?;
        drop(out);
        // ...and give lagging filesystems a moment to make them visible
        if !self.context.settle.is_zero() {
            tokio::time::sleep(self.context.settle).await;
        }
        Ok(())
    }

    /// Staged-file path in the shared temp area, falling back to the entity's
    /// own directory when the temp area cannot be created.
    async fn staged_path(&self) -> PathBuf {
        let staged_name = format!("{}.{}.part", self.filename, self.timestamp);
        match fsops::ensure_dir(&self.context.temp_dir).await {
            Ok(()) => self.context.temp_dir.join(staged_name),
            Err(err) => {
                debug!(
                    temp_dir = %self.context.temp_dir.display(),
                    error = %err,
                    "temp dir unavailable, staging inside the entity directory"
                );
                self.entity.base_dir().join(staged_name)
            }
        }
    }

    /// Restore the entity's pre-job artwork reference after a failure.
    async fn rollback(&self, old_filename: Option<String>) {
        if !self.primary {
            return;
        }
        let Some(old) = old_filename else {
            return;
        };

        warn!(kind = %self.kind, old = %old, "restoring previous artwork reference");
        let old_path = self.entity.base_dir().join(&old);
        self.entity.set_artwork(&old_path, self.kind);
        self.entity.artwork_written(self.kind);
        if let Err(err) = self.entity.persist().await {
            warn!(error = %err, "could not persist entity after rollback");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::HttpFetcher;
    use crate::media::MediaItem;

    fn context(root: &Path) -> Arc<ArtworkContext> {
        Arc::new(ArtworkContext::new(
            Arc::new(HttpFetcher::new()),
            ImageCache::new(root.join("cache")),
            root.join("tmp"),
            Duration::ZERO,
        ))
    }

    #[tokio::test]
    async fn test_blank_filename_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let entity: Arc<dyn MediaEntityOps> = Arc::new(MediaItem::new(
            dir.path(),
            "Item",
            tokio::sync::broadcast::channel(8).0,
        ));

        let job = ArtworkFetchJob::new(
            entity.clone(),
            Url::parse("https://images.example/poster.jpg").unwrap(),
            ArtworkKind::Poster,
            "   ",
            true,
            context(dir.path()),
        );

        job.run(CancellationToken::new()).await.unwrap();
        // nothing fetched, nothing staged, nothing referenced
        assert_eq!(entity.artwork_filename(ArtworkKind::Poster), "");
        assert!(!dir.path().join("tmp").exists());
    }

    #[tokio::test]
    async fn test_same_file_short_circuit_skips_download() {
        let dir = tempfile::tempdir().unwrap();
        let entity: Arc<dyn MediaEntityOps> = Arc::new(MediaItem::new(
            dir.path(),
            "Item",
            tokio::sync::broadcast::channel(8).0,
        ));

        // the "source" is already the destination file
        let dest = dir.path().join("poster.jpg");
        tokio::fs::write(&dest, b"already here").await.unwrap();

        let job = ArtworkFetchJob::new(
            entity.clone(),
            Url::from_file_path(&dest).unwrap(),
            ArtworkKind::Poster,
            "poster.jpg",
            true,
            context(dir.path()),
        );

        job.run(CancellationToken::new()).await.unwrap();

        assert_eq!(tokio::fs::read(&dest).await.unwrap(), b"already here");
        assert_eq!(entity.artwork_filename(ArtworkKind::Poster), "poster.jpg");
    }
}
