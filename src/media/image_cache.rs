//! Cached artwork renditions
//!
//! Scaled/preview copies of artwork are stored under a cache directory keyed
//! by a hash of the original path. When the artwork fetcher replaces a file,
//! it invalidates the matching cache entry so stale renditions never outlive
//! the artwork they were made from.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::fsops;

/// Maps artwork paths to their cached rendition paths.
#[derive(Debug, Clone)]
pub struct ImageCache {
    cache_dir: PathBuf,
}

impl ImageCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    /// Where the cached rendition of `original` lives (whether or not one
    /// exists yet).
    pub fn cached_path(&self, original: &Path) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(original.to_string_lossy().as_bytes());
        let hash = format!("{:x}", hasher.finalize());

        let ext = original
            .extension()
            .and_then(OsStr::to_str)
            .unwrap_or("img");
        self.cache_dir.join(format!("{}.{ext}", &hash[..32]))
    }

    /// Best-effort removal of the cached rendition for `original`.
    pub async fn invalidate(&self, original: &Path) {
        fsops::delete_if_exists(&self.cached_path(original)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cached_path_is_stable_and_distinct() {
        let cache = ImageCache::new("/cache");
        let a = cache.cached_path(Path::new("/library/a/poster.jpg"));
        let b = cache.cached_path(Path::new("/library/b/poster.jpg"));
        assert_eq!(a, cache.cached_path(Path::new("/library/a/poster.jpg")));
        assert_ne!(a, b);
        assert_eq!(a.extension().unwrap(), "jpg");
    }

    #[tokio::test]
    async fn test_invalidate_removes_rendition() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ImageCache::new(dir.path());
        let original = Path::new("/library/a/poster.jpg");

        let rendition = cache.cached_path(original);
        tokio::fs::write(&rendition, b"scaled").await.unwrap();

        cache.invalidate(original).await;
        assert!(!rendition.exists());
    }
}
