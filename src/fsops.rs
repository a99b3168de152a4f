//! Failure-safe filesystem primitives
//!
//! Everything that replaces library files on disk goes through these helpers:
//! a best-effort delete that tolerates absence, and a move that retries a
//! rename before falling back to copy-and-delete for cross-device targets.

use std::io;
use std::path::Path;
use std::time::Duration;

use tracing::debug;

const MOVE_RETRIES: usize = 5;
const MOVE_RETRY_DELAY: Duration = Duration::from_millis(250);

/// Create a directory and all missing parents.
pub async fn ensure_dir(path: &Path) -> io::Result<()> {
    tokio::fs::create_dir_all(path).await
}

/// Delete a file if it exists. Best-effort: absence is not an error, and any
/// other failure is only logged.
pub async fn delete_if_exists(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "deleted file"),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => debug!(path = %path.display(), error = %err, "could not delete file"),
    }
}

/// Move `src` onto `dst` such that `dst` is never observable half-written.
///
/// A rename is atomic on the same filesystem; it is retried a few times to
/// ride out transient locks (antivirus, indexers). When the rename keeps
/// failing - typically a cross-device move - the fallback copies into place
/// and syncs before removing the source.
pub async fn move_atomically(src: &Path, dst: &Path) -> io::Result<()> {
    let mut last_err = None;

    for attempt in 1..=MOVE_RETRIES {
        match tokio::fs::rename(src, dst).await {
            Ok(()) => return Ok(()),
            Err(err) => {
                debug!(
                    src = %src.display(),
                    dst = %dst.display(),
                    attempt,
                    error = %err,
                    "rename failed"
                );
                let crosses_devices = err.kind() == io::ErrorKind::CrossesDevices;
                last_err = Some(err);
                if crosses_devices {
                    // retrying will not help, go straight to the copy fallback
                    break;
                }
                if attempt < MOVE_RETRIES {
                    tokio::time::sleep(MOVE_RETRY_DELAY).await;
                }
            }
        }
    }

    debug!(
        src = %src.display(),
        dst = %dst.display(),
        error = %last_err.as_ref().map(ToString::to_string).unwrap_or_default(),
        "rename exhausted retries, copying instead"
    );

    tokio::fs::copy(src, dst).await?;
    let copied = tokio::fs::File::open(dst).await?;
    copied.sync_all().await?;
    drop(copied);
    tokio::fs::remove_file(src).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_move_atomically_renames() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("a.jpg");
        let dst = dir.path().join("b.jpg");
        tokio::fs::write(&src, b"artwork bytes").await.unwrap();

        move_atomically(&src, &dst).await.unwrap();

        assert!(!src.exists());
        assert_eq!(tokio::fs::read(&dst).await.unwrap(), b"artwork bytes");
    }

    #[tokio::test]
    async fn test_delete_if_exists_tolerates_absence() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("never-existed.jpg");
        delete_if_exists(&missing).await;

        let present = dir.path().join("present.jpg");
        tokio::fs::write(&present, b"x").await.unwrap();
        delete_if_exists(&present).await;
        assert!(!present.exists());
    }
}
