//! Failure taxonomy for background tasks
//!
//! Every task reports its outcome through these variants instead of raising
//! ad-hoc errors; the pool wrapper maps them to log levels and user-visible
//! messages.

use std::path::PathBuf;

use thiserror::Error;

/// Errors a background task can end with.
///
/// `Interrupted` is the cooperative-cancellation outcome and is never
/// surfaced to the user beyond a log line.
#[derive(Debug, Error)]
pub enum TaskError {
    /// Remote asset missing, denied or otherwise unreachable.
    #[error("resource not found: {0}")]
    NotFound(String),

    /// The download produced a zero-byte file.
    #[error("zero-byte file downloaded: {filename}")]
    EmptyDownload { filename: String },

    /// Disk full, permission denied, read/write failure.
    #[error("i/o failure")]
    Io(#[from] std::io::Error),

    /// The staged file could not be moved onto the destination.
    #[error("renaming staged file to {} failed", dest.display())]
    MoveFailed {
        dest: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Cooperative cancellation observed mid-flight.
    #[error("task interrupted")]
    Interrupted,

    /// Anything the variants above do not cover.
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl TaskError {
    /// Whether this outcome is worth an error-level report (vs. a warning).
    pub fn is_warning(&self) -> bool {
        matches!(self, TaskError::NotFound(_) | TaskError::Interrupted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels() {
        assert!(TaskError::NotFound("x".into()).is_warning());
        assert!(TaskError::Interrupted.is_warning());
        assert!(!TaskError::EmptyDownload { filename: "a.jpg".into() }.is_warning());
        assert!(!TaskError::Io(std::io::Error::other("disk full")).is_warning());
    }
}
