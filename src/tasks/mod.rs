//! Background task engine
//!
//! Long library operations never run on the interactive thread: callers wrap
//! them in a [`Task`] and hand it to the [`TaskManager`], which routes it to
//! one of three pools. The main pool admits exactly one running task at a
//! time (datasource scans and other library-wide operations); background and
//! probe work queues FIFO on its own pool.

pub mod artwork;
pub mod manager;
pub mod media_info;
pub mod pool;
pub mod scan;

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;

pub use artwork::{ArtworkContext, ArtworkFetchJob};
pub use manager::{ManagerState, TaskManager, TaskManagerConfig};
pub use media_info::MediaInfoProbeJob;
pub use scan::DatasourceScanTask;

/// Which pool a task belongs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// Library-wide operation; at most one runs process-wide.
    Main,
    /// Ordinary asynchronous work (downloads, misc processing).
    Background,
    /// Media-information extraction, isolated on its own pool.
    Probe,
}

type TaskBody = Box<dyn FnOnce(CancellationToken) -> BoxFuture<'static, Result<(), TaskError>> + Send>;

/// A unit of background work.
///
/// The body receives a cancellation token (a child of the manager's shutdown
/// token) and is expected to check it at its own checkpoints. Whatever the
/// body returns - or panics with - is contained by the pool wrapper; nothing
/// escapes to the caller that submitted the task.
pub struct Task {
    pub(crate) kind: TaskKind,
    /// Component name used as the message-sink source, e.g. "ArtworkDownload".
    pub(crate) source: &'static str,
    pub(crate) label: String,
    pub(crate) body: TaskBody,
}

impl Task {
    pub fn new<F, Fut>(
        kind: TaskKind,
        source: &'static str,
        label: impl Into<String>,
        body: F,
    ) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        Self {
            kind,
            source,
            label: label.into(),
            body: Box::new(move |cancel| Box::pin(body(cancel))),
        }
    }

    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("kind", &self.kind)
            .field("source", &self.source)
            .field("label", &self.label)
            .finish()
    }
}
