//! Process-wide task scheduling
//!
//! One [`TaskManager`] is created at process start and passed by `Arc` to
//! every component that submits work - there is no hidden global. It routes
//! tasks to the main, background and probe pools and owns the shutdown
//! sequence: graceful (`shutdown`) first, then hard cancellation
//! (`shutdown_now`).

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::pool::{ExclusivePool, WorkerPool};
use super::Task;
use crate::messages::MessageSink;

/// Lifecycle state of the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    Active,
    ShuttingDown,
    Stopped,
}

/// Pool sizing.
#[derive(Debug, Clone)]
pub struct TaskManagerConfig {
    /// Concurrent background tasks (image downloads, misc processing).
    pub background_limit: usize,
    /// Concurrent probe tasks; defaults to the hardware parallelism so heavy
    /// I/O probing never starves the other pools.
    pub probe_limit: usize,
}

impl Default for TaskManagerConfig {
    fn default() -> Self {
        Self {
            background_limit: 5,
            probe_limit: std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(2),
        }
    }
}

/// Routes tasks to pools and owns their shared shutdown state.
pub struct TaskManager {
    state: RwLock<ManagerState>,
    sequence: AtomicU64,
    main: ExclusivePool,
    background: WorkerPool,
    probe: WorkerPool,
    shutdown_token: CancellationToken,
}

impl TaskManager {
    pub fn new(config: TaskManagerConfig, sink: MessageSink) -> Self {
        let shutdown_token = CancellationToken::new();
        Self {
            state: RwLock::new(ManagerState::Active),
            sequence: AtomicU64::new(0),
            main: ExclusivePool::new("main", sink.clone(), shutdown_token.clone()),
            background: WorkerPool::new(
                "background",
                config.background_limit,
                sink.clone(),
                shutdown_token.clone(),
            ),
            probe: WorkerPool::new(
                "probe",
                config.probe_limit,
                sink,
                shutdown_token.clone(),
            ),
            shutdown_token,
        }
    }

    /// Create with default pool sizes and a fresh sink.
    pub fn with_defaults() -> Self {
        Self::new(TaskManagerConfig::default(), MessageSink::with_defaults())
    }

    pub fn state(&self) -> ManagerState {
        *self.state.read()
    }

    /// Try to run a main library operation.
    ///
    /// Returns `false` - with no work performed - when another main task is
    /// already running or the manager is shutting down; the caller is
    /// expected to tell the user. Once accepted the task runs asynchronously.
    pub fn submit_main(&self, task: Task) -> bool {
        if !self.accepting(&task) {
            return false;
        }
        self.main.try_submit(self.next_sequence(), task)
    }

    /// Enqueue background work; FIFO, never rejected while active.
    pub fn submit_background(&self, task: Task) {
        if !self.accepting(&task) {
            return;
        }
        self.background.submit(self.next_sequence(), task);
    }

    /// Enqueue media-information probing on its dedicated pool.
    pub fn submit_probe(&self, task: Task) {
        if !self.accepting(&task) {
            return;
        }
        self.probe.submit(self.next_sequence(), task);
    }

    /// True while any pool has running or queued work. Headless mode polls
    /// this to know when it is safe to exit.
    pub fn is_any_running(&self) -> bool {
        self.main.pending() + self.background.pending() + self.probe.pending() > 0
    }

    /// Stop accepting new work; in-flight and already-queued tasks finish.
    /// Returns immediately.
    pub fn shutdown(&self) {
        let mut state = self.state.write();
        if *state != ManagerState::Active {
            return;
        }
        *state = ManagerState::ShuttingDown;
        info!("task manager shutting down, no new work accepted");
    }

    /// Cancel in-flight tasks through their cancellation tokens and discard
    /// queued work. Cooperative - does not block waiting for tasks to
    /// observe the cancellation.
    pub fn shutdown_now(&self) {
        {
            let mut state = self.state.write();
            if *state == ManagerState::Stopped {
                return;
            }
            *state = ManagerState::Stopped;
        }
        info!("task manager stopping, cancelling in-flight tasks");
        self.shutdown_token.cancel();
    }

    fn accepting(&self, task: &Task) -> bool {
        let accepting = *self.state.read() == ManagerState::Active;
        if !accepting {
            warn!(label = %task.label(), "manager is shutting down, task not accepted");
        }
        accepting
    }

    fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl std::fmt::Debug for TaskManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskManager")
            .field("state", &self.state())
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .finish()
    }
}
