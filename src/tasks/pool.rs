//! Task pools
//!
//! Two executor shapes cover all three pools: [`WorkerPool`] (FIFO queue in
//! front of a bounded worker set) for background and probe work, and
//! [`ExclusivePool`] (a single admission slot, busy means rejected) for main
//! library operations. Every task runs inside a guarded wrapper that tags
//! logs with the task's sequence id, contains panics, and forwards failures
//! to the message sink - a crashing task never takes its pool down.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument};

use super::Task;
use crate::error::TaskError;
use crate::messages::{MessageLevel, MessageSink};

pub(crate) struct PoolShared {
    name: &'static str,
    running: AtomicUsize,
    queued: AtomicUsize,
    sink: MessageSink,
}

impl PoolShared {
    fn new(name: &'static str, sink: MessageSink) -> Arc<Self> {
        Arc::new(Self {
            name,
            running: AtomicUsize::new(0),
            queued: AtomicUsize::new(0),
            sink,
        })
    }

    /// Active plus queued work.
    pub(crate) fn pending(&self) -> usize {
        self.running.load(Ordering::SeqCst) + self.queued.load(Ordering::SeqCst)
    }
}

/// FIFO queue + dispatcher + semaphore-bounded worker set.
///
/// Submission never rejects while the channel is open; tasks start in
/// submission order.
pub(crate) struct WorkerPool {
    tx: mpsc::UnboundedSender<(u64, Task)>,
    shared: Arc<PoolShared>,
}

impl WorkerPool {
    pub(crate) fn new(
        name: &'static str,
        limit: usize,
        sink: MessageSink,
        shutdown: CancellationToken,
    ) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<(u64, Task)>();
        let shared = PoolShared::new(name, sink);
        let semaphore = Arc::new(Semaphore::new(limit.max(1)));

        let dispatcher_shared = shared.clone();
        let dispatcher_shutdown = shutdown;
        tokio::spawn(async move {
            info!(pool = name, limit, "task pool started");

            loop {
                let (seq, task) = tokio::select! {
                    biased;
                    _ = dispatcher_shutdown.cancelled() => break,
                    next = rx.recv() => match next {
                        Some(entry) => entry,
                        None => break,
                    },
                };

                let permit = tokio::select! {
                    biased;
                    _ = dispatcher_shutdown.cancelled() => {
                        dispatcher_shared.queued.fetch_sub(1, Ordering::SeqCst);
                        break;
                    }
                    permit = semaphore.clone().acquire_owned() => {
                        permit.expect("Semaphore closed")
                    }
                };

                let shared = dispatcher_shared.clone();
                let cancel = dispatcher_shutdown.child_token();
                tokio::spawn(async move {
                    shared.running.fetch_add(1, Ordering::SeqCst);
                    shared.queued.fetch_sub(1, Ordering::SeqCst);

                    run_guarded(seq, task, cancel, &shared).await;

                    shared.running.fetch_sub(1, Ordering::SeqCst);
                    drop(permit);
                });
            }

            // hard stop: anything still queued is discarded
            while let Ok((seq, task)) = rx.try_recv() {
                dispatcher_shared.queued.fetch_sub(1, Ordering::SeqCst);
                debug!(pool = name, id = seq, label = %task.label, "discarding queued task");
            }
            info!(pool = name, "task pool stopped");
        });

        Self { tx, shared }
    }

    /// Enqueue a task. Never rejects; the queue grows as needed.
    pub(crate) fn submit(&self, seq: u64, task: Task) {
        self.shared.queued.fetch_add(1, Ordering::SeqCst);
        debug!(pool = self.shared.name, id = seq, label = %task.label, "task queued");
        if self.tx.send((seq, task)).is_err() {
            // dispatcher already stopped
            self.shared.queued.fetch_sub(1, Ordering::SeqCst);
        }
    }

    pub(crate) fn pending(&self) -> usize {
        self.shared.pending()
    }
}

/// The main pool: worker set of exactly one, no queue.
///
/// A second submission while the slot is taken is rejected outright - the
/// caller distinguishes "busy, try later" from "will eventually run".
pub(crate) struct ExclusivePool {
    slot: Arc<Semaphore>,
    shared: Arc<PoolShared>,
    shutdown: CancellationToken,
}

impl ExclusivePool {
    pub(crate) fn new(name: &'static str, sink: MessageSink, shutdown: CancellationToken) -> Self {
        Self {
            slot: Arc::new(Semaphore::new(1)),
            shared: PoolShared::new(name, sink),
            shutdown,
        }
    }

    /// Run `task` if the slot is free; `false` when another task holds it.
    /// No outward effect on rejection.
    pub(crate) fn try_submit(&self, seq: u64, task: Task) -> bool {
        let permit = match self.slot.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                debug!(pool = self.shared.name, id = seq, label = %task.label, "pool busy, rejecting task");
                return false;
            }
        };

        self.shared.running.fetch_add(1, Ordering::SeqCst);
        let shared = self.shared.clone();
        let cancel = self.shutdown.child_token();
        tokio::spawn(async move {
            run_guarded(seq, task, cancel, &shared).await;
            shared.running.fetch_sub(1, Ordering::SeqCst);
            drop(permit);
        });
        true
    }

    pub(crate) fn pending(&self) -> usize {
        self.shared.pending()
    }
}

/// Execute one task: span for log correlation, panic containment, failure
/// forwarding to the sink.
async fn run_guarded(seq: u64, task: Task, cancel: CancellationToken, shared: &PoolShared) {
    let span = tracing::info_span!(
        "task",
        id = seq,
        pool = shared.name,
        kind = ?task.kind,
        label = %task.label,
    );
    let source = task.source;
    let label = task.label.clone();

    debug!(pool = shared.name, id = seq, label = %label, "task starting");

    let future = (task.body)(cancel);
    let outcome = AssertUnwindSafe(future).catch_unwind().instrument(span).await;

    match outcome {
        Ok(Ok(())) => {
            debug!(pool = shared.name, id = seq, label = %label, "task completed");
        }
        Ok(Err(TaskError::Interrupted)) => {
            warn!(pool = shared.name, id = seq, label = %label, "task interrupted");
        }
        Ok(Err(err)) => {
            let level = if err.is_warning() {
                MessageLevel::Warning
            } else {
                MessageLevel::Error
            };
            warn!(pool = shared.name, id = seq, label = %label, error = %err, "task failed");
            shared.sink.post(level, source, err.to_string());
        }
        Err(panic) => {
            let text = panic_text(panic);
            error!(pool = shared.name, id = seq, label = %label, panic = %text, "task crashed");
            shared
                .sink
                .post(MessageLevel::Error, source, format!("task crashed: {text}"));
        }
    }
}

fn panic_text(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic".to_string()
    }
}
