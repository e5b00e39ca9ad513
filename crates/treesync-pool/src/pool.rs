//! Worker pool: the explicit process context of a parallel run.
//!
//! The pool is responsible for:
//! - Creating the per-tree work queues and the shared result queue
//! - Spawning analyzers and listers, or tearing down what was spawned if
//!   that fails
//! - Draining results into the two registries
//! - Stopping and joining every worker exactly once

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, info, warn};

use treesync_core::{
    EntryRegistry, SpawnError, SyncConfig, SyncError, SyncIssue, TeardownError, TreeSide,
};
use treesync_scan::Prober;

use crate::message::{Message, MessageQueue};
use crate::worker::{Worker, WorkerContext, WorkerRole};

/// Registries assembled by [`WorkerPool::gather`].
#[derive(Debug, Default)]
pub struct Gathered {
    /// Entries of the source tree.
    pub source: EntryRegistry,
    /// Entries of the destination tree.
    pub destination: EntryRegistry,
    /// Listing and probing problems, in arrival order.
    pub issues: Vec<SyncIssue>,
}

/// Per-side bookkeeping while gathering.
#[derive(Debug, Default, Clone, Copy)]
struct SideProgress {
    /// Paths the lister published, known once it reports completion.
    expected: Option<usize>,
    /// Results (entries or probe failures) received so far.
    received: usize,
}

impl SideProgress {
    fn is_done(&self) -> bool {
        self.expected.is_some_and(|n| self.received >= n)
    }

    fn missing(&self) -> usize {
        self.expected
            .map_or(1, |n| n.saturating_sub(self.received))
    }
}

/// Lister and analyzer workers for both trees plus their queues.
///
/// Dropping the pool shuts it down.
pub struct WorkerPool {
    workers: Vec<Worker>,
    source_work: Sender<Message>,
    destination_work: Sender<Message>,
    results: Receiver<Message>,
    shutdown: Arc<AtomicBool>,
    live: Arc<AtomicUsize>,
}

impl WorkerPool {
    /// Start `config.workers` analyzers per tree and one lister per tree.
    ///
    /// If any worker fails to spawn, every worker already started is
    /// stopped and joined before the error is returned.
    pub fn start(config: &SyncConfig, prober: Arc<dyn Prober>) -> Result<Self, SpawnError> {
        Self::launch(config, prober, Arc::new(AtomicUsize::new(0)), None)
    }

    /// `spawn_budget` caps how many workers may start; the next spawn
    /// fails as if the OS had refused it. Only tests set it.
    fn launch(
        config: &SyncConfig,
        prober: Arc<dyn Prober>,
        live: Arc<AtomicUsize>,
        spawn_budget: Option<usize>,
    ) -> Result<Self, SpawnError> {
        let source_queue = MessageQueue::new();
        let destination_queue = MessageQueue::new();
        let (results_tx, results_rx) = MessageQueue::new().into_parts();
        let shutdown = Arc::new(AtomicBool::new(false));
        let analyzers_per_side = config.workers.max(1);

        let mut pool = Self {
            workers: Vec::with_capacity(2 * analyzers_per_side + 2),
            source_work: source_queue.sender(),
            destination_work: destination_queue.sender(),
            results: results_rx,
            shutdown: Arc::clone(&shutdown),
            live,
        };

        let context = |side: TreeSide| {
            let queue = match side {
                TreeSide::Source => &source_queue,
                TreeSide::Destination => &destination_queue,
            };
            WorkerContext {
                root: config.root(side).clone(),
                work_tx: queue.sender(),
                work_rx: queue.receiver(),
                results: results_tx.clone(),
                prober: Arc::clone(&prober),
                shutdown: Arc::clone(&shutdown),
            }
        };

        // Analyzers first so listers never publish into a queue nobody reads.
        let mut plan = Vec::with_capacity(2 * analyzers_per_side + 2);
        for side in TreeSide::BOTH {
            for index in 0..analyzers_per_side {
                plan.push((WorkerRole::Analyzer(side), index));
            }
        }
        for side in TreeSide::BOTH {
            plan.push((WorkerRole::Lister(side), 0));
        }

        for (role, index) in plan {
            let spawned = if spawn_budget.is_some_and(|budget| pool.workers.len() >= budget) {
                Err(SpawnError::Thread {
                    worker: role.worker_name(index),
                    source: std::io::Error::other("spawn budget exhausted"),
                })
            } else {
                Worker::spawn(role, index, context(role.side()), &pool.live)
            };

            match spawned {
                Ok(worker) => pool.workers.push(worker),
                Err(err) => {
                    warn!(error = %err, spawned = pool.workers.len(), "Worker spawn failed, tearing down");
                    pool.shutdown();
                    return Err(err);
                }
            }
        }

        info!(
            analyzers_per_side,
            workers = pool.workers.len(),
            "Worker pool started"
        );
        Ok(pool)
    }

    /// Number of worker threads currently alive.
    pub fn live_workers(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Number of workers spawned and not yet joined.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Drain results until both trees are fully analyzed.
    ///
    /// Entries arrive in completion order and are placed with
    /// [`EntryRegistry::insert_ordered`]. A tree is complete once its
    /// lister reported how many paths it published and that many entries or
    /// probe failures have arrived.
    pub fn gather(&mut self) -> Result<Gathered, SyncError> {
        let mut gathered = Gathered::default();
        let mut progress = [SideProgress::default(); 2];
        let slot = |side: TreeSide| match side {
            TreeSide::Source => 0,
            TreeSide::Destination => 1,
        };

        while !progress.iter().all(SideProgress::is_done) {
            let message = self.results.recv().map_err(|_| SyncError::ChannelClosed {
                missing: progress.iter().map(SideProgress::missing).sum(),
            })?;

            match message {
                Message::EntryResult { side, entry } => {
                    let registry = match side {
                        TreeSide::Source => &mut gathered.source,
                        TreeSide::Destination => &mut gathered.destination,
                    };
                    if !registry.insert_ordered(entry)?.is_new() {
                        debug!(%side, "Duplicate entry ignored");
                    }
                    progress[slot(side)].received += 1;
                }
                Message::ProbeFailed { side, error } => {
                    warn!(%side, error = %error, "Skipping entry");
                    gathered.issues.push(SyncIssue::Probe { side, error });
                    progress[slot(side)].received += 1;
                }
                Message::ListingComplete {
                    side,
                    discovered,
                    errors,
                } => {
                    debug!(%side, discovered, "Listing complete");
                    progress[slot(side)].expected = Some(discovered);
                    gathered
                        .issues
                        .extend(errors.into_iter().map(|error| SyncIssue::List { side, error }));
                }
                Message::ListingFailed { error, .. } => return Err(error.into()),
                Message::WorkerLost { worker } => return Err(SyncError::WorkerLost { worker }),
                other => warn!(message = ?other, "Orchestrator ignoring unexpected message"),
            }
        }

        info!(
            source = gathered.source.len(),
            destination = gathered.destination.len(),
            issues = gathered.issues.len(),
            "Registries assembled"
        );
        Ok(gathered)
    }

    /// Stop every worker and wait for it to exit.
    ///
    /// Listers are stopped through the shutdown flag, analyzers through one
    /// [`Message::Terminate`] each. Safe to call repeatedly and after a
    /// partial start; later calls return no errors.
    pub fn shutdown(&mut self) -> Vec<TeardownError> {
        if self.workers.is_empty() {
            return Vec::new();
        }

        self.shutdown.store(true, Ordering::SeqCst);

        for worker in &self.workers {
            if let WorkerRole::Analyzer(side) = worker.role() {
                let queue = match side {
                    TreeSide::Source => &self.source_work,
                    TreeSide::Destination => &self.destination_work,
                };
                let _ = queue.send(Message::Terminate);
            }
        }

        let mut errors = Vec::new();
        for worker in std::mem::take(&mut self.workers) {
            if let Err(e) = worker.join() {
                warn!(error = %e, "Worker failed to join cleanly");
                errors.push(e);
            }
        }

        debug!(live = self.live_workers(), "Worker pool shut down");
        errors
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
