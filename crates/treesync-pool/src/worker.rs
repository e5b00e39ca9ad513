//! Worker threads: listers and analyzers.
//!
//! Each worker:
//! - Runs on its own named OS thread
//! - Talks to the rest of the pool only through message queues
//! - Registers itself in a live counter for the lifetime of its thread

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, trace, warn};

use treesync_core::{SpawnError, TeardownError, TreeSide};
use treesync_scan::{walk_tree_until, Prober};

use crate::message::Message;

/// What a worker does, and for which tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerRole {
    /// Walks one tree and publishes discovered paths.
    Lister(TreeSide),
    /// Probes paths of one tree and publishes entries.
    Analyzer(TreeSide),
}

impl WorkerRole {
    /// The tree this worker serves.
    pub fn side(&self) -> TreeSide {
        match self {
            Self::Lister(side) | Self::Analyzer(side) => *side,
        }
    }

    /// Thread name for the `index`-th worker of this role.
    pub fn worker_name(&self, index: usize) -> String {
        match self {
            Self::Lister(side) => format!("lister-{side}"),
            Self::Analyzer(side) => format!("analyzer-{side}-{index}"),
        }
    }
}

/// Everything a worker needs; cloned per worker.
#[derive(Clone)]
pub struct WorkerContext {
    /// Root of the tree served by this worker.
    pub root: PathBuf,
    /// Producer end of this tree's work queue (listers publish here).
    pub work_tx: Sender<Message>,
    /// Consumer end of this tree's work queue (analyzers read here).
    pub work_rx: Receiver<Message>,
    /// Producer end of the shared result queue.
    pub results: Sender<Message>,
    /// Metadata prober used by analyzers.
    pub prober: Arc<dyn Prober>,
    /// Raised by the orchestrator to stop listers early.
    pub shutdown: Arc<AtomicBool>,
}

/// Handle to a running worker thread.
#[derive(Debug)]
pub struct Worker {
    name: String,
    role: WorkerRole,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    /// Spawn a worker thread running `role`.
    ///
    /// `live` is incremented before the thread starts and decremented when
    /// it ends, including when spawning fails.
    pub fn spawn(
        role: WorkerRole,
        index: usize,
        ctx: WorkerContext,
        live: &Arc<AtomicUsize>,
    ) -> Result<Self, SpawnError> {
        let name = role.worker_name(index);
        let guard = LiveGuard::new(Arc::clone(live), name.clone(), ctx.results.clone());

        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let _guard = guard;
                run_worker(role, ctx);
            })
            .map_err(|source| SpawnError::Thread {
                worker: name.clone(),
                source,
            })?;

        Ok(Self {
            name,
            role,
            handle: Some(handle),
        })
    }

    /// Worker name (also its thread name).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Worker role.
    pub fn role(&self) -> WorkerRole {
        self.role
    }

    /// Wait for the worker to exit.
    pub fn join(mut self) -> Result<(), TeardownError> {
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| TeardownError::Panicked {
                worker: self.name.clone(),
            }),
            None => Ok(()),
        }
    }
}

/// Single entry point for every worker thread.
pub fn run_worker(role: WorkerRole, ctx: WorkerContext) {
    match role {
        WorkerRole::Lister(side) => lister_loop(side, ctx),
        WorkerRole::Analyzer(side) => analyzer_loop(side, ctx),
    }
}

fn lister_loop(side: TreeSide, ctx: WorkerContext) {
    debug!(%side, root = %ctx.root.display(), "Lister starting");

    let work_tx = &ctx.work_tx;
    let outcome = walk_tree_until(&ctx.root, &ctx.shutdown, |path| {
        // Analyzers only disappear during shutdown; nothing left to do then.
        let _ = work_tx.send(Message::PathDiscovered { side, path });
    });

    let report = match outcome {
        Ok(summary) => {
            debug!(%side, discovered = summary.discovered, "Lister finished");
            Message::ListingComplete {
                side,
                discovered: summary.discovered,
                errors: summary.errors,
            }
        }
        Err(error) => {
            warn!(%side, error = %error, "Lister failed");
            Message::ListingFailed { side, error }
        }
    };

    let _ = ctx.results.send(report);
}

fn analyzer_loop(side: TreeSide, ctx: WorkerContext) {
    trace!(%side, "Analyzer starting");

    for message in ctx.work_rx.iter() {
        match message {
            Message::PathDiscovered { path, .. } => {
                if ctx.shutdown.load(Ordering::Relaxed) {
                    continue;
                }
                let reply = match ctx.prober.probe(&ctx.root, &path) {
                    Ok(entry) => Message::EntryResult { side, entry },
                    Err(error) => {
                        debug!(%side, error = %error, "Probe failed");
                        Message::ProbeFailed { side, error }
                    }
                };
                if ctx.results.send(reply).is_err() {
                    break;
                }
            }
            Message::Terminate => break,
            other => warn!(%side, message = ?other, "Analyzer ignoring unexpected message"),
        }
    }

    trace!(%side, "Analyzer exiting");
}

/// Keeps the pool's live-worker count accurate and reports panics.
struct LiveGuard {
    live: Arc<AtomicUsize>,
    name: String,
    results: Sender<Message>,
}

impl LiveGuard {
    fn new(live: Arc<AtomicUsize>, name: String, results: Sender<Message>) -> Self {
        live.fetch_add(1, Ordering::SeqCst);
        Self {
            live,
            name,
            results,
        }
    }
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        if thread::panicking() {
            let _ = self.results.send(Message::WorkerLost {
                worker: std::mem::take(&mut self.name),
            });
        }
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_names() {
        assert_eq!(
            WorkerRole::Lister(TreeSide::Source).worker_name(0),
            "lister-source"
        );
        assert_eq!(
            WorkerRole::Analyzer(TreeSide::Destination).worker_name(2),
            "analyzer-destination-2"
        );
        assert_eq!(
            WorkerRole::Analyzer(TreeSide::Destination).side(),
            TreeSide::Destination
        );
    }
}
