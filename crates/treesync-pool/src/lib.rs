//! Worker pool and message protocol for building registries in parallel.
//!
//! One lister per tree walks its root and publishes every discovered path
//! on that tree's work queue. `N` analyzers per tree take paths from the
//! queue, probe them, and publish the finished entries on the shared
//! result queue. Only the orchestrating thread drains results and mutates
//! the registries, so no locks are involved.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use treesync_core::SyncConfig;
//! use treesync_pool::WorkerPool;
//! use treesync_scan::FsProber;
//!
//! let config = SyncConfig::new("/src", "/dst");
//! let mut pool = WorkerPool::start(&config, Arc::new(FsProber::new(true))).unwrap();
//! let gathered = pool.gather();
//! let teardown = pool.shutdown();
//! ```

mod message;
mod pool;
mod worker;

pub use message::{Message, MessageQueue};
pub use pool::{Gathered, WorkerPool};
pub use worker::{run_worker, Worker, WorkerContext, WorkerRole};
