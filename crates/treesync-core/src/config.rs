//! Run configuration.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::entry::TreeSide;

/// Precision at which modification times are compared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimePrecision {
    /// Whole seconds.
    #[default]
    Seconds,
    /// Milliseconds.
    Millis,
    /// Full nanosecond precision.
    Nanos,
}

impl TimePrecision {
    fn unit_nanos(self) -> i128 {
        match self {
            Self::Seconds => 1_000_000_000,
            Self::Millis => 1_000_000,
            Self::Nanos => 1,
        }
    }

    /// Nanoseconds since the epoch, truncated to this precision.
    ///
    /// Times before the epoch are negative and round toward negative
    /// infinity, so every instant inside one unit maps to the same value.
    pub fn truncate(self, time: SystemTime) -> i128 {
        let nanos = match time.duration_since(UNIX_EPOCH) {
            Ok(d) => d.as_nanos() as i128,
            Err(e) => -(e.duration().as_nanos() as i128),
        };
        let unit = self.unit_nanos();
        nanos.div_euclid(unit) * unit
    }

    /// Whether two instants are equal at this precision.
    pub fn same(self, a: SystemTime, b: SystemTime) -> bool {
        self.truncate(a) == self.truncate(b)
    }
}

/// Configuration for one synchronization run.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct SyncConfig {
    /// Root of the tree to copy from.
    pub source: PathBuf,

    /// Root of the tree to bring in line with `source`.
    pub destination: PathBuf,

    /// Analyzer workers per side in parallel mode.
    #[builder(default = "1")]
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Compare content hashes in addition to size and time.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub hashing: bool,

    /// Use lister and analyzer workers instead of the calling thread.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub parallel: bool,

    /// Compute and report actions without applying them.
    #[builder(default = "false")]
    #[serde(default)]
    pub dry_run: bool,

    /// Report every planned or executed action.
    #[builder(default = "false")]
    #[serde(default)]
    pub verbose: bool,

    /// Precision used when comparing modification times.
    #[builder(default)]
    #[serde(default)]
    pub time_precision: TimePrecision,
}

fn default_true() -> bool {
    true
}

fn default_workers() -> usize {
    1
}

impl SyncConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        let source = match self.source {
            Some(ref p) if !p.as_os_str().is_empty() => p,
            Some(_) => return Err("Source path cannot be empty".to_string()),
            None => return Err("Source path is required".to_string()),
        };
        let destination = match self.destination {
            Some(ref p) if !p.as_os_str().is_empty() => p,
            Some(_) => return Err("Destination path cannot be empty".to_string()),
            None => return Err("Destination path is required".to_string()),
        };
        if source == destination {
            return Err("Source and destination must differ".to_string());
        }
        if self.workers == Some(0) {
            return Err("At least one analyzer worker is required".to_string());
        }
        Ok(())
    }
}

impl SyncConfig {
    /// Create a new config builder.
    pub fn builder() -> SyncConfigBuilder {
        SyncConfigBuilder::default()
    }

    /// Create a config with default options for two roots.
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            workers: 1,
            hashing: true,
            parallel: true,
            dry_run: false,
            verbose: false,
            time_precision: TimePrecision::default(),
        }
    }

    /// Root path for one side.
    pub fn root(&self, side: TreeSide) -> &PathBuf {
        match side {
            TreeSide::Source => &self.source,
            TreeSide::Destination => &self.destination,
        }
    }
}
