//! Summary of one synchronization run.

use humansize::{format_size, BINARY};

use treesync_core::{SyncIssue, TeardownError};

use crate::copy::ApplyOutcome;
use crate::diff::SyncAction;

/// Everything a run planned, did and ran into.
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Planned actions, in the order they were applied.
    pub actions: Vec<SyncAction>,
    /// Entries found in the source tree.
    pub source_entries: usize,
    /// Entries found in the destination tree.
    pub destination_entries: usize,
    /// Directories created or replaced.
    pub directories_created: usize,
    /// Files copied.
    pub files_copied: usize,
    /// Bytes written to the destination.
    pub bytes_copied: u64,
    /// Listing, probing and copy problems.
    pub issues: Vec<SyncIssue>,
    /// Workers that did not exit cleanly; never affects success.
    pub teardown: Vec<TeardownError>,
    /// Whether actions were only planned.
    pub dry_run: bool,
}

impl SyncReport {
    /// Check if the run completed without issues.
    pub fn is_success(&self) -> bool {
        self.issues.is_empty()
    }

    /// Fold the applier's result into the report.
    pub fn record_apply(&mut self, outcome: ApplyOutcome) {
        self.directories_created += outcome.directories_created;
        self.files_copied += outcome.files_copied;
        self.bytes_copied += outcome.bytes_copied;
        self.issues
            .extend(outcome.errors.into_iter().map(SyncIssue::Copy));
    }

    /// Bytes the planned file copies would transfer.
    pub fn planned_bytes(&self) -> u64 {
        self.actions
            .iter()
            .filter_map(|action| action.entry().size())
            .sum()
    }

    /// Get a human-readable summary of the run.
    pub fn summary(&self) -> String {
        let base = if self.dry_run {
            format!(
                "Would apply {} actions ({})",
                self.actions.len(),
                format_size(self.planned_bytes(), BINARY)
            )
        } else if self.actions.is_empty() {
            "Already in sync".to_string()
        } else {
            format!(
                "Created {} directories, copied {} files ({})",
                self.directories_created,
                self.files_copied,
                format_size(self.bytes_copied, BINARY)
            )
        };

        if self.issues.is_empty() {
            base
        } else {
            format!("{}, {} issues", base, self.issues.len())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use treesync_core::{CopyError, Entry};

    #[test]
    fn test_summary() {
        let mut report = SyncReport::default();
        assert_eq!(report.summary(), "Already in sync");

        report.actions.push(SyncAction::CopyFile(Entry::file(
            "a",
            0o644,
            2048,
            std::time::UNIX_EPOCH,
            None,
        )));
        report.record_apply(ApplyOutcome {
            files_copied: 1,
            bytes_copied: 2048,
            ..ApplyOutcome::default()
        });
        assert_eq!(report.summary(), "Created 0 directories, copied 1 files (2 KiB)");
        assert!(report.is_success());

        report.dry_run = true;
        assert_eq!(report.summary(), "Would apply 1 actions (2 KiB)");
    }

    #[test]
    fn test_copy_errors_are_issues() {
        let mut report = SyncReport::default();
        report.record_apply(ApplyOutcome {
            errors: vec![CopyError::ParentFailed {
                path: PathBuf::from("/d/x/y"),
                parent: "x".into(),
            }],
            ..ApplyOutcome::default()
        });

        assert!(!report.is_success());
        assert!(report.issues[0].to_string().starts_with("[copy]"));
    }

    #[test]
    fn test_teardown_does_not_fail_run() {
        let report = SyncReport {
            teardown: vec![TeardownError::Panicked {
                worker: "analyzer-source-0".into(),
            }],
            ..SyncReport::default()
        };
        assert!(report.is_success());
    }
}
