//! Outcome records for provisioning and reconciliation.
//!
//! | Status      | Reason         | Meaning                                        |
//! |-------------|----------------|------------------------------------------------|
//! | `Created`   | `success`      | written during instance creation               |
//! | `Replaced`  | `success`      | instance copy differed (or was missing)        |
//! | `Unchanged` | `same-hash`    | instance copy already identical                |
//! | `Skipped`   | `dry-run`      | would have been replaced                       |
//! | `Error`     | `read-failed`  | template file could not be read                |
//! | `Error`     | `write-failed` | instance file could not be written             |

use crate::domain::{entities::template::Template, value_objects::Variables};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// What happened to one template file during a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Replaced,
    Created,
    Unchanged,
    Skipped,
    Error,
}

impl FileStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Replaced => "replaced",
            Self::Created => "created",
            Self::Unchanged => "unchanged",
            Self::Skipped => "skipped",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Short machine-readable code explaining a [`FileStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileReason {
    Success,
    SameHash,
    DryRun,
    ReadFailed,
    WriteFailed,
}

impl FileReason {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::SameHash => "same-hash",
            Self::DryRun => "dry-run",
            Self::ReadFailed => "read-failed",
            Self::WriteFailed => "write-failed",
        }
    }
}

impl fmt::Display for FileReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-file outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileResult {
    /// Destination path inside the instance directory.
    pub path: PathBuf,
    pub status: FileStatus,
    pub reason: FileReason,
    /// Name of the template the file came from.
    pub template: String,
    /// The variables the file's placeholders referenced, with the values used.
    pub variables_used: Variables,
}

impl FileResult {
    pub fn new(
        path: impl Into<PathBuf>,
        status: FileStatus,
        reason: FileReason,
        template: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            status,
            reason,
            template: template.into(),
            variables_used: Variables::new(),
        }
    }

    pub fn with_variables(mut self, variables: Variables) -> Self {
        self.variables_used = variables;
        self
    }
}

/// Counts of each status in a [`ProvisionResult`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub created: usize,
    pub replaced: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub errors: usize,
}

/// Outcome of one creation or reconciliation pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProvisionResult {
    pub template: Template,
    pub is_dry_run: bool,
    pub processed_files: Vec<FileResult>,
}

impl ProvisionResult {
    pub fn new(template: Template, is_dry_run: bool, processed_files: Vec<FileResult>) -> Self {
        Self {
            template,
            is_dry_run,
            processed_files,
        }
    }

    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for file in &self.processed_files {
            match file.status {
                FileStatus::Created => counts.created += 1,
                FileStatus::Replaced => counts.replaced += 1,
                FileStatus::Unchanged => counts.unchanged += 1,
                FileStatus::Skipped => counts.skipped += 1,
                FileStatus::Error => counts.errors += 1,
            }
        }
        counts
    }

    pub fn has_errors(&self) -> bool {
        self.processed_files
            .iter()
            .any(|f| f.status == FileStatus::Error)
    }

    /// Files whose instance copy was (or, in a dry run, would be) rewritten.
    pub fn changed_files(&self) -> impl Iterator<Item = &FileResult> {
        self.processed_files.iter().filter(|f| {
            matches!(
                f.status,
                FileStatus::Created | FileStatus::Replaced | FileStatus::Skipped
            )
        })
    }
}

// ── Batch ────────────────────────────────────────────────────────────────────

/// Progress notification sent before each instance of a batch is processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchProgress {
    /// Instances finished so far (also the index of the one about to start).
    pub completed: usize,
    pub total: usize,
    pub instance_name: String,
}

/// Why one instance of a batch failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchFailure {
    pub instance_name: String,
    pub path: PathBuf,
    pub message: String,
}

/// Summary of a batch reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub total: usize,
    pub updated: usize,
    pub failed: usize,
    pub failures: Vec<BatchFailure>,
    pub results: Vec<ProvisionResult>,
    /// Set when the batch stopped early because cancellation was requested.
    pub cancelled: bool,
}

impl BatchReport {
    /// Instances never reached because the batch was cancelled.
    pub fn not_processed(&self) -> usize {
        self.total.saturating_sub(self.updated + self.failed)
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0 && !self.cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template() -> Template {
        Template::builder().name("paper").path("/t").build().unwrap()
    }

    #[test]
    fn counts_tally_each_status() {
        let result = ProvisionResult::new(
            template(),
            false,
            vec![
                FileResult::new("a", FileStatus::Replaced, FileReason::Success, "paper"),
                FileResult::new("b", FileStatus::Unchanged, FileReason::SameHash, "paper"),
                FileResult::new("c", FileStatus::Error, FileReason::WriteFailed, "paper"),
            ],
        );
        let counts = result.counts();
        assert_eq!(counts.replaced, 1);
        assert_eq!(counts.unchanged, 1);
        assert_eq!(counts.errors, 1);
        assert!(result.has_errors());
        assert_eq!(result.changed_files().count(), 1);
    }

    #[test]
    fn reasons_serialize_as_short_codes() {
        let file = FileResult::new("a", FileStatus::Unchanged, FileReason::SameHash, "paper");
        let json = serde_json::to_value(&file).unwrap();
        assert_eq!(json["status"], "unchanged");
        assert_eq!(json["reason"], "same-hash");
    }

    #[test]
    fn batch_report_tracks_unprocessed_instances() {
        let report = BatchReport {
            total: 5,
            updated: 2,
            failed: 1,
            cancelled: true,
            ..Default::default()
        };
        assert_eq!(report.not_processed(), 2);
        assert!(!report.is_success());
    }
}
