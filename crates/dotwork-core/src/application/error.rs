//! Application layer errors.
//!
//! These errors represent failures in orchestration, not business logic.
//! Business logic errors are `DomainError` from `crate::domain`.

use std::path::PathBuf;
use thiserror::Error;

use crate::error::ErrorCategory;

/// Errors that occur during application orchestration.
#[derive(Debug, Error, Clone)]
pub enum ApplicationError {
    /// No discovered template carries this name.
    #[error("Template '{name}' not found")]
    TemplateNotFound { name: String },

    /// The directory has no instance record.
    #[error("No managed instance at {path}")]
    NotManaged { path: PathBuf },

    /// Instance creation target already exists.
    #[error("Instance directory already exists: {path}")]
    InstanceExists { path: PathBuf },

    /// Supplied variables do not satisfy the template.
    #[error("Variable validation failed: {}", errors.join("; "))]
    ValidationFailed { errors: Vec<String> },

    /// Filesystem operation failed.
    #[error("Filesystem error at {path}: {reason}")]
    FilesystemError { path: PathBuf, reason: String },

    /// Archive creation, listing or extraction failed.
    #[error("Backup error at {path}: {reason}")]
    BackupFailed { path: PathBuf, reason: String },

    /// Named backup archive does not exist.
    #[error("Backup not found: {path}")]
    BackupNotFound { path: PathBuf },

    /// In-memory store access failed (lock poisoned).
    #[error("Filesystem store lock poisoned")]
    StoreLockError,
}

impl ApplicationError {
    /// Get user-actionable suggestions.
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Self::TemplateNotFound { name } => vec![
                format!("No template directory named '{name}'"),
                "Try: dotwork templates list".into(),
            ],
            Self::NotManaged { path } => vec![
                format!(
                    "{} has no .dotwork_instance.json record",
                    path.display()
                ),
                "Only directories created by `dotwork new` can be updated".into(),
                "Try: dotwork instances list".into(),
            ],
            Self::InstanceExists { path } => vec![
                format!("Directory already exists: {}", path.display()),
                "Choose a different instance name".into(),
                "Or use `dotwork update` to reconcile the existing instance".into(),
            ],
            Self::ValidationFailed { errors } => {
                let mut out: Vec<String> = errors.iter().map(|e| format!("• {e}")).collect();
                out.push("Pass values with --var NAME=VALUE".into());
                out
            }
            Self::FilesystemError { path, .. } => vec![
                format!("Failed to access: {}", path.display()),
                "Check that you have read/write permissions".into(),
                "Ensure the parent directory exists".into(),
            ],
            Self::BackupFailed { .. } => vec![
                "Check free disk space and permissions of the backup directory".into(),
                "Try: dotwork backup list".into(),
            ],
            Self::BackupNotFound { .. } => vec!["Try: dotwork backup list".into()],
            Self::StoreLockError => vec![
                "The in-memory filesystem lock was poisoned".into(),
                "A previous operation panicked; restart and try again".into(),
            ],
        }
    }

    /// Get error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::TemplateNotFound { .. }
            | Self::NotManaged { .. }
            | Self::BackupNotFound { .. } => ErrorCategory::NotFound,
            Self::InstanceExists { .. } => ErrorCategory::Conflict,
            Self::ValidationFailed { .. } => ErrorCategory::Validation,
            Self::FilesystemError { .. } | Self::BackupFailed { .. } | Self::StoreLockError => {
                ErrorCategory::Internal
            }
        }
    }
}
