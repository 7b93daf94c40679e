// ============================================================================
// domain/error.rs - DOMAIN ERRORS
// ============================================================================

use thiserror::Error;

/// Root domain error type.
///
/// All errors are:
/// - Cloneable (so batch reports can carry them)
/// - Categorizable (for CLI display)
/// - Actionable (provides suggestions)
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    // ========================================================================
    // Validation Errors
    // ========================================================================
    #[error("Invalid template: {0}")]
    InvalidTemplate(String),

    #[error("Template '{template}' declares variable '{variable}' more than once")]
    DuplicateVariable { template: String, variable: String },

    #[error("Invalid instance name '{name}': {reason}")]
    InvalidInstanceName { name: String, reason: String },

    #[error("Absolute paths not allowed: {path}")]
    AbsolutePathNotAllowed { path: String },

    // ========================================================================
    // Persistence Format Errors
    // ========================================================================
    #[error("Invalid instance record: {reason}")]
    InvalidInstanceRecord { reason: String },

    // ========================================================================
    // Constraint Violations
    // ========================================================================
    #[error("Required field missing: {field}")]
    MissingRequiredField { field: &'static str },
}

impl DomainError {
    /// Get user-actionable suggestions for fixing this error.
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Self::InvalidTemplate(msg) => vec![
                "Check the template descriptor (template.yml)".into(),
                format!("Details: {msg}"),
            ],
            Self::DuplicateVariable { variable, .. } => vec![
                format!("Remove the duplicate '{variable}' entry from template.yml"),
                "Variable names must be unique within a template".into(),
            ],
            Self::InvalidInstanceName { .. } => vec![
                "Instance names become directory names".into(),
                "Use letters, digits, '-' or '_' (e.g. survival-01)".into(),
            ],
            Self::InvalidInstanceRecord { .. } => vec![
                "The instance metadata file (.dotwork_instance.json) is unreadable".into(),
                "Restore it from a backup or recreate the instance".into(),
            ],
            _ => vec!["See documentation for more details".into()],
        }
    }

    /// Error category for CLI display styling.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidTemplate(_)
            | Self::DuplicateVariable { .. }
            | Self::InvalidInstanceName { .. }
            | Self::AbsolutePathNotAllowed { .. } => ErrorCategory::Validation,
            Self::InvalidInstanceRecord { .. } => ErrorCategory::Corrupted,
            Self::MissingRequiredField { .. } => ErrorCategory::Internal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Corrupted,
    Internal,
}
