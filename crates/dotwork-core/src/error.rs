//! Root error type of the provisioning engine.
//!
//! Domain rule violations and use-case failures both surface as
//! [`DotworkError`]; callers map [`DotworkError::category`] to exit codes and
//! show [`DotworkError::suggestions`] to the user.

use std::path::PathBuf;

use thiserror::Error;

use crate::application::ApplicationError;
use crate::domain::DomainError;

/// Every error a [`crate::application::ProvisionService`] or adapter returns.
#[derive(Debug, Error, Clone)]
pub enum DotworkError {
    /// A descriptor, variable or instance record broke a domain rule.
    #[error("{0}")]
    Domain(#[from] DomainError),

    /// A use case could not complete (missing template, I/O, backups).
    #[error("{0}")]
    Application(#[from] ApplicationError),
}

impl DotworkError {
    /// Hints for the user, most specific first.
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Domain(e) => e.suggestions(),
            Self::Application(e) => e.suggestions(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Domain(e) => match e.category() {
                crate::domain::ErrorCategory::Validation => ErrorCategory::Validation,
                crate::domain::ErrorCategory::Corrupted => ErrorCategory::Corrupted,
                crate::domain::ErrorCategory::Internal => ErrorCategory::Internal,
            },
            Self::Application(e) => e.category(),
        }
    }

    /// Shorthand for the most common application failure.
    pub fn filesystem(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Application(ApplicationError::FilesystemError {
            path: path.into(),
            reason: reason.into(),
        })
    }
}

/// Coarse error classes, one exit code each in the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    NotFound,
    Conflict,
    /// An on-disk record or archive could not be parsed.
    Corrupted,
    Internal,
}

pub type DotworkResult<T> = Result<T, DotworkError>;
