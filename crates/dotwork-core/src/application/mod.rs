//! Application layer for Dotwork.
//!
//! This layer contains:
//! - **Services**: Use case orchestration (ProvisionService, TemplateService)
//! - **Ports**: Interface definitions (traits) for external dependencies
//! - **Errors**: Application-specific error types
//!
//! The application layer coordinates the domain layer but contains no
//! business logic itself. All business rules live in `crate::domain`.

pub mod cancellation;
pub mod error;
pub mod ports;
pub mod services;

// Re-export main services
pub use services::{
    ProvisionOptions, ProvisionService, ReconcileMode,
    TemplateInfo, // DTO for template metadata
    TemplateService,
};

// Re-export port traits (for adapter implementation)
pub use ports::{BackupStore, FileRenderer, Filesystem, RenderOutcome, RenderedFile, TemplateRepository, WalkEntry};

pub use cancellation::CancellationToken;
pub use error::ApplicationError;
