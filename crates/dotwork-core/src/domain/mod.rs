//! Core domain layer for Dotwork.
//!
//! This module contains pure business logic: templates, instances,
//! variable validation and the outcome records of a provisioning pass.
//! All I/O (filesystem, rendering, archives) is handled via ports (traits)
//! defined in the application layer.
//!
//! ## Hexagonal Architecture Compliance
//!
//! - **No async**: Domain logic is synchronous
//! - **No I/O**: No filesystem, network, or external calls
//! - **Few crates**: std + thiserror, plus serde/chrono for the record format
//! - **Value semantics**: All domain objects are Clone + PartialEq
pub mod entities;
pub mod error;
pub mod value_objects;

mod validation;

pub use entities::{
    backup::{BACKUP_EXTENSION, BACKUP_MANIFEST_NAME, BackupInfo, BackupManifest},
    common::RelativePath,
    instance::{DEFAULT_INSTANCE_VERSION, METADATA_FILE_NAME, ServerInstance, group_by_template},
    result::{
        BatchFailure, BatchProgress, BatchReport, FileReason, FileResult, FileStatus,
        ProvisionResult, StatusCounts,
    },
    template::{
        DEFAULT_TEMPLATE_VERSION, DESCRIPTOR_FILE_NAMES, Template, TemplateBuilder, TemplateNode,
        TemplateTree, TemplateVariable,
    },
};

pub use error::{DomainError, ErrorCategory};
pub use validation::DomainValidator;
pub use value_objects::{VariableKind, Variables, as_integer, display_value};
