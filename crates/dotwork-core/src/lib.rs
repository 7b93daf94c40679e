//! Provisioning engine for templated server instances.
//!
//! A template is a directory of files whose text may contain `{{ name }}`
//! placeholders. [`application::ProvisionService`] renders a template into
//! a new instance directory, records how the instance was made, and later
//! reconciles the instance with the template after the template changed.
//!
//! The crate is split the usual hexagonal way:
//!
//! - [`domain`]: templates, variables, instance records and per-file results.
//!   Pure data and validation, no I/O.
//! - [`application`]: the services plus the port traits they drive
//!   (`Filesystem`, `TemplateRepository`, `FileRenderer`, `BackupStore`).
//!   Concrete ports live in `dotwork-adapters`.
//!
//! ```rust,ignore
//! use dotwork_core::prelude::*;
//!
//! let service = ProvisionService::new(templates, renderer, filesystem);
//! let template = service.find_template("minecraft-paper")?;
//! let vars = template.with_defaults(&supplied);
//! let instance = service.create_instance(&template, "lobby", "./instances".as_ref(), vars)?;
//!
//! // Later, after the template changed:
//! let mut instance = service.require_instance(&instance.path)?;
//! let result = service.update_instance_from_template(&mut instance, false)?;
//! println!("{} files replaced", result.counts().replaced);
//! ```

pub mod application;
pub mod domain;
pub mod error;

/// The types most callers need.
pub mod prelude {
    pub use crate::application::{
        BackupStore, CancellationToken, FileRenderer, Filesystem, ProvisionOptions,
        ProvisionService, ReconcileMode, TemplateInfo, TemplateRepository, TemplateService,
    };
    pub use crate::domain::{
        BatchProgress, BatchReport, FileReason, FileResult, FileStatus, ProvisionResult,
        ServerInstance, Template, TemplateVariable, VariableKind, Variables,
    };
    pub use crate::error::{DotworkError, DotworkResult};
}
