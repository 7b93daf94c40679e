//! Application services - orchestrate use cases.
//!
//! Services coordinate the domain layer and ports to accomplish
//! high-level use cases like "create an instance" or "reconcile every
//! instance with its template".

pub mod provision_service;
pub mod template_service;

pub use provision_service::{ProvisionOptions, ProvisionService, ReconcileMode};
pub use template_service::{TemplateInfo, TemplateService};
