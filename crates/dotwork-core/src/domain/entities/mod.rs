pub mod backup;
pub mod common;
pub mod instance;
pub mod result;
pub mod template;

pub use crate::domain::DomainError;
pub use backup::{BackupInfo, BackupManifest};
pub use instance::ServerInstance;
pub use result::{FileResult, FileStatus, ProvisionResult};
pub use template::{Template, TemplateVariable};
