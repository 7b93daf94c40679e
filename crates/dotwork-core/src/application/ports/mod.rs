//! Application ports (traits) for external dependencies.
//!
//! In hexagonal architecture, ports define interfaces that the application
//! needs from the outside world. Adapters in `dotwork-adapters` implement these.
//!
//! ## Port Types
//!
//! - **Driven (Output) Ports**: Called by application, implemented by infrastructure
//!   - `Filesystem`: File operations and content digests
//!   - `TemplateRepository`: Template discovery
//!   - `FileRenderer`: Placeholder substitution for one file
//!   - `BackupStore`: Instance archives
//!
//! - **Driving (Input) Ports**: Called by external world, implemented by application
//!   - (Defined in CLI layer, implemented by services)

pub mod output;

pub use output::{
    BackupStore, FileRenderer, Filesystem, RenderOutcome, RenderedFile, TemplateRepository,
    WalkEntry,
};

#[cfg(test)]
pub use output::{MockBackupStore, MockFileRenderer, MockFilesystem, MockTemplateRepository};
