//! Infrastructure adapters for Dotwork.
//!
//! This crate implements the ports defined in `dotwork-core::application::ports`.
//! It contains all external dependencies and I/O operations.

pub mod backup;
pub mod filesystem;
pub mod renderer;
pub mod template_loader;

// Re-export commonly used adapters
pub use backup::ZipBackupStore;
pub use filesystem::{LocalFilesystem, MemoryFilesystem};
pub use renderer::TeraRenderer;
pub use template_loader::FilesystemTemplateLoader;
