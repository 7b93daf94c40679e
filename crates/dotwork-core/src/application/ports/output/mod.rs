//! Driven (output) ports - implemented by infrastructure.
//!
//! These traits define what the application needs from external systems.
//! The `dotwork-adapters` crate provides implementations.

use crate::domain::{BackupInfo, RelativePath, ServerInstance, Template, Variables};
use crate::error::DotworkResult;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

#[cfg(test)]
use mockall::automock;

/// One entry produced by [`Filesystem::walk`], relative to the walked root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry {
    pub path: RelativePath,
    pub is_dir: bool,
}

/// Port for filesystem operations.
///
/// Implemented by:
/// - `dotwork_adapters::filesystem::LocalFilesystem` (production)
/// - `dotwork_adapters::filesystem::MemoryFilesystem` (testing)
///
/// ## Design Notes
///
/// - Content is bytes; templates routinely contain binaries (jars, icons)
/// - Digests are opaque strings, only compared for equality
#[cfg_attr(test, automock)]
pub trait Filesystem: Send + Sync {
    /// Create a directory and all parent directories.
    fn create_dir_all(&self, path: &Path) -> DotworkResult<()>;

    /// Read a whole file.
    fn read_file(&self, path: &Path) -> DotworkResult<Vec<u8>>;

    /// Write content to a file, replacing it if present.
    fn write_file(&self, path: &Path, content: &[u8]) -> DotworkResult<()>;

    /// Set or clear the executable bit.
    fn set_permissions(&self, path: &Path, executable: bool) -> DotworkResult<()>;

    /// Whether the file at `path` is executable. `false` when unknown.
    fn is_executable(&self, path: &Path) -> bool;

    /// Check if path exists.
    fn exists(&self, path: &Path) -> bool;

    /// Check if path is a regular file.
    fn is_file(&self, path: &Path) -> bool;

    /// Remove a single file.
    fn remove_file(&self, path: &Path) -> DotworkResult<()>;

    /// Remove a directory and all contents.
    fn remove_dir_all(&self, path: &Path) -> DotworkResult<()>;

    /// Every directory and regular file below `root`, relative to it,
    /// sorted so that a directory precedes its contents.
    fn walk(&self, root: &Path) -> DotworkResult<Vec<WalkEntry>>;

    /// Immediate subdirectories of `path`, sorted.
    fn list_dirs(&self, path: &Path) -> DotworkResult<Vec<PathBuf>>;

    /// Full-content digest of a file.
    fn file_digest(&self, path: &Path) -> DotworkResult<String>;

    /// Resolve `path` to a canonical form for identity comparisons.
    /// Falls back to the path itself when resolution is impossible.
    fn canonicalize(&self, path: &Path) -> PathBuf;
}

/// Port for template discovery.
///
/// Implemented by:
/// - `dotwork_adapters::template_loader::FilesystemTemplateLoader`
#[cfg_attr(test, automock)]
pub trait TemplateRepository: Send + Sync {
    /// Load every template under the repository root.
    ///
    /// A directory that fails to load is skipped (and logged), not fatal.
    fn discover(&self) -> DotworkResult<Vec<Template>>;
}

/// How a file's content was produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    /// Text with placeholders, substituted.
    Rendered { placeholders: BTreeSet<String> },
    /// Text without placeholders, copied unchanged.
    Verbatim,
    /// Not a renderable text file, copied byte-for-byte.
    Binary,
    /// Rendering failed; original content copied unchanged.
    Fallback { reason: String },
}

/// Result of rendering one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedFile {
    pub content: Vec<u8>,
    pub outcome: RenderOutcome,
}

/// Port for per-file placeholder substitution.
///
/// Implemented by:
/// - `dotwork_adapters::renderer::TeraRenderer`
///
/// Rendering never fails: a file that cannot be rendered is returned
/// unchanged with [`RenderOutcome::Fallback`].
#[cfg_attr(test, automock)]
pub trait FileRenderer: Send + Sync {
    /// Render `content`, read from the template file at `source`.
    fn render(&self, source: &Path, content: &[u8], variables: &Variables) -> RenderedFile;
}

/// Port for instance archives.
///
/// Implemented by:
/// - `dotwork_adapters::backup::ZipBackupStore`
#[cfg_attr(test, automock)]
pub trait BackupStore: Send + Sync {
    /// Archive the instance directory. Returns the archive path.
    fn create_backup(&self, instance: &ServerInstance, description: &str)
    -> DotworkResult<PathBuf>;

    /// Every archive in the backup directory, newest first.
    fn list_backups(&self) -> DotworkResult<Vec<BackupInfo>>;

    /// Archives belonging to one instance, newest first.
    fn list_backups_for(&self, instance_name: &str) -> DotworkResult<Vec<BackupInfo>>;

    /// Extract an archive into `destination` and return the restored
    /// instance, rebound to `destination`.
    fn restore_backup(&self, archive: &Path, destination: &Path)
    -> DotworkResult<ServerInstance>;

    /// Extract an archive back to the location it was taken from.
    fn restore_in_place(&self, archive: &Path) -> DotworkResult<ServerInstance>;

    /// Delete an archive.
    fn delete_backup(&self, archive: &Path) -> DotworkResult<()>;
}
