//! Instance backups.

mod archive;

pub use archive::{DEFAULT_MAX_BACKUPS, ZipBackupStore};
