//! Backup archives of instance directories.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Name of the manifest embedded at the root of every backup archive.
pub const BACKUP_MANIFEST_NAME: &str = "backup_info.json";

/// File-name suffix of backup archives (Deflate-compressed zip).
pub const BACKUP_EXTENSION: &str = ".zip";

/// Manifest stored inside a backup archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupManifest {
    pub instance_name: String,
    pub template_name: String,
    /// When the archive was taken, ISO-8601.
    pub backup_date: String,
    #[serde(default)]
    pub description: String,
    pub original_path: PathBuf,
}

/// A backup archive found in the backup directory.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackupInfo {
    pub file_name: String,
    pub path: PathBuf,
    pub size: u64,
    /// Archive file modification time.
    pub created: DateTime<Local>,
    /// `None` when the archive carries no readable manifest.
    pub manifest: Option<BackupManifest>,
}

impl BackupInfo {
    /// Instance the archive belongs to: the manifest's name, else the part of
    /// the file name before the `_YYYYmmdd_HHMMSSmmm.zip` suffix.
    pub fn instance_name(&self) -> Option<String> {
        if let Some(manifest) = &self.manifest {
            return Some(manifest.instance_name.clone());
        }
        let stem = self.file_name.strip_suffix(BACKUP_EXTENSION)?;
        let mut parts = stem.rsplitn(3, '_');
        let _time = parts.next()?;
        let _date = parts.next()?;
        parts.next().map(String::from)
    }
}
