//! Local filesystem adapter using std::fs.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use dotwork_core::{
    application::ports::{Filesystem, WalkEntry},
    domain::RelativePath,
    error::{DotworkError, DotworkResult},
};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

/// Read buffer for streaming digests.
const DIGEST_CHUNK: usize = 64 * 1024;

/// Production filesystem implementation using `std::fs`.
#[derive(Debug, Clone, Copy)]
pub struct LocalFilesystem;

impl LocalFilesystem {
    /// Create a new local filesystem adapter.
    pub fn new() -> Self {
        Self
    }
}

impl Default for LocalFilesystem {
    fn default() -> Self {
        Self::new()
    }
}

impl Filesystem for LocalFilesystem {
    fn create_dir_all(&self, path: &Path) -> DotworkResult<()> {
        std::fs::create_dir_all(path).map_err(|e| map_io_error(path, e, "create directory"))
    }

    fn read_file(&self, path: &Path) -> DotworkResult<Vec<u8>> {
        std::fs::read(path).map_err(|e| map_io_error(path, e, "read file"))
    }

    fn write_file(&self, path: &Path, content: &[u8]) -> DotworkResult<()> {
        std::fs::write(path, content).map_err(|e| map_io_error(path, e, "write file"))
    }

    fn set_permissions(&self, path: &Path, executable: bool) -> DotworkResult<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let metadata =
                std::fs::metadata(path).map_err(|e| map_io_error(path, e, "get metadata"))?;
            let mut perms = metadata.permissions();
            let mode = perms.mode();
            perms.set_mode(if executable { mode | 0o111 } else { mode & !0o111 });
            std::fs::set_permissions(path, perms)
                .map_err(|e| map_io_error(path, e, "set permissions"))?;
        }
        #[cfg(windows)]
        {
            // Windows doesn't have executable bit in the same way
            let _ = (path, executable);
        }
        Ok(())
    }

    fn is_executable(&self, path: &Path) -> bool {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::metadata(path).is_ok_and(|m| m.permissions().mode() & 0o111 != 0)
        }
        #[cfg(not(unix))]
        {
            let _ = path;
            false
        }
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn remove_file(&self, path: &Path) -> DotworkResult<()> {
        std::fs::remove_file(path).map_err(|e| map_io_error(path, e, "remove file"))
    }

    fn remove_dir_all(&self, path: &Path) -> DotworkResult<()> {
        std::fs::remove_dir_all(path).map_err(|e| map_io_error(path, e, "remove directory"))
    }

    fn walk(&self, root: &Path) -> DotworkResult<Vec<WalkEntry>> {
        let mut entries = Vec::new();

        for entry in WalkDir::new(root)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(root).to_path_buf();
                DotworkError::filesystem(path, format!("Failed to walk directory: {e}"))
            })?;

            let file_type = entry.file_type();
            if !file_type.is_dir() && !file_type.is_file() {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(root)
                .map_err(|e| DotworkError::filesystem(entry.path(), e.to_string()))?;
            entries.push(WalkEntry {
                path: RelativePath::try_new(relative)?,
                is_dir: file_type.is_dir(),
            });
        }

        Ok(entries)
    }

    fn list_dirs(&self, path: &Path) -> DotworkResult<Vec<PathBuf>> {
        let mut dirs = Vec::new();
        let read_dir =
            std::fs::read_dir(path).map_err(|e| map_io_error(path, e, "read directory"))?;
        for entry in read_dir {
            let entry = entry.map_err(|e| map_io_error(path, e, "read directory entry"))?;
            if entry.path().is_dir() {
                dirs.push(entry.path());
            }
        }
        dirs.sort();
        Ok(dirs)
    }

    fn file_digest(&self, path: &Path) -> DotworkResult<String> {
        let file = File::open(path).map_err(|e| map_io_error(path, e, "open file"))?;
        let mut reader = BufReader::with_capacity(DIGEST_CHUNK, file);
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; DIGEST_CHUNK];

        loop {
            let read = reader
                .read(&mut buffer)
                .map_err(|e| map_io_error(path, e, "read file"))?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
        }

        Ok(hex::encode(hasher.finalize()))
    }

    fn canonicalize(&self, path: &Path) -> PathBuf {
        std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
    }
}

fn map_io_error(path: &Path, e: io::Error, operation: &str) -> DotworkError {
    DotworkError::filesystem(path, format!("Failed to {operation}: {e}"))
}
