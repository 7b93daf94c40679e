//! In-memory filesystem adapter for testing.

use std::{
    collections::{BTreeMap, BTreeSet, HashSet},
    path::{Path, PathBuf},
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use dotwork_core::{
    application::{
        ApplicationError,
        ports::{Filesystem, WalkEntry},
    },
    domain::RelativePath,
    error::{DotworkError, DotworkResult},
};
use sha2::{Digest, Sha256};

/// In-memory filesystem for testing.
///
/// Clones share state, so a test can keep one handle for assertions while
/// the service owns another.
#[derive(Debug, Clone)]
pub struct MemoryFilesystem {
    inner: Arc<RwLock<MemoryFilesystemInner>>,
}

#[derive(Debug, Default)]
struct MemoryFilesystemInner {
    files: BTreeMap<PathBuf, Vec<u8>>,
    directories: BTreeSet<PathBuf>,
    executables: HashSet<PathBuf>,
}

impl MemoryFilesystem {
    /// Create a new empty memory filesystem.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(MemoryFilesystemInner::default())),
        }
    }

    /// Seed a file, creating its parent directories (testing helper).
    pub fn insert_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let path = path.as_ref();
        if let Ok(mut inner) = self.inner.write() {
            if let Some(parent) = path.parent() {
                insert_ancestors(&mut inner.directories, parent);
            }
            inner.files.insert(path.to_path_buf(), content.into());
        }
    }

    /// A file's content, if present (testing helper).
    pub fn contents(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        let inner = self.inner.read().ok()?;
        inner.files.get(path.as_ref()).cloned()
    }

    /// List all files.
    pub fn list_files(&self) -> Vec<PathBuf> {
        self.inner
            .read()
            .map(|inner| inner.files.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Clear all contents.
    pub fn clear(&self) {
        if let Ok(mut inner) = self.inner.write() {
            inner.files.clear();
            inner.directories.clear();
            inner.executables.clear();
        }
    }

    fn read(&self) -> DotworkResult<RwLockReadGuard<'_, MemoryFilesystemInner>> {
        self.inner
            .read()
            .map_err(|_| ApplicationError::StoreLockError.into())
    }

    fn write(&self) -> DotworkResult<RwLockWriteGuard<'_, MemoryFilesystemInner>> {
        self.inner
            .write()
            .map_err(|_| ApplicationError::StoreLockError.into())
    }
}

impl Default for MemoryFilesystem {
    fn default() -> Self {
        Self::new()
    }
}

fn insert_ancestors(directories: &mut BTreeSet<PathBuf>, path: &Path) {
    let mut current = PathBuf::new();
    for component in path.components() {
        current.push(component);
        directories.insert(current.clone());
    }
}

fn not_found(path: &Path, what: &str) -> DotworkError {
    DotworkError::filesystem(path, format!("{what} does not exist"))
}

impl Filesystem for MemoryFilesystem {
    fn create_dir_all(&self, path: &Path) -> DotworkResult<()> {
        let mut inner = self.write()?;
        insert_ancestors(&mut inner.directories, path);
        Ok(())
    }

    fn read_file(&self, path: &Path) -> DotworkResult<Vec<u8>> {
        self.read()?
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| not_found(path, "File"))
    }

    fn write_file(&self, path: &Path, content: &[u8]) -> DotworkResult<()> {
        let mut inner = self.write()?;

        // Ensure parent exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !inner.directories.contains(parent) {
                return Err(DotworkError::filesystem(
                    path,
                    "Parent directory does not exist",
                ));
            }
        }

        inner.files.insert(path.to_path_buf(), content.to_vec());
        Ok(())
    }

    fn set_permissions(&self, path: &Path, executable: bool) -> DotworkResult<()> {
        let mut inner = self.write()?;

        if executable {
            inner.executables.insert(path.to_path_buf());
        } else {
            inner.executables.remove(path);
        }

        Ok(())
    }

    fn is_executable(&self, path: &Path) -> bool {
        self.read().is_ok_and(|inner| inner.executables.contains(path))
    }

    fn exists(&self, path: &Path) -> bool {
        self.read().is_ok_and(|inner| {
            inner.files.contains_key(path) || inner.directories.contains(path)
        })
    }

    fn is_file(&self, path: &Path) -> bool {
        self.read().is_ok_and(|inner| inner.files.contains_key(path))
    }

    fn remove_file(&self, path: &Path) -> DotworkResult<()> {
        let mut inner = self.write()?;
        inner.executables.remove(path);
        inner
            .files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| not_found(path, "File"))
    }

    fn remove_dir_all(&self, path: &Path) -> DotworkResult<()> {
        let mut inner = self.write()?;

        if !inner.directories.contains(path) {
            return Err(not_found(path, "Directory"));
        }
        inner.directories.retain(|p| !p.starts_with(path));
        inner.files.retain(|p, _| !p.starts_with(path));
        inner.executables.retain(|p| !p.starts_with(path));

        Ok(())
    }

    fn walk(&self, root: &Path) -> DotworkResult<Vec<WalkEntry>> {
        let inner = self.read()?;
        if !inner.directories.contains(root) {
            return Err(not_found(root, "Directory"));
        }

        let dirs = inner
            .directories
            .iter()
            .filter(|p| p.as_path() != root)
            .map(|p| (p, true));
        let files = inner.files.keys().map(|p| (p, false));

        let mut entries = Vec::new();
        for (path, is_dir) in dirs.chain(files) {
            if let Ok(relative) = path.strip_prefix(root) {
                entries.push(WalkEntry {
                    path: RelativePath::try_new(relative)?,
                    is_dir,
                });
            }
        }

        // Component-wise ordering puts a directory right before its contents.
        entries.sort_by(|a, b| a.path.as_path().cmp(b.path.as_path()));
        Ok(entries)
    }

    fn list_dirs(&self, path: &Path) -> DotworkResult<Vec<PathBuf>> {
        let inner = self.read()?;
        if !inner.directories.contains(path) {
            return Err(not_found(path, "Directory"));
        }
        Ok(inner
            .directories
            .iter()
            .filter(|p| p.parent() == Some(path))
            .cloned()
            .collect())
    }

    fn file_digest(&self, path: &Path) -> DotworkResult<String> {
        let content = self.read_file(path)?;
        Ok(hex::encode(Sha256::digest(&content)))
    }

    fn canonicalize(&self, path: &Path) -> PathBuf {
        path.to_path_buf()
    }
}
