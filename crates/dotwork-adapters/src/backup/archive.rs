//! Deflate-compressed zip archives of instance directories.

use std::{
    fs::{self, File},
    io::{self, Read, Write},
    path::{Path, PathBuf},
};

use chrono::{DateTime, Duration, Local};
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;
use zip::{
    CompressionMethod, ZipArchive, ZipWriter,
    result::{ZipError, ZipResult},
    write::SimpleFileOptions,
};

use dotwork_core::{
    application::{ApplicationError, ports::BackupStore},
    domain::{
        BACKUP_EXTENSION, BACKUP_MANIFEST_NAME, BackupInfo, BackupManifest, ServerInstance,
        Variables,
    },
    error::{DotworkError, DotworkResult},
};

/// Default number of archives kept per instance.
pub const DEFAULT_MAX_BACKUPS: usize = 5;

/// Stores instance backups as `<instance>_<YYYYmmdd>_<HHMMSSmmm>.zip`
/// files in one directory.
///
/// Every archive starts with a `backup_info.json` manifest followed by the
/// instance tree. Archives that carry the manifest elsewhere, or none at
/// all, are still listed and restored. After each new backup only the newest `max_backups`
/// archives of that instance are kept.
///
/// # Example
///
/// ```no_run
/// use dotwork_adapters::backup::ZipBackupStore;
///
/// let store = ZipBackupStore::new("./backups", 5).with_instances_dir("./instances");
/// println!("{} bytes of backups", store.total_backup_size(None)?);
/// # Ok::<(), dotwork_core::error::DotworkError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ZipBackupStore {
    backup_dir: PathBuf,
    max_backups: usize,
    instances_dir: PathBuf,
}

impl ZipBackupStore {
    /// `max_backups` below 1 is raised to 1.
    pub fn new(backup_dir: impl Into<PathBuf>, max_backups: usize) -> Self {
        Self {
            backup_dir: backup_dir.into(),
            max_backups: max_backups.max(1),
            instances_dir: PathBuf::from("instances"),
        }
    }

    /// Where archives without a recorded origin are restored to.
    pub fn with_instances_dir(mut self, instances_dir: impl Into<PathBuf>) -> Self {
        self.instances_dir = instances_dir.into();
        self
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    pub fn max_backups(&self) -> usize {
        self.max_backups
    }

    /// Combined size in bytes of all archives, or of one instance's.
    pub fn total_backup_size(&self, instance_name: Option<&str>) -> DotworkResult<u64> {
        let backups = match instance_name {
            Some(name) => self.list_backups_for(name)?,
            None => self.list_backups()?,
        };
        Ok(backups.iter().map(|b| b.size).sum())
    }

    /// Where [`BackupStore::restore_in_place`] would extract `archive`.
    pub fn default_restore_path(&self, archive: &Path) -> DotworkResult<PathBuf> {
        let manifest = read_manifest(archive).map_err(|e| failed(archive, e))?;
        Ok(match manifest {
            Some(manifest) => manifest.original_path,
            None => self.instances_dir.join(archive_stem(archive)),
        })
    }

    /// Delete all but the newest `max_backups` archives of one instance.
    /// Running it again without new archives deletes nothing.
    #[instrument(skip(self))]
    pub fn prune(&self, instance_name: &str) -> DotworkResult<usize> {
        let backups = self.list_backups_for(instance_name)?;
        let mut removed = 0;
        for old in backups.iter().skip(self.max_backups) {
            self.delete_backup(&old.path)?;
            info!(archive = %old.file_name, "cleaned up old backup");
            removed += 1;
        }
        Ok(removed)
    }

    /// First free archive path for `instance_name` at or after `taken`.
    fn archive_path(&self, instance_name: &str, taken: DateTime<Local>) -> PathBuf {
        let mut stamp = taken;
        loop {
            let name = format!(
                "{instance_name}_{}{BACKUP_EXTENSION}",
                stamp.format("%Y%m%d_%H%M%S%3f")
            );
            let path = self.backup_dir.join(name);
            if !path.exists() {
                return path;
            }
            stamp += Duration::milliseconds(1);
        }
    }

    fn describe(&self, path: PathBuf, file_name: String) -> ZipResult<BackupInfo> {
        let metadata = fs::metadata(&path)?;
        let created = metadata
            .modified()
            .map(DateTime::<Local>::from)
            .unwrap_or_else(|_| Local::now());
        let manifest = read_manifest(&path)?;
        Ok(BackupInfo {
            file_name,
            path,
            size: metadata.len(),
            created,
            manifest,
        })
    }
}

impl BackupStore for ZipBackupStore {
    #[instrument(skip_all, fields(instance = %instance.name))]
    fn create_backup(
        &self,
        instance: &ServerInstance,
        description: &str,
    ) -> DotworkResult<PathBuf> {
        fs::create_dir_all(&self.backup_dir).map_err(|e| failed(&self.backup_dir, e))?;
        if !instance.path.is_dir() {
            return Err(ApplicationError::BackupFailed {
                path: instance.path.clone(),
                reason: "instance directory does not exist".into(),
            }
            .into());
        }

        let taken = Local::now();
        let archive = self.archive_path(&instance.name, taken);
        let manifest = BackupManifest {
            instance_name: instance.name.clone(),
            template_name: instance.template_name.clone(),
            backup_date: taken.format("%Y-%m-%dT%H:%M:%S%.3f").to_string(),
            description: description.to_string(),
            original_path: instance.path.clone(),
        };

        if let Err(e) = write_archive(&archive, &instance.path, &manifest) {
            if archive.exists() {
                if let Err(cleanup) = fs::remove_file(&archive) {
                    warn!(archive = %archive.display(), error = %cleanup, "could not remove partial backup");
                }
            }
            return Err(failed(&archive, e));
        }
        info!(archive = %archive.display(), "backup created");

        self.prune(&instance.name)?;
        Ok(archive)
    }

    fn list_backups(&self) -> DotworkResult<Vec<BackupInfo>> {
        let read_dir = match fs::read_dir(&self.backup_dir) {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(failed(&self.backup_dir, e)),
        };

        let mut backups = Vec::new();
        for entry in read_dir.filter_map(Result::ok) {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if !file_name.ends_with(BACKUP_EXTENSION) || !entry.path().is_file() {
                continue;
            }
            match self.describe(entry.path(), file_name) {
                Ok(info) => backups.push(info),
                Err(e) => warn!(
                    archive = %entry.path().display(),
                    error = %e,
                    "could not read backup info"
                ),
            }
        }

        // Newest first; the name's timestamp breaks ties between equal mtimes.
        backups.sort_by(|a, b| {
            b.created
                .cmp(&a.created)
                .then_with(|| b.file_name.cmp(&a.file_name))
        });
        Ok(backups)
    }

    fn list_backups_for(&self, instance_name: &str) -> DotworkResult<Vec<BackupInfo>> {
        Ok(self
            .list_backups()?
            .into_iter()
            .filter(|b| b.instance_name().as_deref() == Some(instance_name))
            .collect())
    }

    #[instrument(skip(self), fields(archive = %archive.display(), destination = %destination.display()))]
    fn restore_backup(&self, archive: &Path, destination: &Path) -> DotworkResult<ServerInstance> {
        if !archive.is_file() {
            return Err(ApplicationError::BackupNotFound {
                path: archive.to_path_buf(),
            }
            .into());
        }

        let manifest = read_manifest(archive).map_err(|e| failed(archive, e))?;
        fs::create_dir_all(destination).map_err(|e| failed(destination, e))?;
        let extracted = extract_archive(archive, destination).map_err(|e| failed(archive, e))?;
        debug!(files = extracted, "archive extracted");

        let record = ServerInstance::metadata_path_for(destination);
        let instance = if record.is_file() {
            let raw = fs::read_to_string(&record).map_err(|e| failed(&record, e))?;
            let mut instance = ServerInstance::from_record_json(&raw)?;
            if instance.path != destination {
                instance.path = destination.to_path_buf();
                write_record(&instance)?;
            }
            instance
        } else if let Some(manifest) = manifest {
            let instance = ServerInstance::new(
                manifest.instance_name,
                manifest.template_name,
                destination,
                Variables::new(),
            );
            write_record(&instance)?;
            instance
        } else {
            return Err(ApplicationError::BackupFailed {
                path: archive.to_path_buf(),
                reason: "archive holds neither an instance record nor a manifest".into(),
            }
            .into());
        };

        info!(instance = %instance.name, "backup restored");
        Ok(instance)
    }

    fn restore_in_place(&self, archive: &Path) -> DotworkResult<ServerInstance> {
        if !archive.is_file() {
            return Err(ApplicationError::BackupNotFound {
                path: archive.to_path_buf(),
            }
            .into());
        }
        let destination = self.default_restore_path(archive)?;
        self.restore_backup(archive, &destination)
    }

    fn delete_backup(&self, archive: &Path) -> DotworkResult<()> {
        if !archive.exists() {
            warn!(archive = %archive.display(), "backup file not found");
            return Ok(());
        }
        fs::remove_file(archive).map_err(|e| failed(archive, e))?;
        info!(archive = %archive.display(), "backup deleted");
        Ok(())
    }
}

// ── Archive I/O ───────────────────────────────────────────────────────────────

fn write_archive(archive: &Path, source: &Path, manifest: &BackupManifest) -> ZipResult<()> {
    let mut zip = ZipWriter::new(File::create(archive)?);
    let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    // Manifest first so listing finds it without scanning the whole archive.
    let manifest_json = serde_json::to_vec_pretty(manifest).map_err(io::Error::from)?;
    zip.start_file(BACKUP_MANIFEST_NAME, deflated)?;
    zip.write_all(&manifest_json)?;

    let mut files = 0usize;
    for entry in WalkDir::new(source)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = entry.map_err(io::Error::from)?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let name = entry_name(relative);

        if entry.file_type().is_dir() {
            zip.add_directory(name, deflated)?;
        } else if entry.file_type().is_file() {
            let metadata = entry.metadata().map_err(io::Error::from)?;
            zip.start_file(name, with_mode(deflated, &metadata))?;
            io::copy(&mut File::open(entry.path())?, &mut zip)?;
            files += 1;
        }
    }

    zip.finish()?;
    debug!(files, archive = %archive.display(), "archive written");
    Ok(())
}

/// Zip entry names always use `/`, whatever the host separator.
fn entry_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn with_mode(options: SimpleFileOptions, metadata: &fs::Metadata) -> SimpleFileOptions {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        options.unix_permissions(metadata.permissions().mode())
    }
    #[cfg(not(unix))]
    {
        let _ = metadata;
        options
    }
}

/// The manifest of an archive, if it has a readable one. The manifest may
/// sit anywhere in the archive.
fn read_manifest(archive: &Path) -> ZipResult<Option<BackupManifest>> {
    let mut zip = ZipArchive::new(File::open(archive)?)?;
    let mut entry = match zip.by_name(BACKUP_MANIFEST_NAME) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e),
    };

    let mut raw = String::new();
    entry.read_to_string(&mut raw)?;
    match serde_json::from_str(&raw) {
        Ok(manifest) => Ok(Some(manifest)),
        Err(e) => {
            warn!(archive = %archive.display(), error = %e, "ignoring malformed backup manifest");
            Ok(None)
        }
    }
}

/// Extract every entry except the manifest. Returns the number of entries.
fn extract_archive(archive: &Path, destination: &Path) -> ZipResult<usize> {
    let mut zip = ZipArchive::new(File::open(archive)?)?;
    let mut extracted = 0;
    for index in 0..zip.len() {
        let mut entry = zip.by_index(index)?;
        let Some(relative) = entry.enclosed_name() else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("entry '{}' escapes the restore directory", entry.name()),
            )
            .into());
        };
        if relative == Path::new(BACKUP_MANIFEST_NAME) {
            continue;
        }

        let target = destination.join(&relative);
        if entry.is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            io::copy(&mut entry, &mut File::create(&target)?)?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Some(mode) = entry.unix_mode() {
                    fs::set_permissions(&target, fs::Permissions::from_mode(mode & 0o7777))?;
                }
            }
        }
        extracted += 1;
    }
    Ok(extracted)
}

fn write_record(instance: &ServerInstance) -> DotworkResult<()> {
    let path = instance.metadata_path();
    let json = instance.to_record_json()?;
    fs::write(&path, json).map_err(|e| failed(&path, e))
}

fn archive_stem(archive: &Path) -> String {
    let name = archive
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.strip_suffix(BACKUP_EXTENSION)
        .map(str::to_string)
        .unwrap_or(name)
}

fn failed(path: &Path, e: impl std::fmt::Display) -> DotworkError {
    ApplicationError::BackupFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use dotwork_core::domain::METADATA_FILE_NAME;
    use serde_json::json;
    use tempfile::TempDir;

    struct Fixture {
        _tmp: TempDir,
        root: PathBuf,
        store: ZipBackupStore,
    }

    fn fixture(max_backups: usize) -> Fixture {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().to_path_buf();
        let store = ZipBackupStore::new(root.join("backups"), max_backups)
            .with_instances_dir(root.join("instances"));
        Fixture {
            _tmp: tmp,
            root,
            store,
        }
    }

    /// A managed instance directory with a couple of files.
    fn make_instance(root: &Path, name: &str) -> ServerInstance {
        let dir = root.join("instances").join(name);
        fs::create_dir_all(dir.join("plugins")).unwrap();
        fs::create_dir_all(dir.join("world")).unwrap();
        fs::write(dir.join("server.properties"), "motd=Hello\n").unwrap();
        fs::write(dir.join("plugins/a.jar"), [0u8, 1, 2, 3]).unwrap();

        let vars = Variables::from([("motd".to_string(), json!("Hello"))]);
        let instance = ServerInstance::new(name, "paper", &dir, vars);
        fs::write(instance.metadata_path(), instance.to_record_json().unwrap()).unwrap();
        instance
    }

    #[test]
    fn backup_embeds_manifest_and_is_listed() {
        let f = fixture(5);
        let instance = make_instance(&f.root, "lobby");

        let archive = f.store.create_backup(&instance, "before update").unwrap();
        let name = archive.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("lobby_"));
        assert!(name.ends_with(".zip"));

        let backups = f.store.list_backups().unwrap();
        assert_eq!(backups.len(), 1);
        let manifest = backups[0].manifest.as_ref().unwrap();
        assert_eq!(manifest.template_name, "paper");
        assert_eq!(manifest.description, "before update");
        assert_eq!(manifest.original_path, instance.path);
        assert!(f.store.total_backup_size(None).unwrap() > 0);
    }

    #[test]
    fn names_never_collide() {
        let f = fixture(10);
        let instance = make_instance(&f.root, "lobby");
        let a = f.store.create_backup(&instance, "").unwrap();
        let b = f.store.create_backup(&instance, "").unwrap();
        assert_ne!(a, b);
        assert!(a.is_file() && b.is_file());
    }

    #[test]
    fn retention_keeps_newest_per_instance() {
        let f = fixture(2);
        let lobby = make_instance(&f.root, "lobby");
        let other = make_instance(&f.root, "lobby_2");

        f.store.create_backup(&other, "").unwrap();
        let mut created = Vec::new();
        for _ in 0..4 {
            created.push(f.store.create_backup(&lobby, "").unwrap());
        }

        let kept: Vec<PathBuf> = f
            .store
            .list_backups_for("lobby")
            .unwrap()
            .into_iter()
            .map(|b| b.path)
            .collect();
        assert_eq!(kept, vec![created[3].clone(), created[2].clone()]);
        assert_eq!(f.store.list_backups_for("lobby_2").unwrap().len(), 1);

        // Pruning again without new archives is a no-op.
        assert_eq!(f.store.prune("lobby").unwrap(), 0);
        assert_eq!(f.store.list_backups().unwrap().len(), 3);
    }

    #[test]
    fn restore_to_new_location_rebinds_record() {
        let f = fixture(5);
        let instance = make_instance(&f.root, "lobby");
        let archive = f.store.create_backup(&instance, "").unwrap();

        let target = f.root.join("restored");
        let restored = f.store.restore_backup(&archive, &target).unwrap();

        assert_eq!(restored.name, "lobby");
        assert_eq!(restored.path, target);
        assert_eq!(restored.variables["motd"], json!("Hello"));
        assert_eq!(fs::read(target.join("plugins/a.jar")).unwrap(), [0u8, 1, 2, 3]);
        assert!(target.join("world").is_dir());
        assert!(!target.join(BACKUP_MANIFEST_NAME).exists());

        let record = fs::read_to_string(target.join(METADATA_FILE_NAME)).unwrap();
        assert_eq!(ServerInstance::from_record_json(&record).unwrap().path, target);
    }

    #[test]
    fn restore_in_place_uses_original_path() {
        let f = fixture(5);
        let instance = make_instance(&f.root, "lobby");
        let archive = f.store.create_backup(&instance, "").unwrap();

        fs::remove_dir_all(&instance.path).unwrap();
        let restored = f.store.restore_in_place(&archive).unwrap();

        assert_eq!(restored.path, instance.path);
        assert_eq!(
            fs::read_to_string(instance.path.join("server.properties")).unwrap(),
            "motd=Hello\n"
        );
    }

    #[test]
    fn restore_synthesises_record_from_manifest() {
        let f = fixture(5);
        let dir = f.root.join("instances/bare");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("eula.txt"), "eula=true").unwrap();
        let unmanaged = ServerInstance::new("bare", "velocity", &dir, Variables::new());

        let archive = f.store.create_backup(&unmanaged, "").unwrap();
        let target = f.root.join("restored");
        let restored = f.store.restore_backup(&archive, &target).unwrap();

        assert_eq!(restored.template_name, "velocity");
        assert!(target.join(METADATA_FILE_NAME).is_file());
    }

    /// Write a zip holding `entries` in order, as another tool would.
    fn raw_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let mut zip = ZipWriter::new(File::create(path).unwrap());
        for (name, content) in entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(content).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn listing_tolerates_foreign_archives() {
        let f = fixture(5);
        fs::create_dir_all(f.store.backup_dir()).unwrap();

        // No manifest: the instance name comes from the file name.
        let legacy = f.store.backup_dir().join("old_srv_20240101_120000000.zip");
        raw_zip(&legacy, &[("a.txt", b"data".as_slice())]);

        // Not an archive at all: skipped with a warning.
        fs::write(f.store.backup_dir().join("junk_20240101_000000000.zip"), b"nope").unwrap();

        let backups = f.store.list_backups().unwrap();
        assert_eq!(backups.len(), 1);
        assert_eq!(backups[0].instance_name().as_deref(), Some("old_srv"));
        assert_eq!(
            f.store.default_restore_path(&legacy).unwrap(),
            f.root.join("instances/old_srv_20240101_120000000")
        );
    }

    #[test]
    fn restores_archives_with_trailing_manifest() {
        let f = fixture(5);
        fs::create_dir_all(f.store.backup_dir()).unwrap();
        let original = f.root.join("servers/hub");
        let manifest = json!({
            "instance_name": "hub",
            "template_name": "paper",
            "backup_date": "20240101_120000",
            "description": "nightly",
            "original_path": original,
        })
        .to_string();

        let archive = f.store.backup_dir().join("hub_20240101_120000.zip");
        raw_zip(
            &archive,
            &[
                ("server.properties", b"motd=Hub\n".as_slice()),
                ("plugins/a.jar", [0u8, 1].as_slice()),
                (BACKUP_MANIFEST_NAME, manifest.as_bytes()),
            ],
        );

        let listed = f.store.list_backups_for("hub").unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].manifest.as_ref().unwrap().description, "nightly");

        let restored = f.store.restore_in_place(&archive).unwrap();
        assert_eq!(restored.path, original);
        assert_eq!(restored.template_name, "paper");
        assert_eq!(fs::read(original.join("plugins/a.jar")).unwrap(), [0u8, 1]);
        assert!(!original.join(BACKUP_MANIFEST_NAME).exists());
    }

    #[test]
    fn missing_archives() {
        let f = fixture(5);
        let ghost = f.root.join("backups/ghost.zip");
        f.store.delete_backup(&ghost).unwrap();

        let err = f.store.restore_backup(&ghost, &f.root.join("x")).unwrap_err();
        assert!(matches!(
            err,
            DotworkError::Application(ApplicationError::BackupNotFound { .. })
        ));
        assert!(f.store.list_backups().unwrap().is_empty());
    }

    #[test]
    fn rejects_entries_escaping_the_destination() {
        let f = fixture(5);
        fs::create_dir_all(f.store.backup_dir()).unwrap();
        let archive = f.store.backup_dir().join("evil_20240101_000000000.zip");
        raw_zip(&archive, &[("../escaped.txt", b"boom".as_slice())]);

        let err = f
            .store
            .restore_backup(&archive, &f.root.join("target"))
            .unwrap_err();
        assert!(matches!(
            err,
            DotworkError::Application(ApplicationError::BackupFailed { .. })
        ));
        assert!(!f.root.join("escaped.txt").exists());
    }

    #[cfg(unix)]
    #[test]
    fn executable_bits_survive_a_round_trip() {
        use std::os::unix::fs::PermissionsExt;

        let f = fixture(5);
        let instance = make_instance(&f.root, "lobby");
        let script = instance.path.join("start.sh");
        fs::write(&script, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        let archive = f.store.create_backup(&instance, "").unwrap();
        let target = f.root.join("restored");
        f.store.restore_backup(&archive, &target).unwrap();

        let mode = fs::metadata(target.join("start.sh")).unwrap().permissions().mode();
        assert_ne!(mode & 0o111, 0);
    }
}
