//! End-to-end provisioning against real directories.
//!
//! Every test wires `ProvisionService` with the production adapters and
//! works inside its own temporary workspace.

use std::{
    fs,
    path::{Path, PathBuf},
};

use dotwork_adapters::{FilesystemTemplateLoader, LocalFilesystem, ZipBackupStore, TeraRenderer};
use dotwork_core::{
    application::{
        ApplicationError, BackupStore, CancellationToken, ProvisionOptions, ProvisionService,
        ReconcileMode,
    },
    domain::{FileReason, FileStatus, METADATA_FILE_NAME, ServerInstance, Variables},
    error::DotworkError,
};
use serde_json::json;
use tempfile::TempDir;

const PAPER_DESCRIPTOR: &str = "\
name: paper
version: 1.0.0
variables:
  - name: motd
    description: Message of the day
  - name: port
    type: port
    default: 25565
";

/// A jar-like blob that happens to contain placeholder syntax.
const PLUGIN_JAR: &[u8] = b"PK\x03\x04\xff{{ motd }}\x00\x01";

struct Workspace {
    _tmp: TempDir,
    templates: PathBuf,
    instances: PathBuf,
    backups: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().to_path_buf();
        let ws = Self {
            templates: root.join("templates"),
            instances: root.join("instances"),
            backups: root.join("backups"),
            _tmp: tmp,
        };
        fs::create_dir_all(&ws.instances).unwrap();
        ws
    }

    /// Write a template directory. Returns its path.
    fn template(&self, dir: &str, descriptor: Option<&str>, files: &[(&str, &[u8])]) -> PathBuf {
        let path = self.templates.join(dir);
        fs::create_dir_all(&path).unwrap();
        if let Some(descriptor) = descriptor {
            fs::write(path.join("template.yml"), descriptor).unwrap();
        }
        for (rel, content) in files {
            write(&path.join(rel), content);
        }
        path
    }

    fn paper(&self) -> PathBuf {
        self.template(
            "paper",
            Some(PAPER_DESCRIPTOR),
            &[
                ("server.properties", b"motd={{ motd }}\nserver-port={{port}}\n".as_slice()),
                ("eula.txt", b"eula=true\n".as_slice()),
                ("plugins/essentials.jar", PLUGIN_JAR),
            ],
        )
    }

    fn service(&self) -> ProvisionService {
        self.service_with(ProvisionOptions::default())
    }

    fn service_with(&self, options: ProvisionOptions) -> ProvisionService {
        ProvisionService::new(
            Box::new(FilesystemTemplateLoader::new(&self.templates)),
            Box::new(TeraRenderer::new()),
            Box::new(LocalFilesystem::new()),
        )
        .with_backups(Box::new(self.backup_store()))
        .with_options(options)
    }

    fn backup_store(&self) -> ZipBackupStore {
        ZipBackupStore::new(&self.backups, 5).with_instances_dir(&self.instances)
    }

    /// Create an instance of `paper` named `name` with a greeting.
    fn create(&self, service: &ProvisionService, name: &str) -> ServerInstance {
        let template = service.find_template("paper").unwrap();
        let supplied = Variables::from([("motd".to_string(), json!("Hello"))]);
        service
            .create_instance(&template, name, &self.instances, template.with_defaults(&supplied))
            .unwrap()
    }

    fn backup_count(&self) -> usize {
        self.backup_store().list_backups().unwrap().len()
    }
}

fn write(path: &Path, content: &[u8]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn statuses(result: &dotwork_core::domain::ProvisionResult) -> Vec<(String, FileStatus)> {
    result
        .processed_files
        .iter()
        .map(|f| (f.path.file_name().unwrap().to_string_lossy().into_owned(), f.status))
        .collect()
}

// ── creation ──────────────────────────────────────────────────────────────────

#[test]
fn create_renders_text_and_copies_binaries() {
    let ws = Workspace::new();
    ws.paper();
    write(&ws.templates.join("paper/icon.png"), &[0x89, b'P', b'N', b'G', 0xff, 0x00]);
    let service = ws.service();

    let template = service.find_template("paper").unwrap();
    let vars = template.with_defaults(&Variables::from([("motd".to_string(), json!("Hello"))]));
    let (instance, report) = service
        .create_instance_with_report(&template, "lobby", &ws.instances, vars)
        .unwrap();

    let root = ws.instances.join("lobby");
    assert_eq!(instance.path, root);
    assert_eq!(
        fs::read_to_string(root.join("server.properties")).unwrap(),
        "motd=Hello\nserver-port=25565\n"
    );
    assert_eq!(fs::read(root.join("icon.png")).unwrap(), [0x89, b'P', b'N', b'G', 0xff, 0x00]);
    assert_eq!(fs::read(root.join("plugins/essentials.jar")).unwrap(), PLUGIN_JAR);
    assert!(!root.join("template.yml").exists());

    let record = ServerInstance::from_record_json(
        &fs::read_to_string(root.join(METADATA_FILE_NAME)).unwrap(),
    )
    .unwrap();
    assert_eq!(record.template_name, "paper");
    assert_eq!(record.variables["motd"], json!("Hello"));
    assert_eq!(record.variables["port"], json!(25565));

    assert_eq!(report.counts().created, 4);
    let properties = report
        .processed_files
        .iter()
        .find(|f| f.path.ends_with("server.properties"))
        .unwrap();
    assert_eq!(properties.variables_used.len(), 2);
    let eula = report
        .processed_files
        .iter()
        .find(|f| f.path.ends_with("eula.txt"))
        .unwrap();
    assert!(eula.variables_used.is_empty());
}

#[test]
fn create_twice_is_a_collision() {
    let ws = Workspace::new();
    ws.paper();
    let service = ws.service();
    let first = ws.create(&service, "lobby");
    write(&first.path.join("world/level.dat"), b"precious");

    let template = service.find_template("paper").unwrap();
    let err = service
        .create_instance(&template, "lobby", &ws.instances, template.default_variables())
        .unwrap_err();

    assert!(matches!(
        err,
        DotworkError::Application(ApplicationError::InstanceExists { .. })
    ));
    assert_eq!(fs::read(first.path.join("world/level.dat")).unwrap(), b"precious");
    assert!(first.path.join(METADATA_FILE_NAME).is_file());
}

#[test]
fn validation_reports_every_missing_variable() {
    let ws = Workspace::new();
    ws.template(
        "velocity",
        Some("variables:\n  - name: secret\n  - name: port\n    type: port\n"),
        &[("velocity.toml", b"bind = \"0.0.0.0:{{ port }}\"\n".as_slice())],
    );
    let service = ws.service();
    let template = service.find_template("velocity").unwrap();

    let errors = service.validate_variables(&template, &Variables::new());
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().any(|e| e.contains("'secret'")));
    assert!(errors.iter().any(|e| e.contains("'port'")));

    let err = service
        .create_instance(&template, "proxy", &ws.instances, Variables::new())
        .unwrap_err();
    match err {
        DotworkError::Application(ApplicationError::ValidationFailed { errors }) => {
            assert_eq!(errors.len(), 2)
        }
        other => panic!("expected validation failure, got {other:?}"),
    }
    assert!(!ws.instances.join("proxy").exists());
}

#[test]
fn render_failure_copies_the_file_unchanged() {
    let ws = Workspace::new();
    ws.template("bare", None, &[("motd.txt", b"{{ undeclared }}".as_slice())]);
    let service = ws.service();
    let template = service.find_template("bare").unwrap();

    let instance = service
        .create_instance(&template, "one", &ws.instances, Variables::new())
        .unwrap();
    assert_eq!(fs::read(instance.path.join("motd.txt")).unwrap(), b"{{ undeclared }}");
}

#[test]
fn invalid_template_directories_do_not_hide_others() {
    let ws = Workspace::new();
    ws.paper();
    ws.template("broken", Some("variables: {not: [a list"), &[]);

    let names: Vec<String> = FilesystemTemplateLoader::new(&ws.templates)
        .load_all()
        .unwrap()
        .into_iter()
        .map(|t| t.name)
        .collect();
    assert_eq!(names, vec!["paper"]);
    assert!(matches!(
        ws.service().find_template("broken").unwrap_err(),
        DotworkError::Application(ApplicationError::TemplateNotFound { .. })
    ));
}

// ── reconciliation ────────────────────────────────────────────────────────────

#[test]
fn second_update_is_all_unchanged() {
    let ws = Workspace::new();
    let template_dir = ws.paper();
    let service = ws.service();
    let mut instance = ws.create(&service, "lobby");

    write(&template_dir.join("eula.txt"), b"eula=false\n");
    write(&template_dir.join("config/bukkit.yml"), b"spawn-limit: 70\n");

    let first = service.update_instance_from_template(&mut instance, false).unwrap();
    assert_eq!(first.counts().replaced, 2);
    assert_eq!(
        fs::read_to_string(instance.path.join("eula.txt")).unwrap(),
        "eula=false\n"
    );

    let second = service.update_instance_from_template(&mut instance, false).unwrap();
    assert_eq!(second.counts().unchanged, second.processed_files.len());
    assert!(
        second
            .processed_files
            .iter()
            .all(|f| f.reason == FileReason::SameHash)
    );
}

#[test]
fn identical_bytes_short_circuit_even_with_placeholders() {
    let ws = Workspace::new();
    ws.template("raw", None, &[("notes.md", b"use {{ name }} here".as_slice())]);
    let service = ws.service();
    let template = service.find_template("raw").unwrap();
    let mut instance = service
        .create_instance(&template, "docs", &ws.instances, Variables::new())
        .unwrap();

    // Rendering would fail (no variables), but the copy already matches.
    let result = service.update_instance_from_template(&mut instance, false).unwrap();
    assert_eq!(statuses(&result), vec![("notes.md".to_string(), FileStatus::Unchanged)]);
}

#[test]
fn dry_run_matches_real_run_without_side_effects() {
    let ws = Workspace::new();
    let template_dir = ws.paper();
    let service = ws.service();
    let mut instance = ws.create(&service, "lobby");

    write(&template_dir.join("eula.txt"), b"eula=false\n");
    write(&template_dir.join("config/bukkit.yml"), b"spawn-limit: 70\n");
    write(&instance.path.join("server.properties"), b"motd=edited by hand\n");

    let record_before = fs::read(instance.path.join(METADATA_FILE_NAME)).unwrap();
    let properties_before = fs::read(instance.path.join("server.properties")).unwrap();

    let mut dry_instance = instance.clone();
    let dry = service.update_instance_from_template(&mut dry_instance, true).unwrap();

    assert!(dry.is_dry_run);
    assert_eq!(dry.counts().skipped, 3);
    assert_eq!(dry.counts().unchanged, 1);
    assert_eq!(dry_instance.updated_at, instance.updated_at);
    assert_eq!(fs::read(instance.path.join(METADATA_FILE_NAME)).unwrap(), record_before);
    assert_eq!(fs::read(instance.path.join("server.properties")).unwrap(), properties_before);
    assert!(!instance.path.join("config").exists());
    assert_eq!(ws.backup_count(), 0);

    let real = service.update_instance_from_template(&mut instance, false).unwrap();
    let expected: Vec<(String, FileStatus)> = statuses(&dry)
        .into_iter()
        .map(|(name, status)| match status {
            FileStatus::Skipped => (name, FileStatus::Replaced),
            other => (name, other),
        })
        .collect();
    assert_eq!(statuses(&real), expected);
    assert_eq!(ws.backup_count(), 1);
    assert!(instance.updated_at >= instance.created_at);
}

#[test]
fn binaries_survive_updates_byte_for_byte() {
    let ws = Workspace::new();
    let template_dir = ws.paper();
    let service = ws.service();
    let mut instance = ws.create(&service, "lobby");

    let upgraded: &[u8] = b"PK\x03\x04\xfe{{ port }}\x00\x02";
    write(&template_dir.join("plugins/essentials.jar"), upgraded);
    service.update_instance_from_template(&mut instance, false).unwrap();

    assert_eq!(fs::read(instance.path.join("plugins/essentials.jar")).unwrap(), upgraded);
}

#[test]
fn overlay_keeps_instance_only_files() {
    let ws = Workspace::new();
    let template_dir = ws.paper();
    let service = ws.service();
    let mut instance = ws.create(&service, "lobby");

    write(&instance.path.join("world/level.dat"), b"precious");
    fs::remove_file(template_dir.join("eula.txt")).unwrap();
    service.update_instance_from_template(&mut instance, false).unwrap();

    assert_eq!(fs::read(instance.path.join("world/level.dat")).unwrap(), b"precious");
    assert!(instance.path.join("eula.txt").is_file());
}

#[test]
fn replace_mode_removes_orphans_but_keeps_record() {
    let ws = Workspace::new();
    ws.paper();
    let options = ProvisionOptions {
        auto_backup: false,
        mode: ReconcileMode::Replace,
    };
    let service = ws.service_with(options);
    let mut instance = ws.create(&service, "lobby");
    write(&instance.path.join("world/level.dat"), b"gone soon");

    let dry = service.update_instance_from_template(&mut instance.clone(), true).unwrap();
    assert_eq!(dry.counts().skipped, dry.processed_files.len());
    assert!(instance.path.join("world/level.dat").is_file());

    let real = service.update_instance_from_template(&mut instance, false).unwrap();
    assert_eq!(real.counts().replaced, real.processed_files.len());
    assert!(!instance.path.join("world/level.dat").exists());
    assert!(instance.path.join(METADATA_FILE_NAME).is_file());
    assert_eq!(
        fs::read_to_string(instance.path.join("server.properties")).unwrap(),
        "motd=Hello\nserver-port=25565\n"
    );
}

#[test]
fn broken_backup_store_does_not_block_updates() {
    let ws = Workspace::new();
    let template_dir = ws.paper();
    // A file where the backup directory should be.
    write(&ws.backups, b"not a directory");
    let service = ws.service();
    let mut instance = ws.create(&service, "lobby");

    write(&template_dir.join("eula.txt"), b"eula=false\n");
    let result = service.update_instance_from_template(&mut instance, false).unwrap();
    assert_eq!(result.counts().replaced, 1);
}

#[test]
fn vanished_template_makes_update_fail() {
    let ws = Workspace::new();
    let template_dir = ws.paper();
    let service = ws.service();
    let mut instance = ws.create(&service, "lobby");

    fs::remove_dir_all(template_dir).unwrap();
    let err = service.update_instance_from_template(&mut instance, false).unwrap_err();
    assert_eq!(err.category(), dotwork_core::error::ErrorCategory::NotFound);
}

#[cfg(unix)]
#[test]
fn executable_scripts_stay_executable() {
    use std::os::unix::fs::PermissionsExt;

    let ws = Workspace::new();
    let template_dir = ws.template("scripted", None, &[("start.sh", b"#!/bin/sh\njava -jar server.jar\n".as_slice())]);
    let script = template_dir.join("start.sh");
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

    let service = ws.service();
    let template = service.find_template("scripted").unwrap();
    let instance = service
        .create_instance(&template, "box", &ws.instances, Variables::new())
        .unwrap();

    let mode = fs::metadata(instance.path.join("start.sh")).unwrap().permissions().mode();
    assert_ne!(mode & 0o111, 0);
}

// ── instances and batches ─────────────────────────────────────────────────────

#[test]
fn find_instances_skips_unmanaged_and_duplicates() {
    let ws = Workspace::new();
    ws.paper();
    let service = ws.service();
    ws.create(&service, "a");
    ws.create(&service, "b");
    fs::create_dir_all(ws.instances.join("scratch")).unwrap();
    write(&ws.instances.join("corrupt").join(METADATA_FILE_NAME), b"{ nope");

    let dirs = vec![
        ws.instances.clone(),
        ws.instances.join("."),
        ws.instances.join("missing"),
    ];
    let found: Vec<String> = service
        .find_instances(&dirs)
        .into_iter()
        .map(|i| i.name)
        .collect();
    assert_eq!(found, vec!["a", "b"]);
}

#[test]
fn moved_instance_is_rebound_to_its_directory() {
    let ws = Workspace::new();
    ws.paper();
    let service = ws.service();
    let instance = ws.create(&service, "lobby");

    let moved = ws.instances.join("lobby-renamed");
    fs::rename(&instance.path, &moved).unwrap();

    let loaded = service.require_instance(&moved).unwrap();
    assert_eq!(loaded.path, moved);
    assert_eq!(loaded.name, "lobby");
}

#[test]
fn delete_refuses_unmanaged_directories() {
    let ws = Workspace::new();
    ws.paper();
    let service = ws.service();
    let instance = ws.create(&service, "lobby");

    let mut stranger = instance.clone();
    stranger.path = ws.instances.join("stranger");
    fs::create_dir_all(&stranger.path).unwrap();
    assert!(matches!(
        service.delete_instance(&stranger).unwrap_err(),
        DotworkError::Application(ApplicationError::NotManaged { .. })
    ));
    assert!(stranger.path.is_dir());

    service.delete_instance(&instance).unwrap();
    assert!(!instance.path.exists());
}

#[test]
fn update_all_reports_each_instance() {
    let ws = Workspace::new();
    let template_dir = ws.paper();
    let service = ws.service();
    ws.create(&service, "a");
    ws.create(&service, "b");

    write(&template_dir.join("eula.txt"), b"eula=false\n");
    let instances = service.find_instances(&[ws.instances.clone()]);

    let mut progress = Vec::new();
    let report = service.update_all(instances, false, &CancellationToken::new(), |p| {
        progress.push((p.completed, p.total, p.instance_name.clone()));
    });

    assert!(report.is_success());
    assert_eq!(report.updated, 2);
    assert_eq!(progress, vec![(0, 2, "a".to_string()), (1, 2, "b".to_string())]);
    for name in ["a", "b"] {
        assert_eq!(
            fs::read_to_string(ws.instances.join(name).join("eula.txt")).unwrap(),
            "eula=false\n"
        );
    }
}

#[test]
fn cancelled_batch_leaves_remaining_instances_alone() {
    let ws = Workspace::new();
    let template_dir = ws.paper();
    let service = ws.service_with(ProvisionOptions {
        auto_backup: false,
        ..Default::default()
    });
    ws.create(&service, "a");
    ws.create(&service, "b");
    write(&template_dir.join("eula.txt"), b"eula=false\n");

    let cancel = CancellationToken::new();
    let instances = service.find_instances(&[ws.instances.clone()]);
    let report = service.update_all(instances, false, &cancel, |progress| {
        if progress.completed == 1 {
            cancel.cancel();
        }
    });

    assert!(report.cancelled);
    assert_eq!(report.updated, 1);
    assert_eq!(report.not_processed(), 1);
    let eulas: Vec<String> = ["a", "b"]
        .iter()
        .map(|name| fs::read_to_string(ws.instances.join(name).join("eula.txt")).unwrap())
        .collect();
    assert!(eulas.contains(&"eula=false\n".to_string()));
    assert!(eulas.contains(&"eula=true\n".to_string()));
}

// ── backups ───────────────────────────────────────────────────────────────────

#[test]
fn restored_backup_can_be_updated_again() {
    let ws = Workspace::new();
    ws.paper();
    let service = ws.service();
    let instance = ws.create(&service, "lobby");
    let store = ws.backup_store();

    let archive = store.create_backup(&instance, "manual").unwrap();
    fs::remove_dir_all(&instance.path).unwrap();

    let restored = store.restore_in_place(&archive).unwrap();
    let mut loaded = service.require_instance(&restored.path).unwrap();
    let result = service.update_instance_from_template(&mut loaded, true).unwrap();
    assert_eq!(result.counts().unchanged, result.processed_files.len());
}
