//! Provision Service - main application orchestrator.
//!
//! This service owns the instance lifecycle:
//! 1. Create an instance directory from a template (with rollback)
//! 2. Reconcile an existing instance with its (possibly changed) template
//! 3. Reconcile many instances in sequence, with progress and cancellation
//! 4. Find, load and delete instances by their on-disk record
//!
//! ## Reconciliation decision table
//!
//! Evaluated per template file, in order:
//!
//! | Condition                                                  | Status      | Reason      |
//! |------------------------------------------------------------|-------------|-------------|
//! | template file unreadable                                   | `Error`     | read-failed |
//! | destination bytes equal the template file or its rendering | `Unchanged` | same-hash   |
//! | dry run                                                    | `Skipped`   | dry-run     |
//! | write succeeded                                            | `Replaced`  | success     |
//! | write failed                                               | `Error`     | write-failed|
//!
//! Files in the instance that the template does not have are never touched
//! in [`ReconcileMode::Overlay`]. [`ReconcileMode::Replace`] removes every
//! instance file except the record before recopying.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

use crate::{
    application::{
        ApplicationError, CancellationToken,
        ports::{BackupStore, FileRenderer, Filesystem, RenderOutcome, TemplateRepository},
        services::template_service::find_template,
    },
    domain::{
        BatchFailure, BatchProgress, BatchReport, DomainValidator as validator, FileReason,
        FileResult, FileStatus, METADATA_FILE_NAME, ProvisionResult, RelativePath,
        ServerInstance, Template, TemplateNode, TemplateTree, Variables,
    },
    error::{DotworkError, DotworkResult},
};

/// What reconciliation does with instance files the template lacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconcileMode {
    /// Overwrite changed files, leave everything else alone.
    #[default]
    Overlay,
    /// Delete every instance file except the record, then recopy.
    Replace,
}

/// Knobs for [`ProvisionService`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProvisionOptions {
    /// Snapshot the instance before each non-dry reconciliation.
    pub auto_backup: bool,
    pub mode: ReconcileMode,
}

impl Default for ProvisionOptions {
    fn default() -> Self {
        Self {
            auto_backup: true,
            mode: ReconcileMode::Overlay,
        }
    }
}

/// Main provisioning service.
///
/// Orchestrates template lookup, rendering, writing and instance records.
pub struct ProvisionService {
    templates: Box<dyn TemplateRepository>,
    renderer: Box<dyn FileRenderer>,
    filesystem: Box<dyn Filesystem>,
    backups: Option<Box<dyn BackupStore>>,
    options: ProvisionOptions,
}

/// Which side of a copy failed.
enum CopyError {
    Read(DotworkError),
    Write(DotworkError),
}

impl CopyError {
    fn reason(&self) -> FileReason {
        match self {
            Self::Read(_) => FileReason::ReadFailed,
            Self::Write(_) => FileReason::WriteFailed,
        }
    }

    fn into_inner(self) -> DotworkError {
        match self {
            Self::Read(e) | Self::Write(e) => e,
        }
    }
}

impl ProvisionService {
    /// Create a new provision service with the given adapters.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// use dotwork_core::application::ProvisionService;
    ///
    /// let service = ProvisionService::new(
    ///     templates,  // impl TemplateRepository
    ///     renderer,   // impl FileRenderer
    ///     filesystem, // impl Filesystem
    /// )
    /// .with_backups(backups); // impl BackupStore
    /// ```
    pub fn new(
        templates: Box<dyn TemplateRepository>,
        renderer: Box<dyn FileRenderer>,
        filesystem: Box<dyn Filesystem>,
    ) -> Self {
        Self {
            templates,
            renderer,
            filesystem,
            backups: None,
            options: ProvisionOptions::default(),
        }
    }

    /// Attach a backup store used for automatic pre-update snapshots.
    pub fn with_backups(mut self, backups: Box<dyn BackupStore>) -> Self {
        self.backups = Some(backups);
        self
    }

    pub fn with_options(mut self, options: ProvisionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> ProvisionOptions {
        self.options
    }

    /// Look up a template by exact name.
    pub fn find_template(&self, name: &str) -> DotworkResult<Template> {
        find_template(self.templates.as_ref(), name)
    }

    /// Check a variable mapping against a template. Empty means valid.
    pub fn validate_variables(&self, template: &Template, variables: &Variables) -> Vec<String> {
        validator::validate_variables(template, variables)
    }

    // -------------------------------------------------------------------------
    // Creation
    // -------------------------------------------------------------------------

    /// Create a new instance at `output_dir/instance_name`.
    pub fn create_instance(
        &self,
        template: &Template,
        instance_name: &str,
        output_dir: &Path,
        variables: Variables,
    ) -> DotworkResult<ServerInstance> {
        self.create_instance_with_report(template, instance_name, output_dir, variables)
            .map(|(instance, _)| instance)
    }

    /// Create a new instance and report every file written.
    ///
    /// Fails without touching disk when the name is invalid, the target
    /// directory exists, or the variables do not validate (in that order). Any failure after
    /// the directory was created removes it again.
    #[instrument(
        skip_all,
        fields(
            template = %template.name,
            instance = %instance_name,
            output_dir = %output_dir.display()
        )
    )]
    pub fn create_instance_with_report(
        &self,
        template: &Template,
        instance_name: &str,
        output_dir: &Path,
        variables: Variables,
    ) -> DotworkResult<(ServerInstance, ProvisionResult)> {
        validator::validate_instance_name(instance_name)?;

        let root = output_dir.join(instance_name);
        if self.filesystem.exists(&root) {
            return Err(ApplicationError::InstanceExists { path: root }.into());
        }

        let errors = self.validate_variables(template, &variables);
        if !errors.is_empty() {
            return Err(ApplicationError::ValidationFailed { errors }.into());
        }

        info!("Creating instance");
        self.filesystem.create_dir_all(&root)?;

        let instance = ServerInstance::new(instance_name, &template.name, &root, variables);
        match self.write_all(template, &instance) {
            Ok(files) => {
                info!(files = files.len(), "Instance created");
                Ok((instance, ProvisionResult::new(template.clone(), false, files)))
            }
            Err(e) => {
                warn!(error = %e, "Creation failed, attempting rollback");
                self.rollback(&root);
                Err(e)
            }
        }
    }

    /// Write every template entry plus the record into a fresh instance.
    fn write_all(
        &self,
        template: &Template,
        instance: &ServerInstance,
    ) -> DotworkResult<Vec<FileResult>> {
        let tree = self.content_tree(template)?;
        let mut files = Vec::with_capacity(tree.file_count());

        for node in &tree.nodes {
            match node {
                TemplateNode::Directory(rel) => {
                    self.filesystem.create_dir_all(&instance.path.join(rel))?;
                }
                TemplateNode::File(rel) => {
                    let dest = instance.path.join(rel);
                    let outcome = self
                        .copy_file(&template.path.join(rel), &dest, &instance.variables)
                        .map_err(|e| {
                            warn!(file = %rel, reason = %e.reason(), "Cannot copy template file");
                            e.into_inner()
                        })?;
                    files.push(
                        FileResult::new(dest, FileStatus::Created, FileReason::Success, &template.name)
                            .with_variables(variables_used(&outcome, &instance.variables)),
                    );
                }
            }
        }

        self.save_instance(instance)?;
        Ok(files)
    }

    // -------------------------------------------------------------------------
    // Reconciliation
    // -------------------------------------------------------------------------

    /// Bring an instance in line with the current version of its template.
    ///
    /// Per-file failures are reported in the result, not returned as `Err`.
    /// The record is rewritten only on a real run with no failed files.
    #[instrument(
        skip_all,
        fields(
            instance = %instance.name,
            template = %instance.template_name,
            dry_run = dry_run
        )
    )]
    pub fn update_instance_from_template(
        &self,
        instance: &mut ServerInstance,
        dry_run: bool,
    ) -> DotworkResult<ProvisionResult> {
        let template = self.find_template(&instance.template_name)?;

        let issues = self.validate_variables(&template, &instance.variables);
        if !issues.is_empty() {
            warn!(
                issues = %issues.join("; "),
                "Stored variables no longer satisfy the template"
            );
        }

        if self.options.auto_backup && !dry_run {
            self.backup_before_update(instance, &template);
        }

        let replace = self.options.mode == ReconcileMode::Replace;
        if replace && !dry_run {
            self.clear_instance(&instance.path)?;
        }

        let tree = self.content_tree(&template)?;
        let mut processed = Vec::with_capacity(tree.file_count());

        for node in &tree.nodes {
            match node {
                TemplateNode::Directory(rel) => {
                    if !dry_run {
                        self.filesystem.create_dir_all(&instance.path.join(rel))?;
                    }
                }
                TemplateNode::File(rel) => {
                    processed.push(self.reconcile_file(&template, instance, rel, dry_run, replace));
                }
            }
        }

        let result = ProvisionResult::new(template, dry_run, processed);
        let counts = result.counts();
        info!(
            replaced = counts.replaced,
            unchanged = counts.unchanged,
            skipped = counts.skipped,
            errors = counts.errors,
            "Reconciliation finished"
        );

        if dry_run {
            debug!("Dry run, record left untouched");
        } else if result.has_errors() {
            warn!("Some files failed, record left untouched");
        } else {
            instance.touch();
            self.save_instance(instance)?;
        }

        Ok(result)
    }

    /// Apply the decision table to one template file.
    fn reconcile_file(
        &self,
        template: &Template,
        instance: &ServerInstance,
        rel: &RelativePath,
        dry_run: bool,
        replace: bool,
    ) -> FileResult {
        let src = template.path.join(rel);
        let dest = instance.path.join(rel);
        let result = |status, reason| FileResult::new(&dest, status, reason, &template.name);

        // Replace mode compares against nothing: the instance copy is
        // (or, in a dry run, would be) gone.
        let compare = !replace && self.filesystem.is_file(&dest);

        if compare {
            match (
                self.filesystem.file_digest(&src),
                self.filesystem.file_digest(&dest),
            ) {
                (Err(e), _) => {
                    warn!(file = %src.display(), error = %e, "Cannot read template file");
                    return result(FileStatus::Error, FileReason::ReadFailed);
                }
                (Ok(a), Ok(b)) if a == b => {
                    return result(FileStatus::Unchanged, FileReason::SameHash);
                }
                _ => {}
            }
        }

        let content = match self.filesystem.read_file(&src) {
            Ok(content) => content,
            Err(e) => {
                warn!(file = %src.display(), error = %e, "Cannot read template file");
                return result(FileStatus::Error, FileReason::ReadFailed);
            }
        };
        let rendered = self.renderer.render(&src, &content, &instance.variables);
        let used = variables_used(&rendered.outcome, &instance.variables);

        if compare
            && self
                .filesystem
                .read_file(&dest)
                .is_ok_and(|existing| existing == rendered.content)
        {
            return result(FileStatus::Unchanged, FileReason::SameHash).with_variables(used);
        }

        if dry_run {
            return result(FileStatus::Skipped, FileReason::DryRun).with_variables(used);
        }

        match self.write_rendered(&src, &dest, &rendered.content) {
            Ok(()) => {
                debug!(file = %dest.display(), "Replaced");
                result(FileStatus::Replaced, FileReason::Success).with_variables(used)
            }
            Err(e) => {
                warn!(file = %dest.display(), error = %e, "Cannot write instance file");
                result(FileStatus::Error, FileReason::WriteFailed)
            }
        }
    }

    /// Reconcile many instances, strictly one after another.
    ///
    /// `on_progress` is called before each instance and may cancel the batch;
    /// the announced instance is then left untouched. Cancellation is never
    /// observed mid-instance, so no instance is left half-reconciled.
    pub fn update_all<F>(
        &self,
        instances: Vec<ServerInstance>,
        dry_run: bool,
        cancel: &CancellationToken,
        mut on_progress: F,
    ) -> BatchReport
    where
        F: FnMut(&BatchProgress),
    {
        let total = instances.len();
        let mut report = BatchReport {
            total,
            ..Default::default()
        };

        for (completed, mut instance) in instances.into_iter().enumerate() {
            on_progress(&BatchProgress {
                completed,
                total,
                instance_name: instance.name.clone(),
            });

            if cancel.is_cancelled() {
                info!(completed, total, "Batch cancelled");
                report.cancelled = true;
                break;
            }

            let outcome = self.update_instance_from_template(&mut instance, dry_run);
            let failure = |message: String| BatchFailure {
                instance_name: instance.name.clone(),
                path: instance.path.clone(),
                message,
            };

            match outcome {
                Ok(result) if result.has_errors() => {
                    let errors = result.counts().errors;
                    report.failed += 1;
                    report
                        .failures
                        .push(failure(format!("{errors} file(s) could not be reconciled")));
                    report.results.push(result);
                }
                Ok(result) => {
                    report.updated += 1;
                    report.results.push(result);
                }
                Err(e) => {
                    warn!(instance = %instance.name, error = %e, "Instance update failed");
                    report.failed += 1;
                    report.failures.push(failure(e.to_string()));
                }
            }
        }

        info!(
            updated = report.updated,
            failed = report.failed,
            cancelled = report.cancelled,
            "Batch finished"
        );
        report
    }

    // -------------------------------------------------------------------------
    // Instance records
    // -------------------------------------------------------------------------

    /// Managed instances found one level below each search directory.
    ///
    /// Missing search directories are skipped. An instance reachable from
    /// two search directories is reported once.
    pub fn find_instances(&self, search_dirs: &[PathBuf]) -> Vec<ServerInstance> {
        let mut seen = HashSet::new();
        let mut found = Vec::new();

        for dir in search_dirs {
            if !self.filesystem.exists(dir) {
                debug!(dir = %dir.display(), "Search directory missing, skipping");
                continue;
            }
            let candidates = match self.filesystem.list_dirs(dir) {
                Ok(candidates) => candidates,
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "Cannot list search directory");
                    continue;
                }
            };
            for candidate in candidates {
                match self.load_instance(&candidate) {
                    Ok(Some(instance)) => {
                        if seen.insert(self.filesystem.canonicalize(&candidate)) {
                            found.push(instance);
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        warn!(dir = %candidate.display(), error = %e, "Skipping unreadable instance record");
                    }
                }
            }
        }

        found
    }

    /// Read the record of the instance rooted at `dir`.
    ///
    /// `Ok(None)` when the directory is not a managed instance. The loaded
    /// instance is bound to `dir` even if the record names another path
    /// (the directory was moved or restored elsewhere).
    pub fn load_instance(&self, dir: &Path) -> DotworkResult<Option<ServerInstance>> {
        let record = ServerInstance::metadata_path_for(dir);
        if !self.filesystem.is_file(&record) {
            return Ok(None);
        }

        let bytes = self.filesystem.read_file(&record)?;
        let mut instance = ServerInstance::from_record_json(&String::from_utf8_lossy(&bytes))?;

        if self.filesystem.canonicalize(&instance.path) != self.filesystem.canonicalize(dir) {
            debug!(
                recorded = %instance.path.display(),
                actual = %dir.display(),
                "Instance moved since last update"
            );
            instance.path = dir.to_path_buf();
        }
        Ok(Some(instance))
    }

    /// Like [`Self::load_instance`] but an unmanaged directory is an error.
    pub fn require_instance(&self, dir: &Path) -> DotworkResult<ServerInstance> {
        self.load_instance(dir)?.ok_or_else(|| {
            ApplicationError::NotManaged {
                path: dir.to_path_buf(),
            }
            .into()
        })
    }

    /// Persist the instance record.
    pub fn save_instance(&self, instance: &ServerInstance) -> DotworkResult<()> {
        let json = instance.to_record_json()?;
        self.filesystem
            .write_file(&instance.metadata_path(), json.as_bytes())
    }

    /// Remove an instance directory. Refuses directories without a record.
    #[instrument(skip_all, fields(instance = %instance.name, path = %instance.path.display()))]
    pub fn delete_instance(&self, instance: &ServerInstance) -> DotworkResult<()> {
        if !self.filesystem.is_file(&instance.metadata_path()) {
            return Err(ApplicationError::NotManaged {
                path: instance.path.clone(),
            }
            .into());
        }
        self.filesystem.remove_dir_all(&instance.path)?;
        info!("Instance deleted");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Internal Helpers
    // -------------------------------------------------------------------------

    /// Template content in walk order, bookkeeping files removed.
    fn content_tree(&self, template: &Template) -> DotworkResult<TemplateTree> {
        let mut tree = TemplateTree::new();
        for entry in self.filesystem.walk(&template.path)? {
            tree.push(if entry.is_dir {
                TemplateNode::Directory(entry.path)
            } else {
                TemplateNode::File(entry.path)
            });
        }
        Ok(tree)
    }

    /// Render one template file into `dest`.
    fn copy_file(
        &self,
        src: &Path,
        dest: &Path,
        variables: &Variables,
    ) -> Result<RenderOutcome, CopyError> {
        let content = self.filesystem.read_file(src).map_err(CopyError::Read)?;
        let rendered = self.renderer.render(src, &content, variables);
        self.write_rendered(src, dest, &rendered.content)
            .map_err(CopyError::Write)?;
        Ok(rendered.outcome)
    }

    /// Write content, creating parents, and carry over the executable bit.
    fn write_rendered(&self, src: &Path, dest: &Path, content: &[u8]) -> DotworkResult<()> {
        if let Some(parent) = dest.parent() {
            self.filesystem.create_dir_all(parent)?;
        }
        self.filesystem.write_file(dest, content)?;
        if self.filesystem.is_executable(src) {
            self.filesystem.set_permissions(dest, true)?;
        }
        Ok(())
    }

    /// Best-effort snapshot; never fails the caller.
    fn backup_before_update(&self, instance: &ServerInstance, template: &Template) {
        let Some(backups) = &self.backups else {
            debug!("Auto backup enabled but no backup store configured");
            return;
        };
        let description = format!(
            "Auto backup before update to {} v{}",
            template.name, template.version
        );
        match backups.create_backup(instance, &description) {
            Ok(archive) => info!(archive = %archive.display(), "Backup created"),
            Err(e) => warn!(error = %e, "Backup failed, continuing without one"),
        }
    }

    /// Replace mode: drop every instance file except the record.
    fn clear_instance(&self, root: &Path) -> DotworkResult<()> {
        let mut removed = 0usize;
        for entry in self.filesystem.walk(root)? {
            if entry.is_dir || entry.path.as_path() == Path::new(METADATA_FILE_NAME) {
                continue;
            }
            self.filesystem.remove_file(&root.join(&entry.path))?;
            removed += 1;
        }
        info!(removed, "Cleared instance for full replace");
        Ok(())
    }

    /// Best-effort rollback on failure.
    fn rollback(&self, root: &Path) {
        if let Err(e) = self.filesystem.remove_dir_all(root) {
            warn!(
                error = %e,
                path = %root.display(),
                "Rollback failed"
            );
        } else {
            info!("Rollback successful");
        }
    }
}

/// The subset of `variables` a rendered file actually referenced.
fn variables_used(outcome: &RenderOutcome, variables: &Variables) -> Variables {
    match outcome {
        RenderOutcome::Rendered { placeholders } => variables
            .iter()
            .filter(|(name, _)| placeholders.contains(name.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
        _ => Variables::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{
        MockBackupStore, MockFileRenderer, MockFilesystem, MockTemplateRepository, RenderedFile,
        WalkEntry,
    };
    use crate::domain::{TemplateVariable, VariableKind};
    use serde_json::json;

    fn template() -> Template {
        Template::builder()
            .name("paper")
            .path("/templates/paper")
            .variable(TemplateVariable::new("port", VariableKind::Port))
            .build()
            .unwrap()
    }

    fn repo() -> Box<MockTemplateRepository> {
        let mut repo = MockTemplateRepository::new();
        repo.expect_discover().returning(|| Ok(vec![template()]));
        Box::new(repo)
    }

    fn instance() -> ServerInstance {
        ServerInstance::new(
            "lobby",
            "paper",
            "/srv/lobby",
            Variables::from([("port".to_string(), json!(25565))]),
        )
    }

    fn file_entry(path: &str) -> WalkEntry {
        WalkEntry {
            path: RelativePath::try_new(path).unwrap(),
            is_dir: false,
        }
    }

    #[test]
    fn missing_template_is_not_found() {
        let mut repo = MockTemplateRepository::new();
        repo.expect_discover().returning(|| Ok(vec![]));
        let service = ProvisionService::new(
            Box::new(repo),
            Box::new(MockFileRenderer::new()),
            Box::new(MockFilesystem::new()),
        );

        let err = service
            .update_instance_from_template(&mut instance(), false)
            .unwrap_err();
        assert!(matches!(
            err,
            DotworkError::Application(ApplicationError::TemplateNotFound { .. })
        ));
    }

    #[test]
    fn backup_failure_does_not_abort_reconciliation() {
        let mut backups = MockBackupStore::new();
        backups
            .expect_create_backup()
            .times(1)
            .returning(|_, _| Err(DotworkError::filesystem("/backups", "disk full")));

        let mut fs = MockFilesystem::new();
        fs.expect_walk().returning(|_| Ok(vec![]));
        fs.expect_write_file()
            .withf(|path, _| path == Path::new("/srv/lobby/.dotwork_instance.json"))
            .times(1)
            .returning(|_, _| Ok(()));

        let service = ProvisionService::new(repo(), Box::new(MockFileRenderer::new()), Box::new(fs))
            .with_backups(Box::new(backups));

        let mut instance = instance();
        let result = service
            .update_instance_from_template(&mut instance, false)
            .unwrap();
        assert!(result.processed_files.is_empty());
        assert!(!result.is_dry_run);
    }

    #[test]
    fn dry_run_never_backs_up_or_writes() {
        let mut backups = MockBackupStore::new();
        backups.expect_create_backup().times(0);

        let mut fs = MockFilesystem::new();
        fs.expect_walk()
            .returning(|_| Ok(vec![file_entry("server.properties")]));
        fs.expect_is_file().returning(|_| false);
        fs.expect_read_file()
            .returning(|_| Ok(b"server-port={{ port }}".to_vec()));
        fs.expect_write_file().times(0);
        fs.expect_create_dir_all().times(0);

        let mut renderer = MockFileRenderer::new();
        renderer.expect_render().returning(|_, _, _| RenderedFile {
            content: b"server-port=25565".to_vec(),
            outcome: RenderOutcome::Rendered {
                placeholders: ["port".to_string()].into(),
            },
        });

        let service = ProvisionService::new(repo(), Box::new(renderer), Box::new(fs))
            .with_backups(Box::new(backups));

        let mut instance = instance();
        let before = instance.updated_at;
        let result = service
            .update_instance_from_template(&mut instance, true)
            .unwrap();

        assert_eq!(result.processed_files.len(), 1);
        let file = &result.processed_files[0];
        assert_eq!(file.status, FileStatus::Skipped);
        assert_eq!(file.reason, FileReason::DryRun);
        assert_eq!(file.variables_used["port"], json!(25565));
        assert_eq!(instance.updated_at, before);
    }

    #[test]
    fn write_failure_is_recorded_and_record_not_saved() {
        let mut fs = MockFilesystem::new();
        fs.expect_walk()
            .returning(|_| Ok(vec![file_entry("eula.txt")]));
        fs.expect_is_file().returning(|_| false);
        fs.expect_read_file().returning(|_| Ok(b"eula=true".to_vec()));
        fs.expect_create_dir_all().returning(|_| Ok(()));
        fs.expect_write_file()
            .times(1)
            .returning(|p, _| Err(DotworkError::filesystem(p, "read-only filesystem")));

        let mut renderer = MockFileRenderer::new();
        renderer.expect_render().returning(|_, c, _| RenderedFile {
            content: c.to_vec(),
            outcome: RenderOutcome::Verbatim,
        });

        let service = ProvisionService::new(repo(), Box::new(renderer), Box::new(fs))
            .with_options(ProvisionOptions {
                auto_backup: false,
                mode: ReconcileMode::Overlay,
            });

        let result = service
            .update_instance_from_template(&mut instance(), false)
            .unwrap();
        assert_eq!(result.processed_files[0].status, FileStatus::Error);
        assert_eq!(result.processed_files[0].reason, FileReason::WriteFailed);
    }

    #[test]
    fn batch_stops_between_instances_when_cancelled() {
        let mut fs = MockFilesystem::new();
        fs.expect_walk().returning(|_| Ok(vec![]));
        fs.expect_write_file().returning(|_, _| Ok(()));

        let service = ProvisionService::new(
            repo(),
            Box::new(MockFileRenderer::new()),
            Box::new(fs),
        )
        .with_options(ProvisionOptions {
            auto_backup: false,
            ..Default::default()
        });

        let cancel = CancellationToken::new();
        let mut seen = Vec::new();
        let report = service.update_all(
            vec![instance(), instance(), instance()],
            false,
            &cancel,
            |progress| {
                seen.push(progress.completed);
                if progress.completed == 1 {
                    cancel.cancel();
                }
            },
        );

        assert_eq!(seen, vec![0, 1]);
        assert_eq!(report.updated, 1);
        assert!(report.cancelled);
        assert_eq!(report.not_processed(), 2);
    }

    #[test]
    fn batch_continues_after_a_failed_instance() {
        let mut fs = MockFilesystem::new();
        fs.expect_walk().returning(|_| Ok(vec![]));
        fs.expect_write_file().returning(|_, _| Ok(()));

        let service = ProvisionService::new(
            repo(),
            Box::new(MockFileRenderer::new()),
            Box::new(fs),
        )
        .with_options(ProvisionOptions {
            auto_backup: false,
            ..Default::default()
        });

        let mut orphan = instance();
        orphan.name = "orphan".into();
        orphan.template_name = "deleted-template".into();

        let report = service.update_all(
            vec![orphan, instance()],
            false,
            &CancellationToken::new(),
            |_| {},
        );
        assert_eq!(report.failed, 1);
        assert_eq!(report.updated, 1);
        assert_eq!(report.failures[0].instance_name, "orphan");
        assert!(report.failures[0].message.contains("deleted-template"));
    }

    #[test]
    fn create_rejects_invalid_variables_before_touching_disk() {
        let mut fs = MockFilesystem::new();
        fs.expect_exists().returning(|_| false);
        fs.expect_create_dir_all().times(0);
        let service = ProvisionService::new(repo(), Box::new(MockFileRenderer::new()), Box::new(fs));

        let err = service
            .create_instance(&template(), "lobby", Path::new("/srv"), Variables::new())
            .unwrap_err();
        match err {
            DotworkError::Application(ApplicationError::ValidationFailed { errors }) => {
                assert_eq!(errors, vec!["Required variable 'port' is missing"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn existing_directory_wins_over_incomplete_variables() {
        let mut fs = MockFilesystem::new();
        fs.expect_exists()
            .withf(|p| p == Path::new("/srv/lobby"))
            .returning(|_| true);
        fs.expect_create_dir_all().times(0);
        let service = ProvisionService::new(repo(), Box::new(MockFileRenderer::new()), Box::new(fs));

        let err = service
            .create_instance(&template(), "lobby", Path::new("/srv"), Variables::new())
            .unwrap_err();
        assert!(matches!(
            err,
            DotworkError::Application(ApplicationError::InstanceExists { .. })
        ));
    }

    #[test]
    fn cancelling_from_progress_skips_the_announced_instance() {
        let service = ProvisionService::new(
            repo(),
            Box::new(MockFileRenderer::new()),
            Box::new(MockFilesystem::new()),
        );

        let cancel = CancellationToken::new();
        let report = service.update_all(vec![instance(), instance()], false, &cancel, |_| {
            cancel.cancel()
        });

        assert!(report.cancelled);
        assert_eq!(report.updated, 0);
        assert!(report.results.is_empty());
        assert_eq!(report.not_processed(), 2);
    }

    #[test]
    fn variables_used_only_lists_referenced_names() {
        let vars = Variables::from([
            ("port".to_string(), json!(1)),
            ("motd".to_string(), json!("x")),
        ]);
        let outcome = RenderOutcome::Rendered {
            placeholders: ["motd".to_string()].into(),
        };
        let used = variables_used(&outcome, &vars);
        assert_eq!(used.len(), 1);
        assert!(used.contains_key("motd"));
        assert!(variables_used(&RenderOutcome::Binary, &vars).is_empty());
    }
}
