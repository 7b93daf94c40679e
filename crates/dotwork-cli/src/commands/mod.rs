//! Command handlers.
//!
//! Each submodule turns parsed arguments into calls on the core services and
//! renders the outcome. The adapter wiring shared by all of them lives here.

use std::path::PathBuf;

use dotwork_adapters::{FilesystemTemplateLoader, LocalFilesystem, ZipBackupStore, TeraRenderer};
use dotwork_core::application::{ProvisionOptions, ProvisionService, TemplateService};

use crate::{config::AppConfig, error::CliResult, output::OutputManager};

pub mod backup;
pub mod completions;
pub mod config;
pub mod instances;
pub mod new;
pub mod templates;
pub mod update;

/// Template listing service over the configured templates directory.
pub(crate) fn template_service(config: &AppConfig) -> TemplateService {
    TemplateService::new(Box::new(FilesystemTemplateLoader::new(&config.templates_dir)))
}

/// Backup store over the configured backup directory.
pub(crate) fn backup_store(config: &AppConfig) -> ZipBackupStore {
    ZipBackupStore::new(&config.backup_dir, config.max_backups)
        .with_instances_dir(&config.instances_dir)
}

/// Provisioning engine wired with the local adapters.
pub(crate) fn provision_service(config: &AppConfig, options: ProvisionOptions) -> ProvisionService {
    ProvisionService::new(
        Box::new(FilesystemTemplateLoader::new(&config.templates_dir)),
        Box::new(TeraRenderer::new()),
        Box::new(LocalFilesystem::new()),
    )
    .with_backups(Box::new(backup_store(config)))
    .with_options(options)
}

/// `--dir` values, or the configured instances directory when none were given.
pub(crate) fn search_dirs(dirs: Vec<PathBuf>, config: &AppConfig) -> Vec<PathBuf> {
    if dirs.is_empty() {
        vec![config.instances_dir.clone()]
    } else {
        dirs
    }
}

/// Ask a yes/no question. Non-interactive sessions get `default`.
pub(crate) fn confirm(output: &OutputManager, prompt: &str, default: bool) -> CliResult<bool> {
    if !output.is_interactive() {
        return Ok(default);
    }
    ask(prompt, default)
}

#[cfg(feature = "interactive")]
fn ask(prompt: &str, default: bool) -> CliResult<bool> {
    dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(default)
        .interact()
        .map_err(|e| crate::error::CliError::InvalidInput {
            message: "failed to read confirmation".into(),
            source: Some(Box::new(e)),
        })
}

#[cfg(not(feature = "interactive"))]
fn ask(prompt: &str, default: bool) -> CliResult<bool> {
    use std::io::{self, Write};

    use crate::error::IntoCli;

    let hint = if default { "[Y/n]" } else { "[y/N]" };
    print!("{prompt} {hint} ");
    io::stdout()
        .flush()
        .with_cli_context(|| "failed to flush stdout")?;

    let mut input = String::new();
    io::stdin()
        .read_line(&mut input)
        .with_cli_context(|| "failed to read confirmation input")?;

    Ok(match input.trim().to_ascii_lowercase().as_str() {
        "" => default,
        answer => answer == "y" || answer == "yes",
    })
}
