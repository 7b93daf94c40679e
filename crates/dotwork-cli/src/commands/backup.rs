//! `dotwork backup`: create, list, restore and delete instance archives.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::instrument;

use dotwork_adapters::ZipBackupStore;
use dotwork_core::{
    application::{BackupStore, ProvisionOptions},
    domain::BackupInfo,
};

use crate::{
    cli::BackupCommands,
    config::AppConfig,
    error::CliResult,
    output::OutputManager,
};

use super::{backup_store, provision_service};

/// Dispatch to the correct backup subcommand.
pub fn execute(cmd: BackupCommands, config: AppConfig, output: OutputManager) -> CliResult<()> {
    let store = backup_store(&config);
    match cmd {
        BackupCommands::Create { path, description } => {
            create(&path, &description, &config, &store, &output)
        }
        BackupCommands::List { instance } => list(instance.as_deref(), &store, &output),
        BackupCommands::Restore { archive, to } => restore(&archive, to, &store, &output),
        BackupCommands::Delete { archive } => {
            store.delete_backup(&archive)?;
            output.success(&format!("Deleted {}", archive.display()))?;
            Ok(())
        }
    }
}

#[instrument(skip_all, fields(path = %path.display()))]
fn create(
    path: &Path,
    description: &str,
    config: &AppConfig,
    store: &ZipBackupStore,
    output: &OutputManager,
) -> CliResult<()> {
    let instance = provision_service(config, ProvisionOptions::default()).require_instance(path)?;
    let archive = store.create_backup(&instance, description)?;

    if output.is_json() {
        output.json(&serde_json::json!({ "archive": archive }))?;
    } else {
        output.success(&format!(
            "Backed up '{}' to {}",
            instance.name,
            archive.display()
        ))?;
    }
    Ok(())
}

#[derive(Serialize)]
struct Listing<'a> {
    backups: &'a [BackupInfo],
    total_size: u64,
}

fn list(instance: Option<&str>, store: &ZipBackupStore, output: &OutputManager) -> CliResult<()> {
    let backups = match instance {
        Some(name) => store.list_backups_for(name)?,
        None => store.list_backups()?,
    };
    let total_size = backups.iter().map(|b| b.size).sum();

    if output.is_json() {
        output.json(&Listing {
            backups: &backups,
            total_size,
        })?;
        return Ok(());
    }

    if backups.is_empty() {
        output.info(&format!("No backups in {}", store.backup_dir().display()))?;
        return Ok(());
    }

    output.header(&format!("Backups ({})", backups.len()))?;
    for backup in &backups {
        let owner = backup.instance_name().unwrap_or_else(|| "?".into());
        let note = backup
            .manifest
            .as_ref()
            .map(|m| m.description.as_str())
            .filter(|d| !d.is_empty())
            .map(|d| format!("  \"{d}\""))
            .unwrap_or_default();
        output.print(&format!(
            "  {:<20} {}  {:>10}  {}{note}",
            owner,
            backup.created.format("%Y-%m-%d %H:%M:%S"),
            human_size(backup.size),
            backup.file_name,
        ))?;
    }
    output.print(&format!("  total {}", human_size(total_size)))?;
    Ok(())
}

#[instrument(skip(store, output))]
fn restore(
    archive: &Path,
    to: Option<PathBuf>,
    store: &ZipBackupStore,
    output: &OutputManager,
) -> CliResult<()> {
    let instance = match to {
        Some(dest) => store.restore_backup(archive, &dest)?,
        None => store.restore_in_place(archive)?,
    };

    if output.is_json() {
        output.json(&instance)?;
    } else {
        output.success(&format!(
            "Restored '{}' ({}) to {}",
            instance.name,
            instance.template_name,
            instance.path.display()
        ))?;
    }
    Ok(())
}

fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.1} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_are_human_readable() {
        assert_eq!(human_size(512), "512 B");
        assert_eq!(human_size(2048), "2.0 KiB");
        assert_eq!(human_size(5 * 1024 * 1024 + 1024 * 512), "5.5 MiB");
    }
}
