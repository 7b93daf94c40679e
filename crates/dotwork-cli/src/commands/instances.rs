//! `dotwork instances`: list and delete managed instances.

use std::path::Path;

use serde::Serialize;
use tracing::{info, instrument};

use dotwork_core::{
    application::{ProvisionOptions, ProvisionService},
    domain::{ServerInstance, group_by_template},
};

use crate::{
    cli::InstancesCommands,
    config::AppConfig,
    error::{CliError, CliResult},
    output::OutputManager,
};

use super::{confirm, provision_service, search_dirs};

/// Dispatch to the correct instances subcommand.
pub fn execute(cmd: InstancesCommands, config: AppConfig, output: OutputManager) -> CliResult<()> {
    let service = provision_service(&config, ProvisionOptions::default());
    match cmd {
        InstancesCommands::List { dirs } => {
            let instances = service.find_instances(&search_dirs(dirs, &config));
            list(&instances, &output)
        }
        InstancesCommands::Delete { path, yes } => delete(&service, &path, yes, &output),
    }
}

#[derive(Serialize)]
struct InstanceRow<'a> {
    name: &'a str,
    template: &'a str,
    path: &'a Path,
    version: &'a str,
    updated_at: String,
}

impl<'a> From<&'a ServerInstance> for InstanceRow<'a> {
    fn from(instance: &'a ServerInstance) -> Self {
        Self {
            name: &instance.name,
            template: &instance.template_name,
            path: &instance.path,
            version: &instance.version,
            updated_at: instance.updated_at.format("%Y-%m-%d %H:%M").to_string(),
        }
    }
}

fn list(instances: &[ServerInstance], output: &OutputManager) -> CliResult<()> {
    if output.is_json() {
        let rows: Vec<InstanceRow<'_>> = instances.iter().map(InstanceRow::from).collect();
        output.json(&rows)?;
        return Ok(());
    }

    if instances.is_empty() {
        output.info("No managed instances found")?;
        return Ok(());
    }

    output.header(&format!("Instances ({})", instances.len()))?;
    for (template, group) in group_by_template(instances) {
        output.print(&format!("  {template}"))?;
        for instance in group {
            let row = InstanceRow::from(instance);
            output.print(&format!(
                "    {:<20} {:<16} {}",
                row.name,
                row.updated_at,
                row.path.display()
            ))?;
        }
    }
    Ok(())
}

#[instrument(skip(service, output))]
fn delete(service: &ProvisionService, path: &Path, yes: bool, output: &OutputManager) -> CliResult<()> {
    let instance = service.require_instance(path)?;

    if !yes {
        let question = format!(
            "Delete '{}' ({}) and everything in {}?",
            instance.name,
            instance.template_name,
            instance.path.display()
        );
        if !output.is_interactive() {
            return Err(CliError::invalid(
                "refusing to delete without confirmation; pass --yes",
            ));
        }
        if !confirm(output, &question, false)? {
            return Err(CliError::Cancelled);
        }
    }

    service.delete_instance(&instance)?;
    info!(instance = %instance.name, "Deleted");
    output.success(&format!("Deleted '{}'", instance.name))?;
    Ok(())
}
