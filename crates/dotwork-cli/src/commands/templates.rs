//! `dotwork templates`: list, show and inspect the template library.

use std::{
    collections::{BTreeMap, BTreeSet},
    path::PathBuf,
};

use serde::Serialize;
use tracing::instrument;

use dotwork_adapters::renderer::find_all_placeholders;
use dotwork_core::domain::{Template, display_value};

use crate::{
    cli::{ListFormat, TemplatesCommands},
    config::AppConfig,
    error::CliResult,
    output::OutputManager,
};

use super::template_service;

/// Dispatch to the correct templates subcommand.
pub fn execute(cmd: TemplatesCommands, config: AppConfig, output: OutputManager) -> CliResult<()> {
    match cmd {
        TemplatesCommands::List { format } => list(format, &config, &output),
        TemplatesCommands::Show { name } => show(&name, &config, &output),
        TemplatesCommands::Inspect { name } => inspect(&name, &config, &output),
    }
}

#[instrument(skip_all, fields(dir = %config.templates_dir.display()))]
fn list(format: ListFormat, config: &AppConfig, output: &OutputManager) -> CliResult<()> {
    let templates = template_service(config).list()?;

    if format == ListFormat::Json || output.is_json() {
        output.json(&templates)?;
        return Ok(());
    }

    if templates.is_empty() {
        output.warning(&format!(
            "No templates found in {}",
            config.templates_dir.display()
        ))?;
        output.info("A template is a directory with an optional template.yml descriptor")?;
        return Ok(());
    }

    output.header(&format!("Templates ({})", templates.len()))?;
    output.print(&format!(
        "  {:<24} {:<10} {:>9}  {}",
        "NAME", "VERSION", "VARIABLES", "DESCRIPTION"
    ))?;
    for t in &templates {
        output.print(&format!(
            "  {:<24} {:<10} {:>4} ({:>2})  {}",
            t.name, t.version, t.variable_count, t.required_count, t.description
        ))?;
    }
    output.print("")?;
    output.info("Counts are total (required). Details: dotwork templates show NAME")?;
    Ok(())
}

fn show(name: &str, config: &AppConfig, output: &OutputManager) -> CliResult<()> {
    let template = template_service(config).get(name)?;

    if output.is_json() {
        output.json(&template)?;
        return Ok(());
    }

    output.header(&format!("{} {}", template.name, template.version))?;
    if !template.description.is_empty() {
        output.print(&format!("  {}", template.description))?;
    }
    output.print(&format!("  Location: {}", template.path.display()))?;
    output.print("")?;

    if template.variables.is_empty() {
        output.info("This template declares no variables")?;
        return Ok(());
    }

    output.header("Variables")?;
    for var in &template.variables {
        let default = var
            .default_value
            .as_ref()
            .map(|v| format!(" = {}", display_value(v)))
            .unwrap_or_default();
        let required = if var.required { "required" } else { "optional" };
        output.print(&format!("  {} ({}, {required}){default}", var.name, var.kind))?;
        if !var.description.is_empty() {
            output.print(&format!("      {}", var.description))?;
        }
        let choices = var.choices();
        if !choices.is_empty() {
            output.print(&format!("      one of: {}", choices.join(", ")))?;
        }
    }
    Ok(())
}

/// Declared variables versus the placeholders the files actually use.
#[derive(Debug, Serialize)]
struct InspectReport {
    template: String,
    declared: BTreeSet<String>,
    referenced: BTreeSet<String>,
    /// Referenced by files but missing from the descriptor.
    undeclared: BTreeSet<String>,
    /// Declared but never referenced.
    unused: BTreeSet<String>,
    files: BTreeMap<PathBuf, BTreeSet<String>>,
}

impl InspectReport {
    fn build(template: &Template) -> Self {
        let files: BTreeMap<_, _> = find_all_placeholders(&template.path)
            .into_iter()
            .filter(|(path, _)| !Template::is_excluded(path))
            .collect();
        let declared: BTreeSet<String> = template.variables.iter().map(|v| v.name.clone()).collect();
        let referenced: BTreeSet<String> = files.values().flatten().cloned().collect();

        Self {
            template: template.name.clone(),
            undeclared: referenced.difference(&declared).cloned().collect(),
            unused: declared.difference(&referenced).cloned().collect(),
            declared,
            referenced,
            files,
        }
    }
}

#[instrument(skip(config, output))]
fn inspect(name: &str, config: &AppConfig, output: &OutputManager) -> CliResult<()> {
    let template = template_service(config).get(name)?;
    let report = InspectReport::build(&template);

    if output.is_json() {
        output.json(&report)?;
        return Ok(());
    }

    output.header(&format!("Placeholders in {}", report.template))?;
    if report.files.is_empty() {
        output.info("No file contains a placeholder; every file is copied verbatim")?;
    }
    for (path, names) in &report.files {
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        output.print(&format!("  {}: {}", path.display(), names.join(", ")))?;
    }
    output.print("")?;

    if report.undeclared.is_empty() && report.unused.is_empty() {
        output.success("Descriptor and files agree")?;
        return Ok(());
    }
    for name in &report.undeclared {
        output.warning(&format!(
            "'{name}' is used but not declared; files using it are copied unrendered unless it is supplied"
        ))?;
    }
    for name in &report.unused {
        output.info(&format!("'{name}' is declared but no file uses it"))?;
    }
    Ok(())
}
