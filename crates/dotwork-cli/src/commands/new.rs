//! Implementation of the `dotwork new` command.
//!
//! Responsibility: turn `--var` arguments (and, on a terminal, prompt
//! answers) into a variable mapping, call the provisioning service, and
//! display the result. No business logic lives here.

use serde::Serialize;
use tracing::{debug, info, instrument};

use dotwork_core::{
    application::ProvisionOptions,
    domain::{ServerInstance, StatusCounts, Template, Variables, display_value},
};

use crate::{
    cli::NewArgs,
    config::AppConfig,
    error::CliResult,
    output::OutputManager,
};

use super::provision_service;

/// Execute the `dotwork new` command.
///
/// 1. Resolve the template
/// 2. Coerce `--var` values by their declared type and merge defaults
/// 3. Prompt for still-missing required variables (terminal only, no `--yes`)
/// 4. Create the instance; validation errors come back all at once
#[instrument(skip_all, fields(template = %args.template, instance = %args.name))]
pub fn execute(args: NewArgs, config: AppConfig, output: OutputManager) -> CliResult<()> {
    let service = provision_service(
        &config,
        ProvisionOptions {
            auto_backup: config.auto_backup,
            ..ProvisionOptions::default()
        },
    );
    let template = service.find_template(&args.template)?;

    let supplied = parse_vars(&template, &args.vars, &output)?;
    let mut variables = template.with_defaults(&supplied);

    if !args.yes && output.is_interactive() {
        prompt_missing(&template, &mut variables, &output)?;
    }

    let output_dir = args.output.unwrap_or_else(|| config.default_output_dir.clone());
    debug!(output_dir = %output_dir.display(), variables = variables.len(), "Creating instance");

    let (instance, result) =
        service.create_instance_with_report(&template, &args.name, &output_dir, variables)?;
    info!(path = %instance.path.display(), "Instance created");

    let report = NewReport {
        instance: &instance,
        files: result.counts(),
    };
    if output.is_json() {
        output.json(&report)?;
        return Ok(());
    }

    output.success(&format!(
        "Created '{}' from {} {} ({} files)",
        instance.name, template.name, template.version, report.files.created
    ))?;
    output.print(&format!("  Location: {}", instance.path.display()))?;
    for (name, value) in &instance.variables {
        output.print(&format!("  {name} = {}", display_value(value)))?;
    }
    Ok(())
}

#[derive(Serialize)]
struct NewReport<'a> {
    instance: &'a ServerInstance,
    files: StatusCounts,
}

/// Typed values for `--var` arguments. Unknown names are passed through as
/// strings so undeclared placeholders can still be filled.
fn parse_vars(
    template: &Template,
    raw: &[(String, String)],
    output: &OutputManager,
) -> CliResult<Variables> {
    let mut vars = Variables::new();
    for (name, value) in raw {
        let coerced = match template.variable(name) {
            Some(declared) => declared.kind.coerce(value),
            None => {
                output.warning(&format!(
                    "'{name}' is not declared by {}; passing it through as text",
                    template.name
                ))?;
                serde_json::Value::String(value.clone())
            }
        };
        vars.insert(name.clone(), coerced);
    }
    Ok(vars)
}

/// Required variables that neither `--var` nor a default supplied.
fn missing_required<'t>(template: &'t Template, variables: &Variables) -> Vec<&'t str> {
    template
        .required_variables()
        .filter(|v| !variables.contains_key(&v.name))
        .map(|v| v.name.as_str())
        .collect()
}

#[cfg(feature = "interactive")]
fn prompt_missing(
    template: &Template,
    variables: &mut Variables,
    output: &OutputManager,
) -> CliResult<()> {
    use dialoguer::{Confirm, FuzzySelect, Input};
    use dotwork_core::domain::VariableKind;

    use crate::error::CliError;

    let missing = missing_required(template, variables);
    if missing.is_empty() {
        return Ok(());
    }
    output.header(&format!("{} needs {} more value(s)", template.name, missing.len()))?;

    let prompt_failed = |e: dialoguer::Error| CliError::InvalidInput {
        message: "failed to read variable value".into(),
        source: Some(Box::new(e)),
    };

    for name in missing {
        let Some(var) = template.variable(name) else {
            continue;
        };
        let prompt = if var.description.is_empty() {
            format!("{} ({})", var.name, var.kind)
        } else {
            format!("{} ({}): {}", var.name, var.kind, var.description)
        };

        let value = match var.kind {
            VariableKind::Boolean => Confirm::new()
                .with_prompt(prompt)
                .interact()
                .map(serde_json::Value::Bool)
                .map_err(prompt_failed)?,
            VariableKind::Choice if !var.choices().is_empty() => {
                let choices = var.choices();
                let picked = FuzzySelect::new()
                    .with_prompt(prompt)
                    .items(&choices)
                    .default(0)
                    .interact()
                    .map_err(prompt_failed)?;
                serde_json::Value::String(choices.get(picked).cloned().unwrap_or_default())
            }
            _ => {
                let raw: String = Input::new()
                    .with_prompt(prompt)
                    .interact_text()
                    .map_err(prompt_failed)?;
                var.kind.coerce(&raw)
            }
        };
        variables.insert(var.name.clone(), value);
    }
    Ok(())
}

#[cfg(not(feature = "interactive"))]
fn prompt_missing(
    template: &Template,
    variables: &mut Variables,
    output: &OutputManager,
) -> CliResult<()> {
    let missing = missing_required(template, variables);
    if !missing.is_empty() {
        output.info(&format!(
            "Interactive prompts are not built in; pass {} with --var",
            missing.join(", ")
        ))?;
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
