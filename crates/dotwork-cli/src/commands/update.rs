//! `dotwork update` and `dotwork update-all`.

use std::{
    path::Path,
    time::{Duration, Instant},
};

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, instrument, warn};

use dotwork_core::{
    application::{CancellationToken, ProvisionOptions, ReconcileMode},
    domain::{BatchReport, FileStatus, ProvisionResult, group_by_template},
};

use crate::{
    cli::{ReconcileArgs, UpdateAllArgs, UpdateArgs},
    config::AppConfig,
    error::{CliError, CliResult},
    output::OutputManager,
};

use super::{confirm, provision_service, search_dirs};

fn options(flags: ReconcileArgs, config: &AppConfig) -> ProvisionOptions {
    ProvisionOptions {
        auto_backup: config.auto_backup && !flags.no_backup,
        mode: if flags.replace {
            ReconcileMode::Replace
        } else {
            ReconcileMode::Overlay
        },
    }
}

/// Execute `dotwork update PATH`.
#[instrument(skip_all, fields(path = %args.path.display(), dry_run = args.reconcile.dry_run))]
pub fn execute(args: UpdateArgs, config: AppConfig, output: OutputManager) -> CliResult<()> {
    let service = provision_service(&config, options(args.reconcile, &config));
    let mut instance = service.require_instance(&args.path)?;
    let dry_run = args.reconcile.dry_run;

    let result = service.update_instance_from_template(&mut instance, dry_run)?;

    if output.is_json() {
        output.json(&result)?;
    } else {
        output.header(&format!(
            "{} '{}' from {} {}",
            if dry_run { "Dry run for" } else { "Updated" },
            instance.name,
            result.template.name,
            result.template.version
        ))?;
        print_files(&result, &instance.path, &output)?;
        print_counts(&result, &output)?;
    }

    let counts = result.counts();
    if counts.errors > 0 {
        return Err(CliError::PartialFailure {
            failed: counts.errors,
            total: result.processed_files.len(),
            unit: "files",
        });
    }
    Ok(())
}

/// Every file whose state differs from "unchanged", relative to the instance.
fn print_files(result: &ProvisionResult, root: &Path, output: &OutputManager) -> CliResult<()> {
    for file in result
        .processed_files
        .iter()
        .filter(|f| f.status != FileStatus::Unchanged)
    {
        let shown = file.path.strip_prefix(root).unwrap_or(&file.path);
        let line = format!("  {:<9} {} ({})", file.status, shown.display(), file.reason);
        match file.status {
            FileStatus::Error => output.error(&line)?,
            _ => output.print(&line)?,
        }
    }
    Ok(())
}

fn print_counts(result: &ProvisionResult, output: &OutputManager) -> CliResult<()> {
    let c = result.counts();
    let summary = format!(
        "{} replaced, {} unchanged, {} skipped, {} errors",
        c.replaced, c.unchanged, c.skipped, c.errors
    );
    if result.has_errors() {
        output.warning(&format!("{summary}; instance record not updated"))?;
    } else if result.is_dry_run {
        output.info(&format!("{summary}; nothing was written"))?;
    } else {
        output.success(&summary)?;
    }
    Ok(())
}

/// Execute `dotwork update-all`.
#[instrument(skip_all, fields(dry_run = args.reconcile.dry_run))]
pub fn execute_all(args: UpdateAllArgs, config: AppConfig, output: OutputManager) -> CliResult<()> {
    let service = provision_service(&config, options(args.reconcile, &config));
    let dry_run = args.reconcile.dry_run;

    let instances = service.find_instances(&search_dirs(args.dirs, &config));
    if instances.is_empty() {
        if output.is_json() {
            output.json(&BatchReport::default())?;
        } else {
            output.info("No managed instances found")?;
        }
        return Ok(());
    }

    output.header(&format!("{} instance(s) to update", instances.len()))?;
    for (template, group) in group_by_template(&instances) {
        let names: Vec<&str> = group.iter().map(|i| i.name.as_str()).collect();
        output.print(&format!("  {template}: {}", names.join(", ")))?;
    }
    if !args.yes && !dry_run && !confirm(&output, "Update these instances?", true)? {
        return Err(CliError::Cancelled);
    }

    let cancel = CancellationToken::new();
    let deadline = args.time_limit.map(|secs| Instant::now() + Duration::from_secs(secs));
    let bar = progress_bar(instances.len(), &output);

    let report = service.update_all(instances, dry_run, &cancel, |progress| {
        bar.set_position(progress.completed as u64);
        bar.set_message(progress.instance_name.clone());
        if deadline.is_some_and(|d| Instant::now() >= d) {
            cancel.cancel();
        }
    });
    bar.finish_and_clear();
    info!(updated = report.updated, failed = report.failed, "update-all finished");

    if output.is_json() {
        output.json(&report)?;
    } else {
        print_report(&report, dry_run, &output)?;
    }

    if report.failed > 0 {
        return Err(CliError::PartialFailure {
            failed: report.failed,
            total: report.total,
            unit: "instances",
        });
    }
    Ok(())
}

fn progress_bar(total: usize, output: &OutputManager) -> ProgressBar {
    if output.is_quiet() || !output.is_interactive() {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(total as u64);
    match ProgressStyle::with_template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {msg}") {
        Ok(style) => bar.set_style(style.progress_chars("=> ")),
        Err(e) => warn!(error = %e, "Falling back to the default progress style"),
    }
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

fn print_report(report: &BatchReport, dry_run: bool, output: &OutputManager) -> CliResult<()> {
    let changed: usize = report
        .results
        .iter()
        .map(|r| r.changed_files().count())
        .sum();
    let verb = if dry_run { "would change" } else { "changed" };
    output.print(&format!(
        "  {} updated, {} failed, {changed} file(s) {verb}",
        report.updated, report.failed
    ))?;

    for failure in &report.failures {
        output.error(&format!(
            "{} ({}): {}",
            failure.instance_name,
            failure.path.display(),
            failure.message
        ))?;
    }
    if report.cancelled {
        output.warning(&format!(
            "Time limit reached; {} instance(s) were not processed",
            report.not_processed()
        ))?;
    }
    if report.is_success() {
        output.success("All instances up to date")?;
    }
    Ok(())
}
