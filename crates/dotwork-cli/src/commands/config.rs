//! `dotwork config`: create and read configuration.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use crate::{
    cli::ConfigCommands,
    config::{AppConfig, LOCAL_CONFIG_FILE},
    error::{CliError, CliResult},
    output::OutputManager,
};

/// Dispatch to the correct config subcommand.
///
/// `config_file` is the `--config` flag, if any.
pub fn execute(
    cmd: ConfigCommands,
    config_file: Option<&Path>,
    config: AppConfig,
    output: OutputManager,
) -> CliResult<()> {
    match cmd {
        ConfigCommands::Init { force } => {
            let path = init_target(config_file);
            init(&path, force)?;
            output.success(&format!("Wrote default configuration to {}", path.display()))?;
            output.info("Created the templates, instances and backups directories")?;
        }

        ConfigCommands::Show => {
            if output.is_json() {
                output.json(&config)?;
            } else {
                let rendered = serde_yaml::to_string(&config).map_err(|e| CliError::ConfigError {
                    message: format!("Failed to serialise config: {e}"),
                    source: Some(Box::new(e)),
                })?;
                output.header("Effective configuration:")?;
                output.print(rendered.trim_end())?;
            }
        }

        ConfigCommands::Get { key } => {
            let value = config.get(&key)?;
            if output.is_json() {
                output.json(&BTreeMap::from([(key, value)]))?;
            } else {
                output.print(&value)?;
            }
        }

        ConfigCommands::Path => {
            output.print(&AppConfig::active_path(config_file).display().to_string())?;
        }
    }

    Ok(())
}

/// `--config` when given, else `./dotwork.yml`.
fn init_target(config_file: Option<&Path>) -> PathBuf {
    config_file
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(LOCAL_CONFIG_FILE))
}

/// Write the defaults to `path` and create the default directories.
fn init(path: &Path, force: bool) -> CliResult<()> {
    if path.exists() && !force {
        return Err(CliError::invalid(format!(
            "{} already exists; pass --force to overwrite it",
            path.display()
        )));
    }
    let config = AppConfig::default();
    config.save(path)?;
    config.ensure_directories()
}
