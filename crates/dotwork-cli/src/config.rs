//! Application configuration.
//!
//! [`AppConfig`] is loaded once at startup and passed down by value. The
//! CLI layer owns config; the core crate only ever sees the
//! [`ProvisionOptions`](dotwork_core::application::ProvisionOptions) and
//! directories derived from it.
//!
//! # Resolution order (highest priority first)
//!
//! 1. CLI flags (handled at the call-site, not here)
//! 2. Environment variables prefixed `DOTWORK_` (`DOTWORK_MAX_BACKUPS=10`)
//! 3. Config file: `--config FILE`, else `./dotwork.yml`, else the platform
//!    config directory
//! 4. Built-in defaults (always present)

use std::{
    fs,
    path::{Path, PathBuf},
};

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::{CliError, CliResult, IntoCli};

/// Config file picked up from the working directory when `--config` is absent.
pub const LOCAL_CONFIG_FILE: &str = "dotwork.yml";

const ENV_PREFIX: &str = "DOTWORK";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Where template directories are discovered.
    pub templates_dir: PathBuf,
    /// Default search directory for `instances list` and `update-all`.
    pub instances_dir: PathBuf,
    /// Parent directory for `dotwork new` without `--output`.
    pub default_output_dir: PathBuf,
    /// Archive an instance before every non-dry-run update.
    pub auto_backup: bool,
    pub backup_dir: PathBuf,
    /// Archives kept per instance.
    pub max_backups: usize,
    /// Log level used when no `-v`/`-q` flag is given.
    pub log_level: String,
    pub log_to_file: bool,
    pub log_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            templates_dir: PathBuf::from("templates"),
            instances_dir: PathBuf::from("instances"),
            default_output_dir: PathBuf::from("instances"),
            auto_backup: true,
            backup_dir: PathBuf::from("backups"),
            max_backups: 5,
            log_level: "info".into(),
            log_to_file: false,
            log_dir: PathBuf::from("logs"),
        }
    }
}

impl AppConfig {
    /// Load and validate the layered configuration.
    ///
    /// An explicit `config_file` must exist; the implicit locations are
    /// optional.
    pub fn load(config_file: Option<&Path>) -> CliResult<Self> {
        let defaults = Config::try_from(&Self::default()).map_err(config_error)?;
        let mut builder = Config::builder().add_source(defaults);

        match config_file {
            Some(path) => {
                if !path.is_file() {
                    return Err(CliError::ConfigError {
                        message: format!("config file not found: {}", path.display()),
                        source: None,
                    });
                }
                builder = builder.add_source(File::from(path).required(true));
            }
            None => {
                if let Some(path) = Self::discovered_file() {
                    builder = builder.add_source(File::from(path.as_path()).required(false));
                }
            }
        }

        let config = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .and_then(|c| c.try_deserialize::<Self>())
            .map_err(config_error)?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values the rest of the program cannot work with.
    pub fn validate(&self) -> CliResult<()> {
        if self.max_backups < 1 {
            return Err(CliError::ConfigError {
                message: "max_backups must be at least 1".into(),
                source: None,
            });
        }
        if !LOG_LEVELS.contains(&self.log_level.to_ascii_lowercase().as_str()) {
            return Err(CliError::ConfigError {
                message: format!(
                    "log_level '{}' is not one of {}",
                    self.log_level,
                    LOG_LEVELS.join(", ")
                ),
                source: None,
            });
        }
        Ok(())
    }

    /// Create the templates, instances, output and backup directories.
    pub fn ensure_directories(&self) -> CliResult<()> {
        for dir in [
            &self.templates_dir,
            &self.instances_dir,
            &self.default_output_dir,
            &self.backup_dir,
        ] {
            fs::create_dir_all(dir)
                .with_cli_context(|| format!("failed to create {}", dir.display()))?;
        }
        Ok(())
    }

    /// Write the configuration, serialised according to the file extension
    /// (`.toml`, `.json`, anything else as YAML).
    pub fn save(&self, path: &Path) -> CliResult<()> {
        let rendered = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::to_string_pretty(self).map_err(config_error)?,
            Some("json") => serde_json::to_string_pretty(self).map_err(config_error)?,
            _ => serde_yaml::to_string(self).map_err(config_error)?,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_cli_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(path, rendered)
            .with_cli_context(|| format!("failed to write {}", path.display()))
    }

    /// Value of one top-level key, rendered as text.
    pub fn get(&self, key: &str) -> CliResult<String> {
        let value = serde_json::to_value(self).map_err(config_error)?;
        match value.get(key) {
            Some(serde_json::Value::String(s)) => Ok(s.clone()),
            Some(other) => Ok(other.to_string()),
            None => Err(CliError::ConfigError {
                message: format!("Unknown config key: '{key}'"),
                source: None,
            }),
        }
    }

    /// The file that `load` reads (or would read) for the given `--config`.
    pub fn active_path(config_file: Option<&Path>) -> PathBuf {
        config_file
            .map(Path::to_path_buf)
            .or_else(Self::discovered_file)
            .unwrap_or_else(Self::config_path)
    }

    /// Path to the per-user configuration file.
    ///
    /// Uses `directories::ProjectDirs` for cross-platform correctness,
    /// falling back to `./dotwork.yml`.
    pub fn config_path() -> PathBuf {
        directories::ProjectDirs::from("com", "dotwork", "dotwork")
            .map(|d| d.config_dir().join("config.yml"))
            .unwrap_or_else(|| PathBuf::from(LOCAL_CONFIG_FILE))
    }

    fn discovered_file() -> Option<PathBuf> {
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.is_file() {
            return Some(local);
        }
        let user = Self::config_path();
        user.is_file().then_some(user)
    }
}

fn config_error<E>(err: E) -> CliError
where
    E: std::error::Error + Send + Sync + 'static,
{
    CliError::ConfigError {
        message: err.to_string(),
        source: Some(Box::new(err)),
    }
}
