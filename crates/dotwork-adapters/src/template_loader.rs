//! Filesystem-based template loader.
//!
//! Discovers template directories and parses their `template.yml`
//! descriptors into domain [`Template`] objects.
//!
//! # Directory layout expected
//!
//! ```text
//! templates/
//! ├── minecraft-paper/
//! │   ├── template.yml         ← descriptor (optional)
//! │   ├── server.properties
//! │   └── plugins/
//! └── velocity-proxy/
//!     └── velocity.toml        ← no descriptor: name = directory name
//! ```
//!
//! # `template.yml` format
//!
//! ```yaml
//! name: minecraft-paper          # default: directory name
//! description: Paper server      # default: empty
//! version: 1.2.0                 # default: 1.0.0
//! variables:
//!   - name: port                 # required
//!     type: port                 # string | int | port | boolean | choice
//!     description: Server port
//!     default: 25565
//!     required: true             # default: true
//!   - name: gamemode
//!     type: choice
//!     validation: survival|creative|adventure
//! ```
//!
//! `template.yml` wins over `template.yaml` when both are present.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Deserializer};
use tracing::{debug, instrument, warn};

use dotwork_core::{
    application::ports::TemplateRepository,
    domain::{
        DESCRIPTOR_FILE_NAMES, DomainError, Template, TemplateVariable, VariableKind,
    },
    error::{DotworkError, DotworkResult},
};

// ── Descriptor schema (serde) ─────────────────────────────────────────────────

/// Top-level structure of a `template.yml` file.
#[derive(Debug, Default, Deserialize)]
pub struct TemplateDescriptor {
    #[serde(default, deserialize_with = "scalar_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "scalar_string")]
    pub description: Option<String>,
    /// YAML reads `version: 1.2` as a float; any scalar is accepted.
    #[serde(default, deserialize_with = "scalar_string")]
    pub version: Option<String>,
    #[serde(default)]
    pub variables: Vec<VariableEntry>,
}

/// One entry under `variables:`.
#[derive(Debug, Deserialize)]
pub struct VariableEntry {
    #[serde(deserialize_with = "required_scalar_string")]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "scalar_string")]
    pub description: Option<String>,
    #[serde(default)]
    pub default: Option<serde_json::Value>,
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default, deserialize_with = "scalar_string")]
    pub validation: Option<String>,
}

impl VariableEntry {
    fn into_variable(self) -> TemplateVariable {
        let kind = self
            .kind
            .as_deref()
            .map(|k| k.parse::<VariableKind>().unwrap_or_default())
            .unwrap_or_default();

        let mut var = TemplateVariable::new(self.name, kind)
            .with_description(self.description.unwrap_or_default());
        if let Some(default) = self.default.filter(|v| !v.is_null()) {
            var = var.with_default(default);
        }
        if let Some(rule) = self.validation {
            var = var.with_validation(rule);
        }
        if self.required == Some(false) {
            var = var.optional();
        }
        var
    }
}

/// Accept strings, numbers and booleans where a string is expected.
fn scalar_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    use serde::de::Error;
    match serde_yaml::Value::deserialize(d)? {
        serde_yaml::Value::Null => Ok(None),
        serde_yaml::Value::String(s) => Ok(Some(s)),
        serde_yaml::Value::Number(n) => Ok(Some(n.to_string())),
        serde_yaml::Value::Bool(b) => Ok(Some(b.to_string())),
        other => Err(D::Error::custom(format!("expected a scalar, found {other:?}"))),
    }
}

fn required_scalar_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    use serde::de::Error;
    scalar_string(d)?.ok_or_else(|| D::Error::custom("value cannot be null"))
}

// ── Loader ────────────────────────────────────────────────────────────────────

/// Loads [`Template`] objects from the immediate subdirectories of a root.
///
/// Subdirectories whose descriptor is unreadable or invalid emit a `WARN`
/// log and are skipped; they do not prevent other templates from loading.
///
/// # Example
///
/// ```no_run
/// use dotwork_adapters::template_loader::FilesystemTemplateLoader;
///
/// let loader = FilesystemTemplateLoader::new("./templates");
/// let templates = loader.load_all()?;
/// println!("Loaded {} templates", templates.len());
/// # Ok::<(), dotwork_core::error::DotworkError>(())
/// ```
#[derive(Debug, Clone)]
pub struct FilesystemTemplateLoader {
    templates_dir: PathBuf,
}

impl FilesystemTemplateLoader {
    /// Create a loader pointed at `templates_dir`.
    ///
    /// The directory does not need to exist yet; [`Self::load_all`] creates
    /// it and reports no templates.
    pub fn new(templates_dir: impl Into<PathBuf>) -> Self {
        Self {
            templates_dir: templates_dir.into(),
        }
    }

    pub fn templates_dir(&self) -> &Path {
        &self.templates_dir
    }

    /// Load every valid template, in directory-name order.
    ///
    /// # Errors
    ///
    /// Only when the root itself cannot be created or listed.
    #[instrument(skip(self), fields(dir = %self.templates_dir.display()))]
    pub fn load_all(&self) -> DotworkResult<Vec<Template>> {
        if !self.templates_dir.exists() {
            fs::create_dir_all(&self.templates_dir).map_err(|e| {
                DotworkError::filesystem(
                    &self.templates_dir,
                    format!("Failed to create templates directory: {e}"),
                )
            })?;
            debug!("created empty templates directory");
            return Ok(Vec::new());
        }

        let read_dir = fs::read_dir(&self.templates_dir).map_err(|e| {
            DotworkError::filesystem(
                &self.templates_dir,
                format!("Failed to read templates directory: {e}"),
            )
        })?;

        let mut dirs: Vec<PathBuf> = read_dir
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_dir()) // Only process subdirectories.
            .collect();
        dirs.sort();

        let mut templates = Vec::new();
        for path in dirs {
            match load_template_from_dir(&path) {
                Ok(template) => {
                    debug!(
                        name    = %template.name,
                        version = %template.version,
                        "loaded template"
                    );
                    templates.push(template);
                }
                Err(e) => {
                    // One bad template must not block all others.
                    warn!(
                        dir   = %path.display(),
                        error = %e,
                        "skipping template directory due to load error"
                    );
                }
            }
        }

        debug!(count = templates.len(), "finished loading templates");
        Ok(templates)
    }
}

impl TemplateRepository for FilesystemTemplateLoader {
    fn discover(&self) -> DotworkResult<Vec<Template>> {
        self.load_all()
    }
}

/// The descriptor file of a template directory, if any.
pub fn descriptor_path(dir: &Path) -> Option<PathBuf> {
    DESCRIPTOR_FILE_NAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

/// Load a single template from one directory.
///
/// A directory without a descriptor yields a template named after the
/// directory with no variables.
#[instrument(fields(dir = %dir.display()))]
pub fn load_template_from_dir(dir: &Path) -> Result<Template, DomainError> {
    let dir_name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| {
            DomainError::InvalidTemplate(format!("'{}' has no directory name", dir.display()))
        })?;

    let Some(descriptor_path) = descriptor_path(dir) else {
        debug!("no descriptor, using defaults");
        return Template::builder()
            .name(&dir_name)
            .path(dir)
            .description(format!("Template for {dir_name}"))
            .build();
    };

    let raw = fs::read_to_string(&descriptor_path).map_err(|e| {
        DomainError::InvalidTemplate(format!(
            "failed to read '{}': {e}",
            descriptor_path.display()
        ))
    })?;

    let descriptor = parse_descriptor(&raw).map_err(|e| {
        DomainError::InvalidTemplate(format!(
            "failed to parse '{}': {e}",
            descriptor_path.display()
        ))
    })?;

    let mut builder = Template::builder()
        .name(descriptor.name.unwrap_or(dir_name))
        .path(dir)
        .description(descriptor.description.unwrap_or_default())
        .variables(
            descriptor
                .variables
                .into_iter()
                .map(VariableEntry::into_variable),
        );
    if let Some(version) = descriptor.version {
        builder = builder.version(version);
    }
    builder.build()
}

/// Parse descriptor text. Blank (or comment-only) text is an empty descriptor.
pub fn parse_descriptor(raw: &str) -> Result<TemplateDescriptor, serde_yaml::Error> {
    match serde_yaml::from_str::<Option<TemplateDescriptor>>(raw) {
        Ok(descriptor) => Ok(descriptor.unwrap_or_default()),
        Err(_) if raw.lines().all(|l| l.trim().is_empty() || l.trim_start().starts_with('#')) => {
            Ok(TemplateDescriptor::default())
        }
        Err(e) => Err(e),
    }
}
