//! Template aggregate and its content tree.
//!
//! A template is a directory on disk plus a descriptor (`template.yml`).
//! The descriptor declares the variables an instance must supply; every
//! other file under the directory is content that gets copied (and
//! rendered, for text files) into instances.
//!
//! ```text
//! templates/minecraft-paper/
//! ├── template.yml          ← descriptor, never copied
//! ├── server.properties     ← "server-port={{ port }}"
//! ├── plugins/              ← mirrored, even when empty
//! └── icon.png              ← binary, copied byte-for-byte
//! ```

use crate::domain::{
    entities::common::RelativePath,
    entities::instance::METADATA_FILE_NAME,
    error::DomainError,
    value_objects::{VariableKind, Variables},
};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Descriptor file names, in lookup order. `template.yml` wins when both exist.
pub const DESCRIPTOR_FILE_NAMES: [&str; 2] = ["template.yml", "template.yaml"];

/// Version assigned to templates whose descriptor omits one.
pub const DEFAULT_TEMPLATE_VERSION: &str = "1.0.0";

// ============================================================================
// TemplateVariable
// ============================================================================

/// A variable declared by a template.
///
/// `required` defaults to `true`: a descriptor has to opt out explicitly.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateVariable {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: VariableKind,
    pub description: String,
    #[serde(rename = "default", skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    pub required: bool,
    #[serde(rename = "validation", skip_serializing_if = "Option::is_none")]
    pub validation_rule: Option<String>,
}

impl TemplateVariable {
    pub fn new(name: impl Into<String>, kind: VariableKind) -> Self {
        Self {
            name: name.into(),
            kind,
            description: String::new(),
            default_value: None,
            required: true,
            validation_rule: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn with_validation(mut self, rule: impl Into<String>) -> Self {
        self.validation_rule = Some(rule.into());
        self
    }

    /// Options offered for a `choice` variable, read from the validation rule
    /// (`"survival|creative|adventure"` or comma separated).
    pub fn choices(&self) -> Vec<String> {
        if self.kind != VariableKind::Choice {
            return Vec::new();
        }
        self.validation_rule
            .as_deref()
            .map(|rule| {
                rule.split(['|', ','])
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    }
}

// ============================================================================
// Template
// ============================================================================

/// A named, versioned directory of content plus its variable declarations.
///
/// Templates are discovered from disk and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Template {
    pub name: String,
    pub path: PathBuf,
    pub description: String,
    pub version: String,
    pub variables: Vec<TemplateVariable>,
}

impl Template {
    /// Create a builder for constructing templates.
    pub fn builder() -> TemplateBuilder {
        TemplateBuilder::default()
    }

    /// Validate template invariants: non-empty name, unique variable names.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::InvalidTemplate(
                "template name cannot be empty".into(),
            ));
        }

        let mut seen = HashSet::new();
        for var in &self.variables {
            if var.name.trim().is_empty() {
                return Err(DomainError::InvalidTemplate(format!(
                    "template '{}' declares a variable with an empty name",
                    self.name
                )));
            }
            if !seen.insert(var.name.as_str()) {
                return Err(DomainError::DuplicateVariable {
                    template: self.name.clone(),
                    variable: var.name.clone(),
                });
            }
        }

        Ok(())
    }

    /// Look up a declared variable by name.
    pub fn variable(&self, name: &str) -> Option<&TemplateVariable> {
        self.variables.iter().find(|v| v.name == name)
    }

    /// Declared variables that must be supplied.
    pub fn required_variables(&self) -> impl Iterator<Item = &TemplateVariable> {
        self.variables.iter().filter(|v| v.required)
    }

    /// Mapping of every variable that declares a default to that default.
    pub fn default_variables(&self) -> Variables {
        self.variables
            .iter()
            .filter_map(|v| v.default_value.clone().map(|d| (v.name.clone(), d)))
            .collect()
    }

    /// Fill gaps in `supplied` with declared defaults. Supplied values win.
    pub fn with_defaults(&self, supplied: &Variables) -> Variables {
        let mut merged = self.default_variables();
        merged.extend(supplied.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
    }

    /// Whether a file at `relative` (inside the template directory) is
    /// bookkeeping rather than content. Applies at any depth.
    pub fn is_excluded(relative: &Path) -> bool {
        relative
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| DESCRIPTOR_FILE_NAMES.contains(&name) || name == METADATA_FILE_NAME)
    }
}

/// Builder for [`Template`]. `build()` validates.
#[derive(Debug, Default)]
pub struct TemplateBuilder {
    name: Option<String>,
    path: Option<PathBuf>,
    description: Option<String>,
    version: Option<String>,
    variables: Vec<TemplateVariable>,
}

impl TemplateBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn variable(mut self, variable: TemplateVariable) -> Self {
        self.variables.push(variable);
        self
    }

    pub fn variables(mut self, variables: impl IntoIterator<Item = TemplateVariable>) -> Self {
        self.variables.extend(variables);
        self
    }

    pub fn build(self) -> Result<Template, DomainError> {
        let template = Template {
            name: self
                .name
                .ok_or(DomainError::MissingRequiredField { field: "name" })?,
            path: self
                .path
                .ok_or(DomainError::MissingRequiredField { field: "path" })?,
            description: self.description.unwrap_or_default(),
            version: self
                .version
                .unwrap_or_else(|| DEFAULT_TEMPLATE_VERSION.to_string()),
            variables: self.variables,
        };
        template.validate()?;
        Ok(template)
    }
}

// ============================================================================
// Template content tree
// ============================================================================

/// One entry of a template's content, relative to the template root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateNode {
    Directory(RelativePath),
    File(RelativePath),
}

impl TemplateNode {
    pub fn path(&self) -> &RelativePath {
        match self {
            Self::Directory(p) | Self::File(p) => p,
        }
    }
}

/// The content of a template in walk order: parents before children,
/// descriptor files removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateTree {
    pub nodes: Vec<TemplateNode>,
}

impl TemplateTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node unless it is an excluded bookkeeping file.
    pub fn push(&mut self, node: TemplateNode) {
        if let TemplateNode::File(path) = &node {
            if Template::is_excluded(path.as_path()) {
                return;
            }
        }
        self.nodes.push(node);
    }

    pub fn files(&self) -> impl Iterator<Item = &RelativePath> {
        self.nodes.iter().filter_map(|n| match n {
            TemplateNode::File(p) => Some(p),
            TemplateNode::Directory(_) => None,
        })
    }

    pub fn directories(&self) -> impl Iterator<Item = &RelativePath> {
        self.nodes.iter().filter_map(|n| match n {
            TemplateNode::Directory(p) => Some(p),
            TemplateNode::File(_) => None,
        })
    }

    pub fn file_count(&self) -> usize {
        self.files().count()
    }
}
