//! Template Service - template discovery and lookup.
//!
//! Separated from ProvisionService for single responsibility: it never
//! touches instances.

use serde::Serialize;
use std::path::PathBuf;
use tracing::debug;

use crate::{
    application::{ApplicationError, ports::TemplateRepository},
    domain::Template,
    error::DotworkResult,
};

/// Information about a template for display purposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateInfo {
    pub name: String,
    pub version: String,
    pub description: String,
    pub path: PathBuf,
    pub variable_count: usize,
    pub required_count: usize,
}

impl From<&Template> for TemplateInfo {
    fn from(t: &Template) -> Self {
        Self {
            name: t.name.clone(),
            version: t.version.clone(),
            description: t.description.clone(),
            path: t.path.clone(),
            variable_count: t.variables.len(),
            required_count: t.required_variables().count(),
        }
    }
}

/// Service for template operations.
pub struct TemplateService {
    repository: Box<dyn TemplateRepository>,
}

impl TemplateService {
    /// Create a new template service.
    pub fn new(repository: Box<dyn TemplateRepository>) -> Self {
        Self { repository }
    }

    /// Every loadable template, sorted by name.
    pub fn discover(&self) -> DotworkResult<Vec<Template>> {
        let mut templates = self.repository.discover()?;
        templates.sort_by(|a, b| a.name.cmp(&b.name));
        debug!(count = templates.len(), "templates discovered");
        Ok(templates)
    }

    /// Get a template by exact name.
    pub fn get(&self, name: &str) -> DotworkResult<Template> {
        find_template(self.repository.as_ref(), name)
    }

    /// List all templates as display DTOs.
    pub fn list(&self) -> DotworkResult<Vec<TemplateInfo>> {
        Ok(self.discover()?.iter().map(TemplateInfo::from).collect())
    }
}

/// Exact-name lookup shared by the services.
pub(crate) fn find_template(
    repository: &dyn TemplateRepository,
    name: &str,
) -> DotworkResult<Template> {
    repository
        .discover()?
        .into_iter()
        .find(|t| t.name == name)
        .ok_or_else(|| {
            ApplicationError::TemplateNotFound {
                name: name.to_string(),
            }
            .into()
        })
}
