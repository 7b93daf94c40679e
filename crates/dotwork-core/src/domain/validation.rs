use crate::domain::{
    entities::{Template, instance::METADATA_FILE_NAME},
    error::DomainError,
    value_objects::Variables,
};

/// Centralized domain validation.
///
/// All validation logic lives here, not scattered across services.
pub struct DomainValidator;

impl DomainValidator {
    pub fn validate_template(template: &Template) -> Result<(), DomainError> {
        template.validate()
    }

    /// Check a variable mapping against a template's declarations.
    ///
    /// Returns every problem found, in declaration order; an empty list
    /// means the mapping is acceptable. Undeclared keys are ignored.
    pub fn validate_variables(template: &Template, variables: &Variables) -> Vec<String> {
        let mut errors = Vec::new();
        for var in &template.variables {
            match variables.get(&var.name) {
                None if var.required => {
                    errors.push(format!("Required variable '{}' is missing", var.name));
                }
                None => {}
                Some(value) => errors.extend(var.kind.check(&var.name, value)),
            }
        }
        errors
    }

    /// Instance names become directory names under the output directory.
    pub fn validate_instance_name(name: &str) -> Result<(), DomainError> {
        let invalid = |reason: &str| DomainError::InvalidInstanceName {
            name: name.to_string(),
            reason: reason.to_string(),
        };

        if name.trim().is_empty() {
            return Err(invalid("name cannot be empty"));
        }
        if name != name.trim() {
            return Err(invalid("name cannot start or end with whitespace"));
        }
        if name == "." || name == ".." {
            return Err(invalid("name cannot be a relative directory reference"));
        }
        if name.contains(['/', '\\']) {
            return Err(invalid("name cannot contain path separators"));
        }
        if name.chars().any(char::is_control) {
            return Err(invalid("name cannot contain control characters"));
        }
        if name == METADATA_FILE_NAME {
            return Err(invalid("name is reserved"));
        }
        Ok(())
    }
}
