//! Server instances and their persisted record.
//!
//! Every managed instance directory carries a JSON record at its root
//! (`.dotwork_instance.json`). The record is the source of truth for which
//! template the instance follows and which variable values it was rendered
//! with:
//!
//! ```json
//! {
//!   "name": "survival-01",
//!   "template_name": "minecraft-paper",
//!   "path": "/srv/instances/survival-01",
//!   "variables": { "port": 25565 },
//!   "created_at": "2025-03-01T12:00:00.000000+01:00",
//!   "updated_at": "2025-03-04T08:30:12.481516+01:00",
//!   "version": "1.0.0"
//! }
//! ```

use crate::domain::{error::DomainError, value_objects::Variables};
use chrono::{DateTime, Local, SubsecRound};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// File name of the instance record inside an instance directory.
pub const METADATA_FILE_NAME: &str = ".dotwork_instance.json";

/// Record version written for new instances.
pub const DEFAULT_INSTANCE_VERSION: &str = "1.0.0";

/// A concrete directory materialized from a template.
///
/// Invariant: `updated_at >= created_at`. [`ServerInstance::touch`] keeps it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerInstance {
    pub name: String,
    pub template_name: String,
    pub path: PathBuf,
    #[serde(default)]
    pub variables: Variables,
    #[serde(default = "now", with = "timestamp")]
    pub created_at: DateTime<Local>,
    #[serde(default = "now", with = "timestamp")]
    pub updated_at: DateTime<Local>,
    #[serde(default = "default_version")]
    pub version: String,
}

/// Current local time at the precision the record stores.
fn now() -> DateTime<Local> {
    Local::now().trunc_subsecs(6)
}

fn default_version() -> String {
    DEFAULT_INSTANCE_VERSION.to_string()
}

impl ServerInstance {
    /// A freshly created instance: both timestamps set to now.
    pub fn new(
        name: impl Into<String>,
        template_name: impl Into<String>,
        path: impl Into<PathBuf>,
        variables: Variables,
    ) -> Self {
        let created = now();
        Self {
            name: name.into(),
            template_name: template_name.into(),
            path: path.into(),
            variables,
            created_at: created,
            updated_at: created,
            version: default_version(),
        }
    }

    /// Location of the record for an instance rooted at `dir`.
    pub fn metadata_path_for(dir: &Path) -> PathBuf {
        dir.join(METADATA_FILE_NAME)
    }

    pub fn metadata_path(&self) -> PathBuf {
        Self::metadata_path_for(&self.path)
    }

    /// Mark the instance as just reconciled.
    pub fn touch(&mut self) {
        self.updated_at = now().max(self.created_at);
    }

    /// Serialize to the on-disk record format.
    pub fn to_record_json(&self) -> Result<String, DomainError> {
        serde_json::to_string_pretty(self).map_err(|e| DomainError::InvalidInstanceRecord {
            reason: e.to_string(),
        })
    }

    /// Parse an on-disk record.
    pub fn from_record_json(json: &str) -> Result<Self, DomainError> {
        let instance: Self =
            serde_json::from_str(json).map_err(|e| DomainError::InvalidInstanceRecord {
                reason: e.to_string(),
            })?;
        if instance.name.trim().is_empty() {
            return Err(DomainError::InvalidInstanceRecord {
                reason: "instance name is empty".into(),
            });
        }
        Ok(instance)
    }
}

/// Group instances by the template they follow, sorted by template name.
pub fn group_by_template(instances: &[ServerInstance]) -> BTreeMap<&str, Vec<&ServerInstance>> {
    let mut groups: BTreeMap<&str, Vec<&ServerInstance>> = BTreeMap::new();
    for instance in instances {
        groups
            .entry(instance.template_name.as_str())
            .or_default()
            .push(instance);
    }
    groups
}

/// ISO-8601 timestamps. Written with offset; read with or without one
/// (offset-less values are taken as local time).
mod timestamp {
    use chrono::{DateTime, Local, NaiveDateTime, SecondsFormat, TimeZone};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(value: &DateTime<Local>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Micros, false))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Local>, D::Error> {
        let raw = String::deserialize(d)?;
        if let Ok(with_offset) = DateTime::parse_from_rfc3339(&raw) {
            return Ok(with_offset.with_timezone(&Local));
        }
        let naive = NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
            .map_err(|e| D::Error::custom(format!("invalid timestamp '{raw}': {e}")))?;
        Local
            .from_local_datetime(&naive)
            .earliest()
            .ok_or_else(|| D::Error::custom(format!("timestamp '{raw}' does not exist locally")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_instance_has_equal_timestamps() {
        let instance = ServerInstance::new("s1", "paper", "/srv/s1", Variables::new());
        assert_eq!(instance.created_at, instance.updated_at);
        assert_eq!(instance.version, DEFAULT_INSTANCE_VERSION);
        assert_eq!(
            instance.metadata_path(),
            PathBuf::from("/srv/s1/.dotwork_instance.json")
        );
    }

    #[test]
    fn touch_keeps_updated_after_created() {
        let mut instance = ServerInstance::new("s1", "paper", "/srv/s1", Variables::new());
        instance.touch();
        assert!(instance.updated_at >= instance.created_at);
    }

    #[test]
    fn record_round_trip_preserves_value_types() {
        let vars = Variables::from([
            ("port".to_string(), json!(25565)),
            ("motd".to_string(), json!("25565")),
        ]);
        let instance = ServerInstance::new("s1", "paper", "/srv/s1", vars);
        let parsed = ServerInstance::from_record_json(&instance.to_record_json().unwrap()).unwrap();

        assert_eq!(parsed.variables["port"], json!(25565));
        assert_eq!(parsed.variables["motd"], json!("25565"));
        assert_eq!(parsed.created_at, instance.created_at);
    }

    #[test]
    fn reads_naive_timestamps_and_fills_missing_fields() {
        let json = r#"{
            "name": "legacy",
            "template_name": "paper",
            "path": "/srv/legacy",
            "created_at": "2024-01-02T03:04:05.123456"
        }"#;
        let parsed = ServerInstance::from_record_json(json).unwrap();
        assert_eq!(parsed.version, DEFAULT_INSTANCE_VERSION);
        assert!(parsed.variables.is_empty());
        assert_eq!(
            parsed.created_at.naive_local().to_string(),
            "2024-01-02 03:04:05.123456"
        );
    }

    #[test]
    fn rejects_malformed_records() {
        assert!(ServerInstance::from_record_json("{not json").is_err());
        assert!(ServerInstance::from_record_json(r#"{"template_name":"x","path":"/p"}"#).is_err());
        assert!(
            ServerInstance::from_record_json(r#"{"name":" ","template_name":"x","path":"/p"}"#)
                .is_err()
        );
    }

    #[test]
    fn groups_by_template_name() {
        let instances = vec![
            ServerInstance::new("a", "paper", "/a", Variables::new()),
            ServerInstance::new("b", "velocity", "/b", Variables::new()),
            ServerInstance::new("c", "paper", "/c", Variables::new()),
        ];
        let groups = group_by_template(&instances);
        assert_eq!(groups["paper"].len(), 2);
        assert_eq!(groups["velocity"].len(), 1);
    }
}
