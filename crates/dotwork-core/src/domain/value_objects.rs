//! Domain value objects: variable kinds and variable values.
//!
//! # Design
//!
//! Variable values are kept as [`serde_json::Value`] so a mapping can be
//! written to the instance record and read back without losing its types
//! (`25565` stays an integer, `"25565"` stays a string).
//!
//! | Kind         | Descriptor spelling     | Accepted values                          |
//! |--------------|-------------------------|------------------------------------------|
//! | `String`     | `string`                | anything                                 |
//! | `Integer`    | `int`, `integer`        | integers, integer strings                |
//! | `Port`       | `port`                  | integers (or strings) in `1..=65535`     |
//! | `Boolean`    | `bool`, `boolean`       | anything (no check)                      |
//! | `Choice`     | `choice`                | anything (no check)                      |
//! | `Other`      | anything else           | anything (no check)                      |

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Variable name to value mapping used for rendering and persisted in
/// the instance record. Ordered so records serialize deterministically.
pub type Variables = BTreeMap<String, Value>;

/// Lowest and highest valid TCP/UDP port.
pub const PORT_RANGE: std::ops::RangeInclusive<i64> = 1..=65535;

// ── VariableKind ─────────────────────────────────────────────────────────────

/// The declared type of a template variable.
///
/// Unknown spellings are kept verbatim in [`VariableKind::Other`] so the
/// descriptor round-trips; they receive no type check.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum VariableKind {
    #[default]
    String,
    Integer,
    Port,
    Boolean,
    Choice,
    Other(String),
}

impl VariableKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::String => "string",
            Self::Integer => "int",
            Self::Port => "port",
            Self::Boolean => "boolean",
            Self::Choice => "choice",
            Self::Other(raw) => raw.as_str(),
        }
    }

    /// Check a supplied value against this kind.
    ///
    /// Returns the human-readable error message on failure.
    pub fn check(&self, name: &str, value: &Value) -> Option<String> {
        match self {
            Self::Integer => match as_integer(value) {
                Some(_) => None,
                None => Some(format!("Variable '{name}' must be an integer")),
            },
            Self::Port => match as_integer(value) {
                Some(port) if PORT_RANGE.contains(&port) => None,
                Some(_) => Some(format!("Variable '{name}' must be a valid port (1-65535)")),
                None => Some(format!("Variable '{name}' must be a valid port number")),
            },
            _ => None,
        }
    }

    /// Turn raw user input (a `--var` argument or a prompt answer) into a
    /// typed value. Input that does not parse for the kind is kept as a
    /// string so validation can report it.
    pub fn coerce(&self, raw: &str) -> Value {
        match self {
            Self::Integer | Self::Port => raw
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .unwrap_or_else(|_| Value::String(raw.to_string())),
            Self::Boolean => match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "y" | "1" | "on" => Value::Bool(true),
                "false" | "no" | "n" | "0" | "off" => Value::Bool(false),
                _ => Value::String(raw.to_string()),
            },
            _ => Value::String(raw.to_string()),
        }
    }
}

impl FromStr for VariableKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "" | "string" | "str" => Self::String,
            "int" | "integer" => Self::Integer,
            "port" => Self::Port,
            "bool" | "boolean" => Self::Boolean,
            "choice" => Self::Choice,
            _ => Self::Other(s.to_string()),
        })
    }
}

impl fmt::Display for VariableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for VariableKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for VariableKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let Ok(kind) = raw.parse::<Self>();
        Ok(kind)
    }
}

// ── Value helpers ────────────────────────────────────────────────────────────

/// Interpret a value as an integer the way the type checks do: JSON integers
/// and base-10 integer strings (surrounding whitespace allowed). Booleans and
/// floats are not integers.
pub fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Render a value for display: strings without quotes, everything else as JSON.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
