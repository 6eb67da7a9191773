//! The probe contract (§4.1 / C1): the bit-exact schemas a probe executable
//! exchanges with the watcher over stdout, and that the watcher exchanges
//! with the web service over the wire.
//!
//! A probe is any executable that understands two invocation modes:
//! describe (self-description) and run (one observation). Both modes
//! communicate exclusively through a single JSON object on stdout.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// `status` as carried in a probe's run-mode output and in a persisted
/// result row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Warning,
    Critical,
    Unknown,
}

impl Status {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Warning => "warning",
            Self::Critical => "critical",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Status {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ok" => Ok(Self::Ok),
            "warning" => Ok(Self::Warning),
            "critical" => Ok(Self::Critical),
            "unknown" => Ok(Self::Unknown),
            other => Err(crate::error::Error::msg(format!(
                "unrecognized status '{other}'"
            ))),
        }
    }
}

/// One named argument's declared type, as carried in a probe type's
/// `arguments.required`/`arguments.optional` maps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgType {
    String,
    Number,
    Boolean,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArgumentSpec {
    #[serde(rename = "type")]
    pub arg_type: ArgType,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#enum: Option<Vec<serde_json::Value>>,
}

/// The `arguments` subtree of a describe-mode payload: which arguments a
/// probe accepts, split into required and optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArgumentSchema {
    #[serde(default)]
    pub required: BTreeMap<String, ArgumentSpec>,
    #[serde(default)]
    pub optional: BTreeMap<String, ArgumentSpec>,
}

/// The JSON object a probe executable writes to stdout in describe mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Description {
    pub name: String,
    pub description: String,
    pub version: String,
    pub arguments: ArgumentSchema,
}

/// The JSON object a probe executable writes to stdout in run mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutput {
    pub status: Status,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_run: Option<chrono::DateTime<chrono::Utc>>,
}

impl RunOutput {
    #[must_use]
    pub fn unknown(message: impl Into<String>) -> Self {
        Self {
            status: Status::Unknown,
            message: message.into(),
            metrics: None,
            data: None,
            next_run: None,
        }
    }
}

/// Sanitizes an argument key into the `PROBE_<SANITIZED_KEY>` environment
/// variable name per §4.1: uppercase, any character outside `[A-Za-z0-9]`
/// becomes `_`, and empty results are dropped by the caller.
#[must_use]
pub fn sanitize_env_key(key: &str) -> String {
    key.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect()
}

/// Renders one argument value the way §4.3 step 1 requires: booleans
/// lowercase, numbers as their textual form, strings verbatim.
#[must_use]
pub fn render_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_non_alphanumeric_to_underscore() {
        assert_eq!(sanitize_env_key("path"), "PATH");
        assert_eq!(sanitize_env_key("min-free"), "MIN_FREE");
        assert_eq!(sanitize_env_key("a.b.c"), "A_B_C");
        assert_eq!(sanitize_env_key("---"), "___");
    }

    #[test]
    fn renders_values_deterministically() {
        assert_eq!(render_value(&serde_json::json!(true)), "true");
        assert_eq!(render_value(&serde_json::json!(false)), "false");
        assert_eq!(render_value(&serde_json::json!(42)), "42");
        assert_eq!(render_value(&serde_json::json!(3.5)), "3.5");
        assert_eq!(render_value(&serde_json::json!("hi there")), "hi there");
    }

    #[test]
    fn describe_round_trips_through_json() {
        let desc = Description {
            name: "disk-space".into(),
            description: "checks free disk space".into(),
            version: "1.0.0".into(),
            arguments: ArgumentSchema {
                required: BTreeMap::from([(
                    "path".to_string(),
                    ArgumentSpec {
                        arg_type: ArgType::String,
                        description: "mount point".into(),
                        default: None,
                        r#enum: None,
                    },
                )]),
                optional: BTreeMap::new(),
            },
        };
        let encoded = serde_json::to_string(&desc).unwrap();
        let decoded: Description = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, desc);
    }

    #[test]
    fn status_round_trips_as_lowercase() {
        for s in [Status::Ok, Status::Warning, Status::Critical, Status::Unknown] {
            let encoded = serde_json::to_string(&s).unwrap();
            assert_eq!(encoded, format!("\"{}\"", s.as_str()));
            let decoded: Status = serde_json::from_str(&encoded).unwrap();
            assert_eq!(decoded, s);
        }
    }
}
