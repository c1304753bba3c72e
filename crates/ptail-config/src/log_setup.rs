//! Ordered log setup rules loaded from YAML.
//!
//! Expected file contents (all keys optional, order significant):
//!
//! ```yaml
//! hive-metadata:
//!   color: red
//! hive:
//!   color: blue
//!   format: '^(?P<date>\S+ \S+) (?P<level>\w+) (?P<text>.*)$'
//!   label: hive
//! impala:
//! ```
//!
//! The first pattern that matches a log path (regex search) supplies that
//! log's metadata.

use crate::color::ColorToken;
use crate::validate::{compile_rule, ConfigError, ConfigResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default line format: the whole line is a single `text` column.
pub const DEFAULT_LINE_FORMAT: &str = r"^(?P<text>.*)$";

/// Default log setup file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "ptail.yaml";

/// Environment variable that overrides the log setup file path.
pub const CONFIG_ENV_VAR: &str = "PTAIL_CONFIG";

/// Raw rule body as written in YAML.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogRuleSpec {
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
}

/// A compiled rule.
#[derive(Debug, Clone)]
pub struct LogRule {
    /// Log path pattern (searched, not anchored).
    pub pattern: Regex,
    pub color: Option<ColorToken>,
    /// Line format with named capture groups.
    pub format: Option<Regex>,
    pub label: Option<String>,
}

/// Ordered set of log rules.
#[derive(Debug, Clone, Default)]
pub struct LogSetup {
    rules: Vec<LogRule>,
    source: Option<PathBuf>,
}

impl LogSetup {
    /// A setup with no rules.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a setup from already compiled rules.
    pub fn from_rules(rules: Vec<LogRule>) -> Self {
        Self {
            rules,
            source: None,
        }
    }

    /// Parse YAML content, preserving declaration order.
    pub fn from_yaml_str(content: &str) -> ConfigResult<Self> {
        let value: serde_yaml::Value =
            serde_yaml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        let mapping = match value {
            serde_yaml::Value::Null => return Ok(Self::empty()),
            serde_yaml::Value::Mapping(mapping) => mapping,
            other => {
                return Err(ConfigError::Schema(format!(
                    "top level must be a mapping of pattern -> settings, got {}",
                    yaml_kind(&other)
                )))
            }
        };

        let mut rules = Vec::with_capacity(mapping.len());
        for (key, body) in mapping {
            let pattern = match key {
                serde_yaml::Value::String(s) => s,
                serde_yaml::Value::Number(n) => n.to_string(),
                other => {
                    return Err(ConfigError::Schema(format!(
                        "log name pattern must be a string, got {}",
                        yaml_kind(&other)
                    )))
                }
            };

            let spec = match body {
                serde_yaml::Value::Null => LogRuleSpec::default(),
                body => serde_yaml::from_value::<LogRuleSpec>(body).map_err(|e| {
                    ConfigError::Schema(format!("settings for {:?}: {}", pattern, e))
                })?,
            };

            debug!(pattern = %pattern, ?spec, "log setup rule");
            rules.push(compile_rule(&pattern, spec)?);
        }

        Ok(Self::from_rules(rules))
    }

    /// Load a setup file. A missing file is not an error and yields an empty setup.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            info!(path = %path.display(), "log setup file does not exist, using defaults");
            return Ok(Self::empty());
        }

        info!(path = %path.display(), "reading log setup");
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut setup = Self::from_yaml_str(&content)?;
        setup.source = Some(path.to_path_buf());
        Ok(setup)
    }

    /// Rules in declaration order.
    pub fn rules(&self) -> &[LogRule] {
        &self.rules
    }

    /// File the rules were loaded from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// First rule whose pattern matches `log_path`.
    pub fn first_match(&self, log_path: &str) -> Option<&LogRule> {
        self.rules.iter().find(|rule| rule.pattern.is_match(log_path))
    }
}

fn yaml_kind(value: &serde_yaml::Value) -> &'static str {
    match value {
        serde_yaml::Value::Null => "null",
        serde_yaml::Value::Bool(_) => "bool",
        serde_yaml::Value::Number(_) => "number",
        serde_yaml::Value::String(_) => "string",
        serde_yaml::Value::Sequence(_) => "sequence",
        serde_yaml::Value::Mapping(_) => "mapping",
        serde_yaml::Value::Tagged(_) => "tagged value",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::ColorName;

    #[test]
    fn test_first_match_wins_in_declared_order() {
        let yaml = "hive:\n  color: blue\nhive-metadata:\n  color: red\n";
        let setup = LogSetup::from_yaml_str(yaml).unwrap();

        let rule = setup.first_match("/tmp/hive/hive-metadata.log").unwrap();
        assert_eq!(rule.color, Some(ColorToken::solo(ColorName::Blue)));
    }

    #[test]
    fn test_order_reversed() {
        let yaml = "hive-metadata:\n  color: red\nhive:\n  color: blue\n";
        let setup = LogSetup::from_yaml_str(yaml).unwrap();

        let rule = setup.first_match("/tmp/hive/hive-metadata.log").unwrap();
        assert_eq!(rule.color, Some(ColorToken::solo(ColorName::Red)));
        let rule = setup.first_match("/tmp/hive/hive-server.log").unwrap();
        assert_eq!(rule.color, Some(ColorToken::solo(ColorName::Blue)));
    }

    #[test]
    fn test_null_body_and_empty_document() {
        let setup = LogSetup::from_yaml_str("impala:\n").unwrap();
        assert_eq!(setup.rules().len(), 1);
        let rule = setup.first_match("/var/log/impalad.INFO.log").unwrap();
        assert!(rule.color.is_none() && rule.format.is_none() && rule.label.is_none());

        assert!(LogSetup::from_yaml_str("").unwrap().is_empty());
    }

    #[test]
    fn test_no_match() {
        let setup = LogSetup::from_yaml_str("kafka:\n  label: k\n").unwrap();
        assert!(setup.first_match("/var/log/zookeeper.log").is_none());
    }

    #[test]
    fn test_schema_errors() {
        assert!(matches!(
            LogSetup::from_yaml_str("- a\n- b\n"),
            Err(ConfigError::Schema(_))
        ));
        assert!(matches!(
            LogSetup::from_yaml_str("hive:\n  colour: red\n"),
            Err(ConfigError::Schema(_))
        ));
        assert!(matches!(
            LogSetup::from_yaml_str("hive: [1, 2\n"),
            Err(ConfigError::Parse(_))
        ));
    }
}
