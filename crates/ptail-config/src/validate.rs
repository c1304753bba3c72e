//! Configuration errors and semantic validation of log setup rules.

use crate::color::ColorToken;
use crate::log_setup::{LogRule, LogRuleSpec};
use regex::Regex;
use std::path::PathBuf;
use thiserror::Error;

/// Validation result type.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Log setup configuration errors.
///
/// All of these are fatal at startup; ptail does not try to recover
/// from a malformed setup file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML: {0}")]
    Parse(String),

    #[error("Schema validation failed: {0}")]
    Schema(String),

    #[error("Invalid log name pattern {pattern:?}: {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("Invalid line format for {pattern:?}: {message}")]
    InvalidFormat { pattern: String, message: String },

    #[error("Invalid color for {pattern:?}: {message}")]
    InvalidColor { pattern: String, message: String },
}

impl ConfigError {
    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            ConfigError::Io { .. } => 60,
            ConfigError::Parse(_) => 61,
            ConfigError::Schema(_) => 62,
            ConfigError::InvalidPattern { .. } => 63,
            ConfigError::InvalidFormat { .. } => 64,
            ConfigError::InvalidColor { .. } => 65,
        }
    }
}

/// Compile a line format and require at least one named capture group.
///
/// Named groups become the filterable "columns" of a log line, so a
/// format without any could never satisfy a structured filter.
pub fn compile_line_format(format: &str) -> Result<Regex, String> {
    let re = Regex::new(format).map_err(|e| e.to_string())?;
    if re.capture_names().flatten().next().is_none() {
        return Err(format!(
            "format {:?} has no named capture groups, e.g. (?P<text>.*)",
            format
        ));
    }
    Ok(re)
}

/// Turn a raw YAML rule into a compiled, validated rule.
///
/// Empty strings are treated as unset, same as missing keys.
pub fn compile_rule(pattern: &str, spec: LogRuleSpec) -> ConfigResult<LogRule> {
    let compiled = Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })?;

    let color = match non_empty(spec.color) {
        Some(raw) => Some(raw.parse::<ColorToken>().map_err(|e| {
            ConfigError::InvalidColor {
                pattern: pattern.to_string(),
                message: e.to_string(),
            }
        })?),
        None => None,
    };

    let format = match non_empty(spec.format) {
        Some(raw) => Some(compile_line_format(&raw).map_err(|message| {
            ConfigError::InvalidFormat {
                pattern: pattern.to_string(),
                message,
            }
        })?),
        None => None,
    };

    Ok(LogRule {
        pattern: compiled,
        color,
        format,
        label: non_empty(spec.label),
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_format_requires_named_group() {
        assert!(compile_line_format(r"^(?P<text>.*)$").is_ok());
        assert!(compile_line_format(r"^(.*)$").is_err());
        assert!(compile_line_format(r"^(?P<text>.*$").is_err());
    }

    #[test]
    fn test_compile_rule_full() {
        let spec = LogRuleSpec {
            color: Some("red_on_white".to_string()),
            format: Some(r"^\[(?P<id>[^\]]+)\]: (?P<msg>.*)$".to_string()),
            label: Some("hive".to_string()),
        };
        let rule = compile_rule("hive", spec).unwrap();
        assert!(rule.pattern.is_match("/tmp/hive/hive-metadata.log"));
        assert_eq!(rule.color.unwrap().to_string(), "red_on_white");
        assert!(rule.format.is_some());
        assert_eq!(rule.label.as_deref(), Some("hive"));
    }

    #[test]
    fn test_compile_rule_empty_fields_are_unset() {
        let spec = LogRuleSpec {
            color: Some(String::new()),
            format: Some("  ".to_string()),
            label: Some(String::new()),
        };
        let rule = compile_rule("impala", spec).unwrap();
        assert!(rule.color.is_none());
        assert!(rule.format.is_none());
        assert!(rule.label.is_none());
    }

    #[test]
    fn test_compile_rule_errors() {
        let bad_pattern = compile_rule("hive(", LogRuleSpec::default()).unwrap_err();
        assert!(matches!(bad_pattern, ConfigError::InvalidPattern { .. }));
        assert_eq!(bad_pattern.code(), 63);

        let bad_color = compile_rule(
            "hive",
            LogRuleSpec {
                color: Some("ultraviolet".to_string()),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(bad_color, ConfigError::InvalidColor { .. }));

        let bad_format = compile_rule(
            "hive",
            LogRuleSpec {
                format: Some("(unnamed)".to_string()),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(bad_format, ConfigError::InvalidFormat { .. }));
    }
}
