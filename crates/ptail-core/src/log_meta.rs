//! Per-log display metadata.
//!
//! Metadata comes from the first matching log-setup rule, with a palette
//! color and the single-column default format filling the gaps. Results
//! are memoized by path, so a log keeps its color if it disappears and is
//! later rediscovered.

use crate::color::ColorPalette;
use ptail_config::{ColorToken, LogSetup, DEFAULT_LINE_FORMAT};
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::{debug, info};

/// Compiled `^(?P<text>.*)$`.
pub fn default_line_format() -> &'static Regex {
    static FORMAT: OnceLock<Regex> = OnceLock::new();
    FORMAT.get_or_init(|| Regex::new(DEFAULT_LINE_FORMAT).expect("default line format compiles"))
}

/// Resolved metadata for one log path.
#[derive(Debug, Clone)]
pub struct LogMeta {
    pub color: ColorToken,
    pub line_format: Regex,
    /// `None` until the caller supplies a derived label.
    pub label: Option<String>,
}

/// Memoizing resolver over a [`LogSetup`].
#[derive(Debug)]
pub struct LogMetadataResolver {
    setup: LogSetup,
    palette: ColorPalette,
    resolved: HashMap<String, LogMeta>,
}

impl LogMetadataResolver {
    pub fn new(setup: LogSetup) -> Self {
        Self {
            setup,
            palette: ColorPalette::new(),
            resolved: HashMap::new(),
        }
    }

    pub fn setup(&self) -> &LogSetup {
        &self.setup
    }

    /// Metadata for `path`, resolving and memoizing it on first use.
    pub fn resolve(&mut self, path: &str) -> &LogMeta {
        if !self.resolved.contains_key(path) {
            let meta = self.build(path);
            info!(
                path,
                color = %meta.color,
                format = meta.line_format.as_str(),
                label = meta.label.as_deref().unwrap_or(""),
                "resolved log metadata"
            );
            self.resolved.insert(path.to_string(), meta);
        }
        &self.resolved[path]
    }

    fn build(&mut self, path: &str) -> LogMeta {
        let rule = self.setup.first_match(path);
        if let Some(rule) = rule {
            debug!(path, pattern = rule.pattern.as_str(), "log setup rule matched");
        }

        let color = rule.and_then(|r| r.color);
        let line_format = rule.and_then(|r| r.format.clone());
        let label = rule.and_then(|r| r.label.clone());

        LogMeta {
            color: color.unwrap_or_else(|| self.palette.next()),
            line_format: line_format.unwrap_or_else(|| default_line_format().clone()),
            label,
        }
    }

    /// Number of memoized paths.
    pub fn len(&self) -> usize {
        self.resolved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty()
    }
}
