//! Structured filters and match highlighting.

use crate::color::{emphasize, render};
use ptail_config::ColorToken;
use regex::Regex;
use std::collections::BTreeMap;
use tracing::trace;

/// Named columns parsed from a log line.
pub type Columns = BTreeMap<String, String>;

/// Column name to pattern constraints.
///
/// An empty set passes every line. Otherwise a line passes only when it
/// shares at least one column with the set and every shared column
/// matches (regex search). Lines sharing no column are suppressed.
#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    filters: BTreeMap<String, Regex>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: impl Into<String>, pattern: Regex) -> Self {
        self.insert(column, pattern);
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, pattern: Regex) {
        self.filters.insert(column.into(), pattern);
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.filters.keys().map(String::as_str)
    }

    pub fn matches(&self, columns: &Columns) -> bool {
        if self.filters.is_empty() {
            return true;
        }

        let mut shared = 0usize;
        for (column, pattern) in &self.filters {
            let Some(value) = columns.get(column) else {
                continue;
            };
            shared += 1;
            if !pattern.is_match(value) {
                trace!(column, "filter did not match");
                return false;
            }
        }

        if shared == 0 {
            trace!("no columns shared with filters, suppressing line");
        }
        shared > 0
    }
}

/// Filters and highlight pattern applied to every emitted line.
#[derive(Debug, Clone, Default)]
pub struct LineRules {
    pub filters: FilterSet,
    pub highlight: Option<Regex>,
}

impl LineRules {
    pub fn new(filters: FilterSet, highlight: Option<Regex>) -> Self {
        Self { filters, highlight }
    }
}

/// Style a logical line.
///
/// Matches of `pattern` get the emphasis style. Everything else is
/// colored with `base` when given (full-color mode) and left plain
/// otherwise.
pub fn highlight(text: &str, pattern: Option<&Regex>, base: Option<ColorToken>) -> String {
    let plain = |s: &str| match base {
        Some(token) => render(s, token),
        None => s.to_string(),
    };

    let Some(pattern) = pattern else {
        return plain(text);
    };

    let mut out = String::with_capacity(text.len() + 32);
    let mut last = 0;
    for m in pattern.find_iter(text).filter(|m| !m.as_str().is_empty()) {
        if m.start() > last {
            out.push_str(&plain(&text[last..m.start()]));
        }
        out.push_str(&emphasize(m.as_str()));
        last = m.end();
    }
    if last < text.len() {
        out.push_str(&plain(&text[last..]));
    }
    out
}
