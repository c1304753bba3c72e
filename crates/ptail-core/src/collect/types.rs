//! Discovery data model.

use ptail_config::ColorToken;
use regex::Regex;
use serde::Serialize;
use std::fmt;

/// Criterion choosing the target processes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// Explicit process ids.
    Pids(Vec<u32>),
    /// Regular expression matched against full command lines.
    Name(String),
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Pids(pids) => {
                let pids: Vec<String> = pids.iter().map(u32::to_string).collect();
                write!(f, "pids {}", pids.join(","))
            }
            Selector::Name(pattern) => write!(f, "name /{}/", pattern),
        }
    }
}

/// Content class of a file as reported by the type probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Text,
    Binary,
    Empty,
}

impl FileType {
    /// Classify `file -b -i` output.
    ///
    /// Only the MIME type is inspected. A `path: ` prefix from non-brief
    /// output is dropped first.
    pub fn from_mime_output(output: &str) -> Self {
        let mime = output
            .trim()
            .rsplit(": ")
            .next()
            .unwrap_or_default()
            .split(';')
            .next()
            .unwrap_or_default()
            .trim();
        if mime == "inode/x-empty" || mime == "application/x-empty" {
            FileType::Empty
        } else if mime.starts_with("text/") {
            FileType::Text
        } else {
            FileType::Binary
        }
    }

    /// Text and binary results hold for the rest of the run.
    pub fn is_terminal(self) -> bool {
        !matches!(self, FileType::Empty)
    }
}

/// One matching process and the log files it holds open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessDescriptor {
    pub pid: u32,
    pub short_name: String,
    pub command_line: String,
    /// Sorted, de-duplicated log paths.
    pub logs: Vec<String>,
}

/// One discovered log path with its display metadata.
#[derive(Debug, Clone)]
pub struct LogDescriptor {
    pub path: String,
    pub color: ColorToken,
    pub line_format: Regex,
    pub label: String,
    /// Derived short log name.
    pub short_name: String,
    /// Owning command summary: a short process name or `[proc: N]`.
    pub command_short: String,
    pub processes: Vec<ProcessDescriptor>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_type_from_mime_output() {
        assert_eq!(
            FileType::from_mime_output("/var/log/a.log: text/plain; charset=us-ascii"),
            FileType::Text
        );
        assert_eq!(
            FileType::from_mime_output("/var/log/a.log: inode/x-empty; charset=binary"),
            FileType::Empty
        );
        assert_eq!(
            FileType::from_mime_output("/var/log/a.dat: application/octet-stream; charset=binary"),
            FileType::Binary
        );
        assert_eq!(FileType::from_mime_output("text/x-log; charset=utf-8\n"), FileType::Text);
        assert_eq!(FileType::from_mime_output("inode/x-empty; charset=binary"), FileType::Empty);
    }

    #[test]
    fn test_file_type_ignores_path() {
        assert_eq!(
            FileType::from_mime_output("/var/log/x-empty-check.log: text/plain; charset=us-ascii"),
            FileType::Text
        );
        assert_eq!(
            FileType::from_mime_output("/data/a: text/b.dat: application/octet-stream; charset=binary"),
            FileType::Binary
        );
    }

    #[test]
    fn test_terminal_types() {
        assert!(FileType::Text.is_terminal());
        assert!(FileType::Binary.is_terminal());
        assert!(!FileType::Empty.is_terminal());
    }

    #[test]
    fn test_selector_display() {
        assert_eq!(Selector::Pids(vec![1, 22]).to_string(), "pids 1,22");
        assert_eq!(Selector::Name("java".into()).to_string(), "name /java/");
    }
}
