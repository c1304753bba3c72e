//! Per-run memo of file content classes.

use super::probe::ProcessProbe;
use super::types::FileType;
use std::collections::HashMap;
use tracing::debug;

/// Remembers `text` and `binary` results; `empty` files are probed again.
#[derive(Debug, Clone, Default)]
pub struct FileTypeCache {
    known: HashMap<String, FileType>,
}

impl FileTypeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify `path`, probing unless a terminal result is cached.
    ///
    /// Returns `None` when the probe fails (the file vanished); nothing is
    /// cached in that case.
    pub fn classify<P: ProcessProbe + ?Sized>(&mut self, probe: &P, path: &str) -> Option<FileType> {
        if let Some(file_type) = self.known.get(path) {
            if file_type.is_terminal() {
                return Some(*file_type);
            }
        }

        match probe.file_type(path) {
            Ok(file_type) => {
                debug!(path, ?file_type, "classified file");
                self.known.insert(path.to_string(), file_type);
                Some(file_type)
            }
            Err(e) => {
                debug!(path, error = %e, "unable to classify file");
                None
            }
        }
    }

    /// Whether `path` should be tailed.
    pub fn is_text<P: ProcessProbe + ?Sized>(&mut self, probe: &P, path: &str) -> bool {
        self.classify(probe, path) == Some(FileType::Text)
    }

    pub fn cached(&self, path: &str) -> Option<FileType> {
        self.known.get(path).copied()
    }

    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }
}
