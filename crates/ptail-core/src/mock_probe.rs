//! Scripted in-memory process probe for testing.
//!
//! [`MockProbe`] answers discovery questions from a table that tests edit
//! between cycles. Clones share the same table, so a test can keep a
//! handle while the orchestrator owns another.
//!
//! # Example
//!
//! ```ignore
//! use ptail_core::mock_probe::MockProbe;
//! use ptail_core::collect::FileType;
//!
//! let probe = MockProbe::new()
//!     .with_process(100, "myapp --serve")
//!     .with_open_file(100, "/var/log/myapp.log")
//!     .with_file_type("/var/log/myapp.log", FileType::Text);
//! ```

use crate::collect::probe::{ProbeError, ProcessEntry, ProcessProbe};
use crate::collect::types::{FileType, Selector};
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct MockState {
    processes: BTreeMap<u32, String>,
    open_files: BTreeMap<u32, Vec<String>>,
    file_types: HashMap<String, FileType>,
    host_names: Vec<String>,
    file_type_calls: HashMap<String, usize>,
    fail_listing: bool,
}

/// Probe answering from a shared, mutable table.
#[derive(Debug, Clone, Default)]
pub struct MockProbe {
    state: Arc<Mutex<MockState>>,
}

impl MockProbe {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn with_process(self, pid: u32, command_line: &str) -> Self {
        self.set_process(pid, command_line);
        self
    }

    pub fn with_open_file(self, pid: u32, path: &str) -> Self {
        self.add_open_file(pid, path);
        self
    }

    pub fn with_file_type(self, path: &str, file_type: FileType) -> Self {
        self.set_file_type(path, file_type);
        self
    }

    pub fn with_host_names(self, names: &[&str]) -> Self {
        self.state().host_names = names.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn set_process(&self, pid: u32, command_line: &str) {
        self.state().processes.insert(pid, command_line.to_string());
    }

    /// Remove a process and its open files.
    pub fn kill(&self, pid: u32) {
        let mut state = self.state();
        state.processes.remove(&pid);
        state.open_files.remove(&pid);
    }

    pub fn add_open_file(&self, pid: u32, path: &str) {
        self.state()
            .open_files
            .entry(pid)
            .or_default()
            .push(path.to_string());
    }

    pub fn close_file(&self, pid: u32, path: &str) {
        if let Some(files) = self.state().open_files.get_mut(&pid) {
            files.retain(|f| f != path);
        }
    }

    pub fn set_file_type(&self, path: &str, file_type: FileType) {
        self.state().file_types.insert(path.to_string(), file_type);
    }

    /// Make process listing fail until reset.
    pub fn set_fail_listing(&self, fail: bool) {
        self.state().fail_listing = fail;
    }

    /// Number of `file_type` calls made for `path`.
    pub fn file_type_calls(&self, path: &str) -> usize {
        self.state().file_type_calls.get(path).copied().unwrap_or(0)
    }
}

impl ProcessProbe for MockProbe {
    fn processes(&self, selector: &Selector) -> Result<Vec<ProcessEntry>, ProbeError> {
        let state = self.state();
        if state.fail_listing {
            return Err(ProbeError::CommandFailed {
                command: "mock process listing".to_string(),
                return_code: 1,
                stderr: "scripted failure".to_string(),
            });
        }
        let entries = match selector {
            Selector::Pids(pids) => state
                .processes
                .iter()
                .filter(|(pid, _)| pids.contains(pid))
                .map(|(pid, cmd)| ProcessEntry::new(*pid, cmd.clone()))
                .collect(),
            Selector::Name(pattern) => {
                let re = Regex::new(pattern).map_err(|e| ProbeError::Parse(e.to_string()))?;
                state
                    .processes
                    .iter()
                    .filter(|(_, cmd)| re.is_match(cmd))
                    .map(|(pid, cmd)| ProcessEntry::new(*pid, cmd.clone()))
                    .collect()
            }
        };
        Ok(entries)
    }

    fn open_files(&self, pid: u32) -> Result<Vec<String>, ProbeError> {
        let state = self.state();
        if !state.processes.contains_key(&pid) {
            return Err(ProbeError::CommandFailed {
                command: format!("ls -l /proc/{}/fd", pid),
                return_code: 2,
                stderr: "No such file or directory".to_string(),
            });
        }
        Ok(state.open_files.get(&pid).cloned().unwrap_or_default())
    }

    fn file_type(&self, path: &str) -> Result<FileType, ProbeError> {
        let mut state = self.state();
        *state.file_type_calls.entry(path.to_string()).or_default() += 1;
        state
            .file_types
            .get(path)
            .copied()
            .ok_or_else(|| ProbeError::CommandFailed {
                command: format!("file -b -i {}", path),
                return_code: 1,
                stderr: "cannot open".to_string(),
            })
    }

    fn host_names(&self) -> Vec<String> {
        self.state().host_names.clone()
    }
}
