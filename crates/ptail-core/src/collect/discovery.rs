//! Process log discovery.
//!
//! One discovery cycle:
//!
//! 1. list processes matching the selector
//! 2. name each process
//! 3. list its open files, keeping paths that match the log-name filter
//! 4. keep text files (binary is excluded for the run, empty until it grows)
//! 5. re-key the process view into a log view with display metadata
//!
//! Probe failures never abort a cycle. Processes and files come and go,
//! so a failed probe just means "nothing found here this time".

use super::file_types::FileTypeCache;
use super::log_names::{order_host_names, short_log_name};
use super::probe::ProcessProbe;
use super::proc_names::ProcessNamer;
use super::types::{LogDescriptor, ProcessDescriptor, Selector};
use crate::log_meta::LogMetadataResolver;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Default log-name filter.
pub const DEFAULT_LOG_FILTER: &str = r"\.(log|trc|out)";

/// Discovers the log files held open by selected processes.
#[derive(Debug)]
pub struct LogDiscovery<P> {
    probe: P,
    namer: ProcessNamer,
    log_filter: Regex,
    file_types: FileTypeCache,
    resolver: LogMetadataResolver,
    host_names: Option<Vec<String>>,
    processes: Vec<ProcessDescriptor>,
}

impl<P: ProcessProbe> LogDiscovery<P> {
    pub fn new(probe: P, resolver: LogMetadataResolver, log_filter: Regex) -> Self {
        Self {
            probe,
            namer: ProcessNamer::default(),
            log_filter,
            file_types: FileTypeCache::new(),
            resolver,
            host_names: None,
            processes: Vec::new(),
        }
    }

    pub fn with_namer(mut self, namer: ProcessNamer) -> Self {
        self.namer = namer;
        self
    }

    pub fn probe(&self) -> &P {
        &self.probe
    }

    pub fn log_filter(&self) -> &Regex {
        &self.log_filter
    }

    /// Process view of the last cycle.
    pub fn processes(&self) -> &[ProcessDescriptor] {
        &self.processes
    }

    /// Run one discovery cycle and return the logs found, keyed by path.
    pub fn discover(&mut self, selector: &Selector) -> BTreeMap<String, LogDescriptor> {
        self.processes = self.discover_processes(selector);
        self.key_by_log()
    }

    fn discover_processes(&mut self, selector: &Selector) -> Vec<ProcessDescriptor> {
        let entries = match self.probe.processes(selector) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(%selector, error = %e, "process listing failed, nothing discovered this cycle");
                return Vec::new();
            }
        };

        let mut processes = Vec::with_capacity(entries.len());
        for entry in entries {
            let short_name = self.namer.short_name(&entry.command_line);
            let logs = self.logs_of(entry.pid);
            info!(
                pid = entry.pid,
                process = %short_name,
                logs = logs.len(),
                "analyzed process"
            );
            processes.push(ProcessDescriptor {
                pid: entry.pid,
                short_name,
                command_line: entry.command_line,
                logs,
            });
        }
        processes
    }

    fn logs_of(&mut self, pid: u32) -> Vec<String> {
        let files = match self.probe.open_files(pid) {
            Ok(files) => files,
            Err(e) => {
                debug!(pid, error = %e, "unable to list open files, process likely gone");
                return Vec::new();
            }
        };

        let candidates: BTreeSet<String> = files
            .into_iter()
            .filter(|f| self.log_filter.is_match(f))
            .collect();

        candidates
            .into_iter()
            .filter(|path| self.file_types.is_text(&self.probe, path))
            .collect()
    }

    fn ensure_host_names(&mut self) {
        if self.host_names.is_none() {
            let names = order_host_names(self.probe.host_names());
            debug!(?names, "host names for short log names");
            self.host_names = Some(names);
        }
    }

    fn key_by_log(&mut self) -> BTreeMap<String, LogDescriptor> {
        if self.processes.iter().all(|p| p.logs.is_empty()) {
            return BTreeMap::new();
        }
        self.ensure_host_names();

        let mut owners: BTreeMap<&str, Vec<&ProcessDescriptor>> = BTreeMap::new();
        for process in &self.processes {
            for log in &process.logs {
                owners.entry(log.as_str()).or_default().push(process);
            }
        }
        let host_names = self.host_names.as_deref().unwrap_or_default();

        let mut logs = BTreeMap::new();
        for (path, procs) in owners {
            let meta = self.resolver.resolve(path);
            let short_name = short_log_name(path, host_names);
            let command_short = match procs.as_slice() {
                [single] => single.short_name.clone(),
                many => format!("[proc: {}]", many.len()),
            };
            let label = meta.label.clone().unwrap_or_else(|| short_name.clone());

            logs.insert(
                path.to_string(),
                LogDescriptor {
                    path: path.to_string(),
                    color: meta.color,
                    line_format: meta.line_format.clone(),
                    label,
                    short_name,
                    command_short,
                    processes: procs.into_iter().cloned().collect(),
                },
            );
        }
        logs
    }
}
