//! Re-discovery and tailer lifecycle.
//!
//! The orchestrator owns one [`LineTailer`] per open log. Each refresh
//! diffs the freshly discovered log set against the open set: new paths
//! are opened, vanished paths are closed. Paths that fail to open are
//! remembered as bad and never retried.

use super::filter::LineRules;
use super::tailer::{LineTailer, TailError, TailerConfig};
use crate::collect::discovery::LogDiscovery;
use crate::collect::probe::ProcessProbe;
use crate::collect::types::{LogDescriptor, ProcessDescriptor, Selector};
use crate::log_meta::default_line_format;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Default seconds between re-discoveries.
pub const DEFAULT_REFRESH_SECS: f64 = 0.5;

/// Behavior switches for a tail session.
#[derive(Debug, Clone)]
pub struct TailOptions {
    pub refresh_interval: Duration,
    /// Read new logs from the start instead of the end.
    pub from_top: bool,
    pub full_color: bool,
    /// Force the single `text` column format on every log.
    pub simple_grep: bool,
}

impl Default for TailOptions {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs_f64(DEFAULT_REFRESH_SECS),
            from_top: false,
            full_color: false,
            simple_grep: false,
        }
    }
}

/// Output format of the process report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShowFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for ShowFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(ShowFormat::Text),
            "json" => Ok(ShowFormat::Json),
            other => Err(format!("unknown show format: {} (expected text or json)", other)),
        }
    }
}

/// What a refresh changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshOutcome {
    /// Whether discovery ran at all.
    pub refreshed: bool,
    pub opened: Vec<String>,
    pub closed: Vec<String>,
    /// Paths that failed to open and are now bad.
    pub failed: Vec<String>,
}

impl RefreshOutcome {
    pub fn changed(&self) -> bool {
        !self.opened.is_empty() || !self.closed.is_empty()
    }
}

#[derive(Serialize)]
struct ShowReport<'a> {
    processes: Vec<&'a ProcessDescriptor>,
}

/// Drives discovery and the open tailers for one selector.
pub struct TailOrchestrator<P: ProcessProbe, W: Write> {
    discovery: LogDiscovery<P>,
    selector: Selector,
    options: TailOptions,
    out: W,
    current: BTreeMap<String, LineTailer>,
    previous: BTreeSet<String>,
    last_refresh: Option<Instant>,
    bad_logs: BTreeSet<String>,
    rules: LineRules,
}

impl<P: ProcessProbe, W: Write> TailOrchestrator<P, W> {
    pub fn new(discovery: LogDiscovery<P>, selector: Selector, options: TailOptions, out: W) -> Self {
        Self {
            discovery,
            selector,
            options,
            out,
            current: BTreeMap::new(),
            previous: BTreeSet::new(),
            last_refresh: None,
            bad_logs: BTreeSet::new(),
            rules: LineRules::default(),
        }
    }

    pub fn discovery(&self) -> &LogDiscovery<P> {
        &self.discovery
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    pub fn output_mut(&mut self) -> &mut W {
        &mut self.out
    }

    /// Paths currently being tailed.
    pub fn open_paths(&self) -> impl Iterator<Item = &str> {
        self.current.keys().map(String::as_str)
    }

    /// Open set as of the refresh before the last one.
    pub fn previous_paths(&self) -> &BTreeSet<String> {
        &self.previous
    }

    pub fn bad_logs(&self) -> &BTreeSet<String> {
        &self.bad_logs
    }

    fn is_due(&self, now: Instant) -> bool {
        match self.last_refresh {
            None => true,
            Some(last) => now.duration_since(last) >= self.options.refresh_interval,
        }
    }

    /// Re-discover logs if this is the first call or the refresh interval elapsed.
    ///
    /// With `open_files` unset only discovery runs; tailers are untouched.
    pub fn refresh_if_due(&mut self, open_files: bool) -> Result<RefreshOutcome, TailError> {
        let now = Instant::now();
        if !self.is_due(now) {
            return Ok(RefreshOutcome::default());
        }

        self.previous = self.current.keys().cloned().collect();
        let discovered = self.discovery.discover(&self.selector);
        let mut outcome = RefreshOutcome {
            refreshed: true,
            ..RefreshOutcome::default()
        };

        if open_files {
            self.adjust(discovered, &mut outcome)?;
            if outcome.changed() {
                writeln!(self.out).map_err(TailError::Output)?;
            }
        }

        self.last_refresh = Some(now);
        Ok(outcome)
    }

    fn adjust(
        &mut self,
        mut discovered: BTreeMap<String, LogDescriptor>,
        outcome: &mut RefreshOutcome,
    ) -> Result<(), TailError> {
        let added: Vec<String> = discovered
            .keys()
            .filter(|path| !self.current.contains_key(*path))
            .cloned()
            .collect();
        let removed: Vec<String> = self
            .current
            .keys()
            .filter(|path| !discovered.contains_key(*path))
            .cloned()
            .collect();
        info!(added = added.len(), removed = removed.len(), "adjusting followed logs");

        for path in added {
            if self.bad_logs.contains(&path) {
                debug!(path = %path, "skipping bad log");
                continue;
            }
            let Some(log) = discovered.remove(&path) else {
                continue;
            };
            let line_format = if self.options.simple_grep {
                default_line_format().clone()
            } else {
                log.line_format
            };
            let mut tailer = LineTailer::new(
                path.clone(),
                TailerConfig {
                    color: log.color,
                    line_format,
                    label: log.label,
                    full_color: self.options.full_color,
                },
            );
            match tailer.open(self.options.from_top, &mut self.out) {
                Ok(()) => {
                    self.current.insert(path.clone(), tailer);
                    outcome.opened.push(path);
                }
                Err(TailError::Output(e)) => return Err(TailError::Output(e)),
                Err(e) => {
                    warn!(path = %path, error = %e, "unable to open log, marking as bad");
                    self.bad_logs.insert(path.clone());
                    outcome.failed.push(path);
                }
            }
        }

        for path in removed {
            if let Some(mut tailer) = self.current.remove(&path) {
                debug!(path = %path, "log no longer held open");
                tailer.close(&mut self.out, &self.rules)?;
                outcome.closed.push(path);
            }
        }
        Ok(())
    }

    /// One tail cycle: refresh if due, then emit new lines from every open log.
    ///
    /// Returns the number of lines written.
    pub fn tail(&mut self, rules: &LineRules) -> Result<usize, TailError> {
        self.rules = rules.clone();
        self.refresh_if_due(true)?;

        let mut emitted = 0;
        for (path, tailer) in self.current.iter_mut() {
            match tailer.read_new(&mut self.out, &self.rules) {
                Ok(n) => emitted += n,
                Err(TailError::Output(e)) => return Err(TailError::Output(e)),
                Err(e) => warn!(path = %path, error = %e, "failed to read log"),
            }
        }
        self.out.flush().map_err(TailError::Output)?;
        Ok(emitted)
    }

    /// Print the processes that hold at least one log.
    pub fn show(&mut self, format: ShowFormat) -> Result<(), TailError> {
        self.refresh_if_due(false)?;

        let mut processes: Vec<&ProcessDescriptor> = self
            .discovery
            .processes()
            .iter()
            .filter(|p| !p.logs.is_empty())
            .collect();
        processes.sort_by(|a, b| a.short_name.cmp(&b.short_name).then(a.pid.cmp(&b.pid)));

        match format {
            ShowFormat::Text => {
                for p in &processes {
                    writeln!(self.out, "\n{}:", p.short_name).map_err(TailError::Output)?;
                    writeln!(self.out, "\tPID: {}", p.pid).map_err(TailError::Output)?;
                    writeln!(self.out, "\tCOMMAND LINE: {}", p.command_line).map_err(TailError::Output)?;
                    writeln!(self.out, "\tLOGS:").map_err(TailError::Output)?;
                    for log in &p.logs {
                        writeln!(self.out, "\t\t{}", log).map_err(TailError::Output)?;
                    }
                }
            }
            ShowFormat::Json => {
                let report = ShowReport { processes };
                serde_json::to_writer_pretty(&mut self.out, &report)
                    .map_err(|e| TailError::Output(e.into()))?;
                writeln!(self.out).map_err(TailError::Output)?;
            }
        }
        self.out.flush().map_err(TailError::Output)
    }

    /// Close every open tailer.
    pub fn shutdown(&mut self) -> Result<(), TailError> {
        let current = std::mem::take(&mut self.current);
        let mut result = Ok(());
        for (path, mut tailer) in current {
            debug!(path = %path, "closing on shutdown");
            if let Err(e) = tailer.close(&mut self.out, &self.rules) {
                warn!(path = %path, error = %e, "failed to close log");
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        let _ = self.out.flush();
        result
    }
}

impl<P: ProcessProbe, W: Write> Drop for TailOrchestrator<P, W> {
    fn drop(&mut self) {
        if !self.current.is_empty() {
            let _ = self.shutdown();
        }
    }
}
