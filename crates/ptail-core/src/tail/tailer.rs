//! Incremental reader for one log file.
//!
//! A [`LineTailer`] goes through `unopened -> open -> closed`. While open it
//! remembers the byte offset it has consumed, bytes of an unterminated
//! last line, and the logical line still waiting for continuations.
//!
//! Physical lines that match the line format start a new logical line and
//! their named groups become its columns. Lines that do not match are
//! continuations and are appended to the pending logical line, so a stack
//! trace stays attached to the record that produced it. A pending logical
//! line is emitted when the next record starts, when a read finds no new
//! complete lines, or when the tailer closes.

use super::filter::{highlight, Columns, LineRules};
use crate::color::render;
use ptail_config::ColorToken;
use regex::Regex;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, trace};

/// Errors raised while tailing a file.
#[derive(Debug, Error)]
pub enum TailError {
    #[error("unable to locate file: {path}")]
    NotFound { path: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("tailer for {path} is closed")]
    Closed { path: String },

    #[error("failed to write output: {0}")]
    Output(#[source] io::Error),
}

impl TailError {
    fn io(path: &str, source: io::Error) -> Self {
        TailError::Io {
            path: path.to_string(),
            source,
        }
    }
}

/// Display settings of a tailer.
#[derive(Debug, Clone)]
pub struct TailerConfig {
    pub color: ColorToken,
    pub line_format: Regex,
    pub label: String,
    /// Color whole lines, not only the label.
    pub full_color: bool,
}

#[derive(Debug)]
struct LogicalLine {
    columns: Columns,
    text: String,
}

/// Bytes read from the file per chunk.
pub const READ_CHUNK_BYTES: usize = 64 * 1024;

/// Longest unterminated line kept before it is emitted as is.
pub const MAX_PARTIAL_BYTES: usize = 1024 * 1024;

#[derive(Debug)]
struct TailState {
    file: File,
    offset: u64,
    partial: Vec<u8>,
    pending: Option<LogicalLine>,
    /// Columns of the last record, inherited by continuations that
    /// arrive after it was flushed.
    last_columns: Option<Columns>,
}

impl TailState {
    /// Feed one physical line; returns a logical line that is now complete.
    fn push_physical(&mut self, format: &Regex, line: &str) -> Option<LogicalLine> {
        match parse_columns(format, line) {
            Some(columns) => {
                self.last_columns = Some(columns.clone());
                self.pending.replace(LogicalLine {
                    columns,
                    text: line.to_string(),
                })
            }
            None => {
                match &mut self.pending {
                    Some(current) => {
                        current.text.push('\n');
                        current.text.push_str(line);
                    }
                    None => {
                        self.pending = Some(LogicalLine {
                            columns: self.last_columns.clone().unwrap_or_default(),
                            text: line.to_string(),
                        })
                    }
                }
                None
            }
        }
    }
}

#[derive(Debug)]
enum Phase {
    Unopened,
    Open(TailState),
    Closed,
}

/// Tails a single file.
#[derive(Debug)]
pub struct LineTailer {
    path: String,
    config: TailerConfig,
    label: String,
    phase: Phase,
}

impl LineTailer {
    pub fn new(path: impl Into<String>, config: TailerConfig) -> Self {
        let label = render(&format!("[{}]", config.label), config.color);
        Self {
            path: path.into(),
            config,
            label,
            phase: Phase::Unopened,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn config(&self) -> &TailerConfig {
        &self.config
    }

    pub fn is_open(&self) -> bool {
        matches!(self.phase, Phase::Open(_))
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.phase, Phase::Closed)
    }

    /// Current read offset, if open.
    pub fn offset(&self) -> Option<u64> {
        match &self.phase {
            Phase::Open(state) => Some(state.offset),
            _ => None,
        }
    }

    /// Open the file and announce it on `out`.
    ///
    /// Reads start at the beginning when `at_top`, otherwise at the current
    /// end of the file. Opening an open tailer is a no-op.
    pub fn open(&mut self, at_top: bool, out: &mut dyn Write) -> Result<(), TailError> {
        match self.phase {
            Phase::Open(_) => return Ok(()),
            Phase::Closed => {
                return Err(TailError::Closed {
                    path: self.path.clone(),
                })
            }
            Phase::Unopened => {}
        }

        self.open_at(at_top)?;
        let message = self.color_line(&format!("Following log file: {}", self.path));
        writeln!(out, "[+ LOG] {} {}", self.label, message).map_err(TailError::Output)?;
        Ok(())
    }

    fn open_at(&mut self, at_top: bool) -> Result<(), TailError> {
        if !Path::new(&self.path).is_file() {
            return Err(TailError::NotFound {
                path: self.path.clone(),
            });
        }

        let mut file = File::open(&self.path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => TailError::NotFound {
                path: self.path.clone(),
            },
            _ => TailError::io(&self.path, e),
        })?;
        let offset = if at_top {
            0
        } else {
            file.seek(SeekFrom::End(0))
                .map_err(|e| TailError::io(&self.path, e))?
        };

        debug!(path = %self.path, offset, at_top, "opened log file");
        self.phase = Phase::Open(TailState {
            file,
            offset,
            partial: Vec::new(),
            pending: None,
            last_columns: None,
        });
        Ok(())
    }

    /// Read everything appended since the last call and emit passing lines.
    ///
    /// An unopened tailer is opened at the end of the file first. Returns
    /// the number of logical lines written.
    pub fn read_new(&mut self, out: &mut dyn Write, rules: &LineRules) -> Result<usize, TailError> {
        match self.phase {
            Phase::Closed => {
                return Err(TailError::Closed {
                    path: self.path.clone(),
                })
            }
            Phase::Unopened => self.open_at(false)?,
            Phase::Open(_) => {}
        }
        let Phase::Open(state) = &mut self.phase else {
            return Ok(0);
        };

        let len = state
            .file
            .metadata()
            .map_err(|e| TailError::io(&self.path, e))?
            .len();
        if len < state.offset {
            info!(path = %self.path, len, offset = state.offset, "file truncated, reading from start");
            state.offset = 0;
            state.partial.clear();
        }
        if len > state.offset {
            state
                .file
                .seek(SeekFrom::Start(state.offset))
                .map_err(|e| TailError::io(&self.path, e))?;
        }

        let mut emitted = 0;
        let mut saw_lines = false;
        let mut chunk = Vec::new();
        while state.offset < len {
            if chunk.is_empty() {
                chunk.resize(READ_CHUNK_BYTES, 0);
            }
            let want = (len - state.offset).min(READ_CHUNK_BYTES as u64) as usize;
            let read = state
                .file
                .read(&mut chunk[..want])
                .map_err(|e| TailError::io(&self.path, e))?;
            if read == 0 {
                break;
            }
            state.offset += read as u64;
            state.partial.extend_from_slice(&chunk[..read]);

            let mut complete = match state.partial.iter().rposition(|b| *b == b'\n') {
                Some(pos) => {
                    let rest = state.partial.split_off(pos + 1);
                    std::mem::replace(&mut state.partial, rest)
                }
                None => Vec::new(),
            };
            if state.partial.len() > MAX_PARTIAL_BYTES {
                debug!(path = %self.path, bytes = state.partial.len(), "overlong line, emitting unterminated");
                complete.append(&mut state.partial);
                complete.push(b'\n');
            }

            // `complete` is empty or ends with a newline
            let Some((_, body)) = complete.split_last() else {
                continue;
            };
            trace!(path = %self.path, bytes = read, "read new data");
            for raw in body.split(|b| *b == b'\n') {
                saw_lines = true;
                let line = String::from_utf8_lossy(raw);
                if let Some(done) = state.push_physical(&self.config.line_format, line.trim_end()) {
                    emitted += emit(out, &self.label, &self.config, rules, done)?;
                }
            }
        }

        if !saw_lines {
            if let Some(done) = state.pending.take() {
                emitted += emit(out, &self.label, &self.config, rules, done)?;
            }
        }

        Ok(emitted)
    }

    /// Flush what is pending, announce the close and release the file.
    ///
    /// Closing a tailer that is not open only marks it closed.
    pub fn close(&mut self, out: &mut dyn Write, rules: &LineRules) -> Result<(), TailError> {
        let phase = std::mem::replace(&mut self.phase, Phase::Closed);
        let Phase::Open(mut state) = phase else {
            return Ok(());
        };

        if !state.partial.is_empty() {
            let tail = String::from_utf8_lossy(&state.partial).into_owned();
            if let Some(done) = state.push_physical(&self.config.line_format, tail.trim_end()) {
                emit(out, &self.label, &self.config, rules, done)?;
            }
        }
        if let Some(done) = state.pending.take() {
            emit(out, &self.label, &self.config, rules, done)?;
        }

        let message = self.color_line(&format!("Unfollowing log file: {}", self.path));
        writeln!(out, "[- LOG] {} {}", self.label, message).map_err(TailError::Output)?;
        debug!(path = %self.path, offset = state.offset, "closed log file");
        Ok(())
    }

    fn color_line(&self, text: &str) -> String {
        if self.config.full_color {
            render(text, self.config.color)
        } else {
            text.to_string()
        }
    }
}

/// Columns of `line` when it matches `format` at its start.
fn parse_columns(format: &Regex, line: &str) -> Option<Columns> {
    let caps = format.captures(line)?;
    if caps.get(0).map(|m| m.start()) != Some(0) {
        return None;
    }
    let columns = format
        .capture_names()
        .flatten()
        .filter_map(|name| caps.name(name).map(|m| (name.to_string(), m.as_str().to_string())))
        .collect();
    Some(columns)
}

fn emit(
    out: &mut dyn Write,
    label: &str,
    config: &TailerConfig,
    rules: &LineRules,
    line: LogicalLine,
) -> Result<usize, TailError> {
    if !rules.filters.matches(&line.columns) {
        trace!(text = %line.text, "line filtered out");
        return Ok(0);
    }
    let base = config.full_color.then_some(config.color);
    let body = highlight(&line.text, rules.highlight.as_ref(), base);
    writeln!(out, "{} {}", label, body).map_err(TailError::Output)?;
    Ok(1)
}
