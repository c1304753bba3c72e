//! Command-line surface.
//!
//! [`Cli`] is the clap definition; [`Cli::plan`] validates it into a
//! [`RunPlan`] with compiled patterns and an explicit [`Operation`].

use crate::collect::command_runner::{ExecContext, DEFAULT_SHELL};
use crate::collect::discovery::DEFAULT_LOG_FILTER;
use crate::collect::types::Selector;
use crate::logging::{LogFormat, LogLevel};
use crate::tail::filter::{FilterSet, LineRules};
use crate::tail::orchestrator::{ShowFormat, TailOptions, DEFAULT_REFRESH_SECS};
use clap::{ArgGroup, Args, Parser};
use ptail_config::{CONFIG_ENV_VAR, DEFAULT_CONFIG_FILE};
use regex::Regex;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Default seconds between tail cycles.
pub const DEFAULT_WAIT_SECS: f64 = 0.5;

/// Column matched by `--grep`.
pub const GREP_COLUMN: &str = "text";

/// Argument validation errors.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("invalid {what} pattern {pattern:?}: {source}")]
    InvalidPattern {
        what: &'static str,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("filter {0:?} must look like column=pattern")]
    MalformedFilter(String),

    #[error("{name} must be a non-negative number of seconds, got {value}")]
    InvalidDuration { name: &'static str, value: f64 },
}

/// Discover and tail log files opened by running processes
#[derive(Parser, Debug)]
#[command(name = "ptail")]
#[command(author, version, about, long_about = None)]
#[command(group(ArgGroup::new("selector").required(true).args(["pid", "name"])))]
pub struct Cli {
    #[command(flatten)]
    pub mode: ModeArgs,

    /// Select processes with these pids
    #[arg(short = 'p', long, num_args = 1..)]
    pub pid: Vec<u32>,

    /// Select processes whose command line matches this regex
    #[arg(short = 'N', long)]
    pub name: Option<String>,

    /// Log name filter (regex searched in open file paths)
    #[arg(short = 'L', long, default_value = DEFAULT_LOG_FILTER)]
    pub log_filter: String,

    /// Scan log files from the beginning
    #[arg(short = 'b', long)]
    pub from_top: bool,

    /// Log setup file (YAML)
    #[arg(short = 'c', long, env = CONFIG_ENV_VAR, default_value = DEFAULT_CONFIG_FILE)]
    pub config_file: PathBuf,

    #[command(flatten)]
    pub exec: ExecArgs,

    /// Seconds to wait for new lines between tail cycles
    #[arg(short = 'w', long, default_value_t = DEFAULT_WAIT_SECS)]
    pub wait: f64,

    /// Refresh the list of logs every N seconds
    #[arg(short = 'r', long, default_value_t = DEFAULT_REFRESH_SECS)]
    pub refresh_interval: f64,

    /// Highlight matches of this regex
    #[arg(short = 'H', long)]
    pub highlight: Option<String>,

    /// Color whole lines in the log color, not only labels
    #[arg(short = 'C', long)]
    pub full_color: bool,

    /// Structured filters: column=regex ...
    #[arg(short = 'F', long, num_args = 1.., conflicts_with = "grep")]
    pub filters: Vec<String>,

    /// Simple line filter, same as --filters text=REGEX with the default line format
    #[arg(short = 'G', long)]
    pub grep: Option<String>,

    /// Report format for --show-logs
    #[arg(long, default_value = "text")]
    pub format: ShowFormat,

    /// Run a single tail cycle and exit
    #[arg(long)]
    pub once: bool,

    /// Diagnostic log level (trace, debug, info, warn, error, off)
    #[arg(short = 'l', long)]
    pub log_level: Option<LogLevel>,

    /// Diagnostic log format (human, jsonl)
    #[arg(long)]
    pub log_format: Option<LogFormat>,
}

/// Show or follow.
#[derive(Args, Debug, Clone, Copy)]
#[group(multiple = false)]
pub struct ModeArgs {
    /// Show processes and their logs, then exit
    #[arg(short = 's', long)]
    pub show_logs: bool,

    /// Follow logs continuously (default)
    #[arg(short = 'f', long)]
    pub continuous: bool,
}

/// Where probe commands run.
#[derive(Args, Debug, Clone)]
pub struct ExecArgs {
    /// Run probe commands as this user (via sudo, or as the ssh user with --host)
    #[arg(short = 'u', long)]
    pub user: Option<String>,

    /// Probe processes on this host over ssh
    #[arg(long)]
    pub host: Option<String>,

    /// Shell interpreting probe commands
    #[arg(long, default_value = DEFAULT_SHELL)]
    pub shell: String,
}

impl ExecArgs {
    pub fn context(&self) -> ExecContext {
        let mut ctx = ExecContext::local().with_shell(self.shell.clone());
        ctx.user = self.user.clone();
        ctx.host = self.host.clone();
        ctx
    }
}

/// What the run does.
#[derive(Debug, Clone)]
pub enum Operation {
    Show(ShowFormat),
    Tail { wait: Duration, once: bool },
}

/// Validated run parameters.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub operation: Operation,
    pub selector: Selector,
    pub log_filter: Regex,
    pub exec: ExecContext,
    pub options: TailOptions,
    pub rules: LineRules,
}

impl Cli {
    pub fn plan(&self) -> Result<RunPlan, CliError> {
        let selector = match &self.name {
            Some(name) => {
                compile("name", name)?;
                Selector::Name(name.clone())
            }
            None => Selector::Pids(self.pid.clone()),
        };

        let operation = if self.mode.show_logs {
            Operation::Show(self.format)
        } else {
            Operation::Tail {
                wait: seconds("wait", self.wait)?,
                once: self.once,
            }
        };

        let filters = match &self.grep {
            Some(grep) => FilterSet::new().with(GREP_COLUMN, compile("grep", grep)?),
            None => parse_filters(&self.filters)?,
        };
        let highlight = self
            .highlight
            .as_deref()
            .map(|h| compile("highlight", h))
            .transpose()?;

        Ok(RunPlan {
            operation,
            selector,
            log_filter: compile("log filter", &self.log_filter)?,
            exec: self.exec.context(),
            options: TailOptions {
                refresh_interval: seconds("refresh interval", self.refresh_interval)?,
                from_top: self.from_top,
                full_color: self.full_color,
                simple_grep: self.grep.is_some(),
            },
            rules: LineRules::new(filters, highlight),
        })
    }
}

fn compile(what: &'static str, pattern: &str) -> Result<Regex, CliError> {
    Regex::new(pattern).map_err(|source| CliError::InvalidPattern {
        what,
        pattern: pattern.to_string(),
        source,
    })
}

fn seconds(name: &'static str, value: f64) -> Result<Duration, CliError> {
    Duration::try_from_secs_f64(value).map_err(|_| CliError::InvalidDuration { name, value })
}

/// Parse `column=pattern` arguments. Only the first `=` separates.
pub fn parse_filters(raw: &[String]) -> Result<FilterSet, CliError> {
    let mut filters = FilterSet::new();
    for item in raw {
        let (column, pattern) = item
            .split_once('=')
            .filter(|(column, _)| !column.trim().is_empty())
            .ok_or_else(|| CliError::MalformedFilter(item.clone()))?;
        filters.insert(column.trim(), compile("filter", pattern)?);
    }
    Ok(filters)
}
