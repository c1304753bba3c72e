//! OS introspection seam.
//!
//! [`ProcessProbe`] is the set of operating system capabilities discovery
//! needs. [`ShellProbe`] answers them with shell commands run through a
//! [`CommandRunner`], so the same probe works locally, under `sudo` and
//! over `ssh`.

use super::command_runner::{shell_quote, CommandOutput, CommandRunner, ExecContext};
use super::types::{FileType, Selector};
use thiserror::Error;
use tracing::{debug, trace};

/// Loopback aliases always removed from short log names.
pub const LOOPBACK_ALIASES: [&str; 3] = ["127.0.0.1", "localhost.localdomain", "localhost"];

/// Commands whose output names this host.
const HOST_NAME_COMMANDS: [&str; 3] = ["hostname -f", "hostname", "uname -n"];

/// Command listing host addresses.
const HOST_ADDRESS_COMMAND: &str = "hostname -i";

/// Errors from probe commands.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    #[error("command `{command}` failed with code {return_code}: {stderr}")]
    CommandFailed {
        command: String,
        return_code: i32,
        stderr: String,
    },

    #[error("unparseable probe output: {0}")]
    Parse(String),
}

impl ProbeError {
    fn from_output(output: &CommandOutput) -> Self {
        ProbeError::CommandFailed {
            command: output.command.clone(),
            return_code: output.return_code,
            stderr: output.stderr_str().to_string(),
        }
    }
}

/// A process as listed by the OS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEntry {
    pub pid: u32,
    pub command_line: String,
}

impl ProcessEntry {
    pub fn new(pid: u32, command_line: impl Into<String>) -> Self {
        Self {
            pid,
            command_line: command_line.into(),
        }
    }
}

/// Operating system capabilities used by discovery.
pub trait ProcessProbe {
    /// Processes matching `selector`, excluding ptail itself.
    fn processes(&self, selector: &Selector) -> Result<Vec<ProcessEntry>, ProbeError>;

    /// Target paths of the open file descriptors of `pid`.
    fn open_files(&self, pid: u32) -> Result<Vec<String>, ProbeError>;

    /// Content class of `path`.
    fn file_type(&self, path: &str) -> Result<FileType, ProbeError>;

    /// Names and addresses identifying the probed host.
    fn host_names(&self) -> Vec<String>;
}

/// Probe backed by shell commands.
#[derive(Debug, Clone)]
pub struct ShellProbe {
    runner: CommandRunner,
    ctx: ExecContext,
}

impl ShellProbe {
    pub fn new(runner: CommandRunner, ctx: ExecContext) -> Self {
        Self { runner, ctx }
    }

    pub fn context(&self) -> &ExecContext {
        &self.ctx
    }

    fn run(&self, command: &str) -> Result<Option<String>, ProbeError> {
        let output = self.runner.execute(command, &self.ctx);
        if output.success {
            Ok(output.stdout)
        } else {
            Err(ProbeError::from_output(&output))
        }
    }
}

/// Command listing the processes for `selector`, `None` when nothing can match.
pub fn process_list_command(selector: &Selector) -> Option<String> {
    match selector {
        Selector::Pids(pids) if pids.is_empty() => None,
        Selector::Pids(pids) => {
            let pids: Vec<String> = pids.iter().map(u32::to_string).collect();
            Some(format!("ps -p {} -o pid=,args=", pids.join(",")))
        }
        Selector::Name(pattern) => Some(format!("pgrep -af {}", shell_quote(pattern))),
    }
}

/// Parse `<pid> <args>` lines.
///
/// Skips `own_pid` and any line echoing `command` (the shell wrapping the
/// listing command matches name patterns too).
pub fn parse_process_list(
    output: &str,
    command: &str,
    own_pid: Option<u32>,
) -> Result<Vec<ProcessEntry>, ProbeError> {
    let mut entries = Vec::new();
    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (pid, args) = match line.split_once(char::is_whitespace) {
            Some((pid, args)) => (pid, args.trim()),
            None => (line, ""),
        };
        let pid: u32 = pid
            .parse()
            .map_err(|_| ProbeError::Parse(format!("bad pid in process line: {}", line)))?;

        if Some(pid) == own_pid {
            trace!(pid, "skipping own process");
            continue;
        }
        if args.contains(command) {
            trace!(pid, "skipping probe wrapper");
            continue;
        }
        entries.push(ProcessEntry::new(pid, args));
    }
    Ok(entries)
}

/// Extract symlink targets from `ls -l /proc/<pid>/fd` output.
pub fn parse_fd_listing(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| line.split_once(" -> "))
        .map(|(_, target)| target.trim().to_string())
        .filter(|target| !target.is_empty())
        .collect()
}

impl ProcessProbe for ShellProbe {
    fn processes(&self, selector: &Selector) -> Result<Vec<ProcessEntry>, ProbeError> {
        let Some(command) = process_list_command(selector) else {
            return Ok(Vec::new());
        };
        let own_pid = self.ctx.is_local_host().then(std::process::id);
        let output = self.run(&command)?.unwrap_or_default();
        let entries = parse_process_list(&output, &command, own_pid)?;
        debug!(%selector, count = entries.len(), "listed processes");
        Ok(entries)
    }

    fn open_files(&self, pid: u32) -> Result<Vec<String>, ProbeError> {
        let output = self
            .run(&format!("ls -l /proc/{}/fd", pid))?
            .unwrap_or_default();
        Ok(parse_fd_listing(&output))
    }

    fn file_type(&self, path: &str) -> Result<FileType, ProbeError> {
        let command = format!("file -b -i {}", shell_quote(path));
        match self.run(&command)? {
            Some(output) => Ok(FileType::from_mime_output(&output)),
            None => Err(ProbeError::Parse(format!("no output from `{}`", command))),
        }
    }

    fn host_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for command in HOST_NAME_COMMANDS {
            if let Ok(Some(name)) = self.run(command) {
                names.push(name);
            }
        }
        if let Ok(Some(addresses)) = self.run(HOST_ADDRESS_COMMAND) {
            names.extend(addresses.split_whitespace().map(str::to_string));
        }
        names.extend(LOOPBACK_ALIASES.iter().map(|s| s.to_string()));
        names
    }
}
