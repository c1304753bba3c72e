//! Shell command runner for local, sudo and ssh execution.
//!
//! Every probe ptail performs (process listing, fd enumeration, file type
//! detection, host name lookup) is a shell command, so the same probe can
//! run directly, as another user via `sudo`, or on a remote host via `ssh`.
//!
//! Execution matrix:
//!
//! | user | host | transport                              |
//! |------|------|----------------------------------------|
//! | -    | -    | `<shell> -c <cmd>`                     |
//! | set  | -    | `sudo -u <user> <shell> -c <cmd>`      |
//! | any  | set  | `ssh -o ... <user>@<host> <cmd>`       |
//!
//! Failed commands never surface as `Err`: the caller always receives a
//! [`CommandOutput`] and decides what a failure means.
//!
//! # Example
//!
//! ```ignore
//! use ptail_core::collect::command_runner::{CommandRunner, ExecContext};
//!
//! let runner = CommandRunner::with_defaults();
//! let out = runner.execute("uname -n", &ExecContext::local());
//! if out.success {
//!     println!("{}", out.stdout.unwrap_or_default());
//! }
//! ```

use std::collections::BTreeMap;
use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, instrument, trace, warn};

/// Default timeout per command in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default maximum output size in bytes (10MB).
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

/// Default shell used to interpret commands.
pub const DEFAULT_SHELL: &str = "bash";

/// Grace period between SIGTERM and SIGKILL in milliseconds.
const SIGTERM_GRACE_MS: u64 = 500;

/// Non-interactive, fail-fast ssh options.
pub const SSH_OPTIONS: [(&str, &str); 3] = [
    ("BatchMode", "yes"),
    ("ConnectTimeout", "3"),
    ("LogLevel", "ERROR"),
];

/// Prefix that makes a pipeline fail when any stage fails.
const PIPEFAIL_PREFIX: &str = "set -e; set -o pipefail; ";

/// How a command is transported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecType {
    Direct,
    Sudo,
    Ssh,
}

impl std::fmt::Display for ExecType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecType::Direct => write!(f, "direct"),
            ExecType::Sudo => write!(f, "sudo"),
            ExecType::Ssh => write!(f, "ssh"),
        }
    }
}

/// Rule deciding whether a finished command counts as successful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SuccessPolicy {
    /// Exit 0 is success. A non-zero exit is still success when nothing
    /// was written to stderr (`grep`/`pgrep` style "no match" exits).
    /// Signals, timeouts and spawn failures always fail.
    #[default]
    QuietNonZero,
    /// Only exit 0 is success.
    ZeroExitOnly,
}

impl SuccessPolicy {
    /// Classify a completed command.
    ///
    /// `return_code` follows the convention of negative values for
    /// signal-terminated processes.
    pub fn is_success(self, return_code: i32, stderr: Option<&str>) -> bool {
        if return_code == 0 {
            return true;
        }
        if return_code < 0 {
            return false;
        }
        match self {
            SuccessPolicy::QuietNonZero => stderr.is_none(),
            SuccessPolicy::ZeroExitOnly => false,
        }
    }
}

/// Who runs the command, and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecContext {
    pub user: Option<String>,
    pub host: Option<String>,
    /// Extra environment variables.
    pub env: BTreeMap<String, String>,
    pub shell: String,
}

impl Default for ExecContext {
    fn default() -> Self {
        Self {
            user: None,
            host: None,
            env: BTreeMap::new(),
            shell: DEFAULT_SHELL.to_string(),
        }
    }
}

impl ExecContext {
    /// Run commands directly on this host as the current user.
    pub fn local() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    /// Transport implied by the user/host combination.
    pub fn exec_type(&self) -> ExecType {
        match (&self.user, &self.host) {
            (_, Some(_)) => ExecType::Ssh,
            (Some(_), None) => ExecType::Sudo,
            (None, None) => ExecType::Direct,
        }
    }

    /// Whether commands run in this process's own pid namespace.
    pub fn is_local_host(&self) -> bool {
        self.host.is_none()
    }
}

/// Fully resolved program and arguments for one execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub exec_type: ExecType,
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    /// Build the invocation for `command` in `ctx`.
    pub fn build(command: &str, ctx: &ExecContext) -> Self {
        let command = with_pipefail(command);

        match ctx.exec_type() {
            ExecType::Direct => Self {
                exec_type: ExecType::Direct,
                program: ctx.shell.clone(),
                args: vec!["-c".to_string(), command],
            },
            ExecType::Sudo => Self {
                exec_type: ExecType::Sudo,
                program: "sudo".to_string(),
                args: vec![
                    "-u".to_string(),
                    ctx.user.clone().unwrap_or_default(),
                    ctx.shell.clone(),
                    "-c".to_string(),
                    command,
                ],
            },
            ExecType::Ssh => {
                let mut args = Vec::with_capacity(SSH_OPTIONS.len() * 2 + 2);
                for (key, value) in SSH_OPTIONS {
                    args.push("-o".to_string());
                    args.push(format!("{}={}", key, value));
                }
                let user = ctx.user.clone().unwrap_or_else(current_user);
                let host = ctx.host.clone().unwrap_or_default();
                args.push(format!("{}@{}", user, host));

                let exports: String = ctx
                    .env
                    .iter()
                    .map(|(k, v)| format!("export {}={}; ", k, shell_quote(v)))
                    .collect();
                args.push(format!(
                    "{}{} -c {}",
                    exports,
                    ctx.shell,
                    shell_quote(&command)
                ));

                Self {
                    exec_type: ExecType::Ssh,
                    program: "ssh".to_string(),
                    args,
                }
            }
        }
    }

    /// Single-line rendering for logs.
    pub fn display(&self) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.args.iter().map(|a| {
            if a.contains(char::is_whitespace) {
                shell_quote(a)
            } else {
                a.clone()
            }
        }));
        parts.join(" ")
    }
}

/// Result of one command execution.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Command as requested (before transport wrapping).
    pub command: String,
    pub exec_type: ExecType,
    pub success: bool,
    /// Trimmed stdout, `None` when empty.
    pub stdout: Option<String>,
    /// Trimmed stderr, `None` when empty.
    pub stderr: Option<String>,
    /// Exit code, `-signal` when killed, `errno` (or -1) on spawn failure.
    pub return_code: i32,
    pub truncated: bool,
    pub timed_out: bool,
    pub duration: Duration,
}

impl CommandOutput {
    /// stdout or the empty string.
    pub fn stdout_str(&self) -> &str {
        self.stdout.as_deref().unwrap_or("")
    }

    /// stderr or the empty string.
    pub fn stderr_str(&self) -> &str {
        self.stderr.as_deref().unwrap_or("")
    }
}

/// Runner configuration.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub timeout: Duration,
    pub max_output_bytes: usize,
    pub success_policy: SuccessPolicy,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            success_policy: SuccessPolicy::default(),
        }
    }
}

/// Executes shell commands and captures their output.
#[derive(Debug, Clone, Default)]
pub struct CommandRunner {
    config: RunnerConfig,
}

impl CommandRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::default()
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Execute `command` in `ctx`.
    #[instrument(skip(self, ctx), fields(exec_type = %ctx.exec_type()))]
    pub fn execute(&self, command: &str, ctx: &ExecContext) -> CommandOutput {
        let invocation = Invocation::build(command, ctx);
        debug!(invocation = %invocation.display(), "running command");

        let start = Instant::now();
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args);
        if invocation.exec_type != ExecType::Ssh {
            cmd.envs(&ctx.env);
        }

        let mut child = match cmd
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                warn!(command, error = %e, "command failed to spawn");
                return CommandOutput {
                    command: command.to_string(),
                    exec_type: invocation.exec_type,
                    success: false,
                    stdout: None,
                    stderr: Some(e.to_string()),
                    return_code: e.raw_os_error().unwrap_or(-1),
                    truncated: false,
                    timed_out: false,
                    duration: start.elapsed(),
                };
            }
        };

        let captured = self.execute_with_timeout(&mut child);
        let duration = start.elapsed();

        let output = match captured {
            Ok(captured) => {
                let stdout = non_empty_trimmed(&captured.stdout);
                let stderr = non_empty_trimmed(&captured.stderr);
                let return_code = if captured.timed_out {
                    -libc::SIGTERM
                } else {
                    return_code_of(captured.status)
                };
                let success = !captured.timed_out
                    && self
                        .config
                        .success_policy
                        .is_success(return_code, stderr.as_deref());
                CommandOutput {
                    command: command.to_string(),
                    exec_type: invocation.exec_type,
                    success,
                    stdout,
                    stderr,
                    return_code,
                    truncated: captured.truncated,
                    timed_out: captured.timed_out,
                    duration,
                }
            }
            Err(e) => CommandOutput {
                command: command.to_string(),
                exec_type: invocation.exec_type,
                success: false,
                stdout: None,
                stderr: Some(e.to_string()),
                return_code: e.raw_os_error().unwrap_or(-1),
                truncated: false,
                timed_out: false,
                duration,
            },
        };

        debug!(
            command,
            success = output.success,
            return_code = output.return_code,
            duration_ms = duration.as_millis() as u64,
            stderr = output.stderr_str(),
            "command finished"
        );
        output
    }

    /// Wait for a child while draining its pipes, enforcing the timeout and output cap.
    fn execute_with_timeout(&self, child: &mut Child) -> std::io::Result<Captured> {
        let deadline = Instant::now() + self.config.timeout;
        let max_output = self.config.max_output_bytes;
        let mut captured = Captured::default();

        let mut stdout = child.stdout.take();
        let mut stderr = child.stderr.take();
        let mut chunk = vec![0u8; 8192];

        loop {
            if Instant::now() >= deadline {
                captured.timed_out = true;
                warn!(timeout = ?self.config.timeout, "command timed out, sending SIGTERM");
                kill_with_grace(child);
                break;
            }

            let mut did_read = false;
            if let Some(ref mut out) = stdout {
                if let Ok(n) = try_read_nonblocking(out, &mut chunk) {
                    did_read |= n > 0;
                    append_capped(&mut captured.stdout, &chunk[..n], max_output, &mut captured.truncated);
                }
            }
            if let Some(ref mut err) = stderr {
                if let Ok(n) = try_read_nonblocking(err, &mut chunk) {
                    did_read |= n > 0;
                    append_capped(&mut captured.stderr, &chunk[..n], max_output, &mut captured.truncated);
                }
            }

            match child.try_wait() {
                Ok(Some(status)) => {
                    if let Some(ref mut out) = stdout {
                        drain_to_limit(out, &mut captured.stdout, max_output, &mut captured.truncated)?;
                    }
                    if let Some(ref mut err) = stderr {
                        drain_to_limit(err, &mut captured.stderr, max_output, &mut captured.truncated)?;
                    }
                    trace!(status = ?status, "process exited");
                    captured.status = Some(status);
                    return Ok(captured);
                }
                Ok(None) => {
                    if !did_read {
                        thread::sleep(Duration::from_millis(5));
                    }
                }
                Err(e) => {
                    error!(error = %e, "failed to wait for child");
                    return Err(e);
                }
            }
        }

        captured.status = child.wait().ok();
        Ok(captured)
    }
}

#[derive(Debug, Default)]
struct Captured {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    status: Option<ExitStatus>,
    truncated: bool,
    timed_out: bool,
}

/// Prefix pipelines with strict-failure directives.
fn with_pipefail(command: &str) -> String {
    if command.contains('|') {
        format!("{}{}", PIPEFAIL_PREFIX, command)
    } else {
        command.to_string()
    }
}

/// Quote a string for POSIX shells.
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Name of the invoking user.
pub fn current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("LOGNAME"))
        .unwrap_or_else(|_| "root".to_string())
}

fn return_code_of(status: Option<ExitStatus>) -> i32 {
    let Some(status) = status else {
        return -1;
    };
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    -1
}

fn non_empty_trimmed(bytes: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(bytes);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn append_capped(buf: &mut Vec<u8>, data: &[u8], max: usize, truncated: &mut bool) {
    if data.is_empty() {
        return;
    }
    let space = max.saturating_sub(buf.len());
    let to_copy = data.len().min(space);
    buf.extend_from_slice(&data[..to_copy]);
    if data.len() > space {
        *truncated = true;
    }
}

/// Drain what is immediately available from a finished child's pipe.
///
/// Non-blocking so a grandchild still holding the pipe open cannot hang us.
#[cfg(unix)]
fn drain_to_limit<R: Read + std::os::unix::io::AsRawFd>(
    stream: &mut R,
    buf: &mut Vec<u8>,
    max: usize,
    truncated: &mut bool,
) -> std::io::Result<()> {
    let mut chunk = vec![0u8; 8192];
    loop {
        if *truncated {
            break;
        }
        match try_read_nonblocking(stream, &mut chunk) {
            Ok(0) => break,
            Ok(n) => append_capped(buf, &chunk[..n], max, truncated),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

#[cfg(not(unix))]
fn drain_to_limit(
    stream: &mut impl Read,
    buf: &mut Vec<u8>,
    max: usize,
    truncated: &mut bool,
) -> std::io::Result<()> {
    let mut rest = Vec::new();
    stream.read_to_end(&mut rest)?;
    append_capped(buf, &rest, max, truncated);
    Ok(())
}

/// Kill a process with SIGTERM, then SIGKILL after grace period.
#[cfg(unix)]
fn kill_with_grace(child: &mut Child) {
    let pid = child.id() as i32;

    unsafe {
        libc::kill(pid, libc::SIGTERM);
    }
    debug!(pid, "sent SIGTERM");

    thread::sleep(Duration::from_millis(SIGTERM_GRACE_MS));

    match child.try_wait() {
        Ok(Some(_)) => trace!(pid, "process exited after SIGTERM"),
        Ok(None) => {
            warn!(pid, "process did not exit after SIGTERM, sending SIGKILL");
            unsafe {
                libc::kill(pid, libc::SIGKILL);
            }
            let _ = child.wait();
        }
        Err(e) => error!(pid, error = %e, "failed to check process status"),
    }
}

#[cfg(not(unix))]
fn kill_with_grace(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

/// Try to read from a stream without blocking.
///
/// Sets O_NONBLOCK for the duration of the read, then restores the
/// original flags. Returns Ok(0) if no data is available.
#[cfg(unix)]
fn try_read_nonblocking<R: Read + std::os::unix::io::AsRawFd>(
    stream: &mut R,
    buf: &mut [u8],
) -> std::io::Result<usize> {
    let fd = stream.as_raw_fd();

    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(std::io::Error::last_os_error());
    }

    let was_nonblocking = (flags & libc::O_NONBLOCK) != 0;
    if !was_nonblocking {
        let result = unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) };
        if result < 0 {
            return Err(std::io::Error::last_os_error());
        }
    }

    let result = stream.read(buf);

    if !was_nonblocking {
        unsafe {
            libc::fcntl(fd, libc::F_SETFL, flags);
        }
    }

    match result {
        Ok(n) => Ok(n),
        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(0),
        Err(e) => Err(e),
    }
}

#[cfg(not(unix))]
fn try_read_nonblocking<R: Read>(stream: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    stream.read(buf)
}
