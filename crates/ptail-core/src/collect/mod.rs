//! Process and log discovery.
//!
//! Everything here talks to the operating system through shell commands
//! so that discovery works the same locally, as another user and on a
//! remote host.

pub mod command_runner;
pub mod discovery;
pub mod file_types;
pub mod log_names;
pub mod probe;
pub mod proc_names;
pub mod types;

pub use command_runner::{
    CommandOutput, CommandRunner, ExecContext, ExecType, RunnerConfig, SuccessPolicy,
};
pub use discovery::{LogDiscovery, DEFAULT_LOG_FILTER};
pub use file_types::FileTypeCache;
pub use probe::{ProbeError, ProcessEntry, ProcessProbe, ShellProbe};
pub use proc_names::{JavaLauncherStrategy, ProcessNameStrategy, ProcessNamer};
pub use types::{FileType, LogDescriptor, ProcessDescriptor, Selector};
