//! Exit codes for the ptail CLI.
//!
//! Exit code ranges:
//! - 0-6: operational outcomes
//! - 10-19: user/environment errors (recoverable by user action)
//! - 20-29: internal errors

/// Exit codes for ptail runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Run finished normally
    Clean = 0,

    /// Stopped by SIGINT/SIGTERM
    Interrupted = 6,

    /// Invalid arguments
    ArgsError = 10,

    /// Invalid log setup file
    ConfigError = 11,

    /// Internal error (bug - please report)
    InternalError = 20,

    /// Writing output failed
    IoError = 21,
}

impl ExitCode {
    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn is_success(self) -> bool {
        matches!(self, ExitCode::Clean | ExitCode::Interrupted)
    }

    /// Codes 10-19.
    pub fn is_user_error(self) -> bool {
        (10..20).contains(&self.as_i32())
    }

    /// Codes 20 and above.
    pub fn is_internal_error(self) -> bool {
        self.as_i32() >= 20
    }

    pub fn code_name(&self) -> &'static str {
        match self {
            ExitCode::Clean => "OK_CLEAN",
            ExitCode::Interrupted => "OK_INTERRUPTED",
            ExitCode::ArgsError => "ERR_ARGS",
            ExitCode::ConfigError => "ERR_CONFIG",
            ExitCode::InternalError => "ERR_INTERNAL",
            ExitCode::IoError => "ERR_IO",
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code_name(), self.as_i32())
    }
}
