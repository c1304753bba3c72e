//! ptail core library
//!
//! Finds the log files that running processes hold open and multiplexes
//! their new lines into one colored stream:
//! - Shell command execution (local, sudo, ssh)
//! - Process and log discovery
//! - Per-log colors, line formats and labels
//! - Incremental tailing with continuation, filtering and highlighting
//!
//! The binary entry point is in `main.rs`.

pub mod cli;
pub mod collect;
pub mod color;
pub mod exit_codes;
pub mod log_meta;
pub mod logging;
pub mod signals;
pub mod tail;

// Re-export test utilities for integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod mock_probe;
