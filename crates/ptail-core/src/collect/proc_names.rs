//! Short display names for processes.
//!
//! The default name is the lowercase base name of the executable.
//! Interpreter front-ends hide the interesting part of the command line
//! behind the interpreter binary, so a [`ProcessNameStrategy`] may claim
//! such executables and dig the component name out of the arguments.

use std::path::Path;

/// Extracts a name for command lines whose executable it recognizes.
pub trait ProcessNameStrategy: Send + Sync {
    /// Whether this strategy handles `executable` (lowercase base name).
    fn handles(&self, executable: &str) -> bool;

    /// Short name for `command_line`.
    fn short_name(&self, command_line: &str) -> String;
}

/// JVM launcher: surfaces the most specific main class component.
///
/// `java -Xmx1g -cp /opt/x.jar org.apache.hive.service.server.HiveServer2`
/// becomes `HiveServer2`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JavaLauncherStrategy;

impl JavaLauncherStrategy {
    const FALLBACK: &'static str = "java";
    const SKIPPED_TOKEN_PARTS: [&'static str; 3] = ["runjar", "start", "://"];
    const SKIPPED_SEGMENTS: [&'static str; 6] = ["main", "org", "server", "templeton", "jar", "*"];
    const SKIPPED_PATH_PARTS: [&'static str; 3] = ["share", "java", "*"];

    fn is_candidate(token: &str) -> bool {
        if token.starts_with('-') || token.starts_with('/') || !token.contains('.') {
            return false;
        }
        let lower = token.to_lowercase();
        !Self::SKIPPED_TOKEN_PARTS.iter().any(|p| lower.contains(p))
    }

    fn meaningful_segment(token: &str) -> Option<&str> {
        let segment = token
            .rsplit('.')
            .map(str::trim)
            .find(|s| !s.is_empty() && !Self::SKIPPED_SEGMENTS.contains(&s.to_lowercase().as_str()))?;

        if segment.contains('/') {
            segment
                .rsplit('/')
                .find(|p| !p.is_empty() && !Self::SKIPPED_PATH_PARTS.contains(&p.to_lowercase().as_str()))
        } else {
            Some(segment)
        }
    }
}

impl ProcessNameStrategy for JavaLauncherStrategy {
    fn handles(&self, executable: &str) -> bool {
        executable == "java"
    }

    fn short_name(&self, command_line: &str) -> String {
        let args: Vec<&str> = command_line.split_whitespace().skip(1).collect();
        args.into_iter()
            .rev()
            .filter(|t| Self::is_candidate(t))
            .find_map(Self::meaningful_segment)
            .unwrap_or(Self::FALLBACK)
            .to_string()
    }
}

/// Lowercase base name of the first command-line token.
pub fn executable_name(command_line: &str) -> String {
    let first = command_line.split_whitespace().next().unwrap_or_default();
    Path::new(first)
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_else(|| first.to_lowercase())
}

/// Strategy chain producing short process names.
pub struct ProcessNamer {
    strategies: Vec<Box<dyn ProcessNameStrategy>>,
}

impl std::fmt::Debug for ProcessNamer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessNamer")
            .field("strategies", &self.strategies.len())
            .finish()
    }
}

impl Default for ProcessNamer {
    fn default() -> Self {
        Self::new().with_strategy(JavaLauncherStrategy)
    }
}

impl ProcessNamer {
    /// Namer without strategies.
    pub fn new() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    pub fn with_strategy(mut self, strategy: impl ProcessNameStrategy + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    pub fn short_name(&self, command_line: &str) -> String {
        let executable = executable_name(command_line);
        self.strategies
            .iter()
            .find(|s| s.handles(&executable))
            .map(|s| s.short_name(command_line))
            .unwrap_or(executable)
    }
}
