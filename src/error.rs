//! Domain-specific error types for cfgctl.
//!
//! Library modules return the typed errors below; command handlers at the CLI
//! boundary convert them to [`anyhow::Error`] via the standard `?` operator.
//!
//! # Error hierarchy
//!
//! ```text
//! CfgctlError
//! ├── Walk(WalkError)        unreadable directories during traversal
//! ├── Format(FormatError)    missing or failing external formatters
//! ├── Symlink(SymlinkError)  link creation/removal I/O
//! └── Config(ConfigError)    cfgctl.toml, rules, root and home resolution
//! ```
//!
//! A home-side slot occupied by a real file and a missing repository-side
//! file are not errors; they are reported as
//! [`SkipReason`](crate::resources::SkipReason)s.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Top-level error type for cfgctl.
#[derive(Error, Debug)]
pub enum CfgctlError {
    /// Tree traversal error.
    #[error("walk error: {0}")]
    Walk(#[from] WalkError),

    /// Formatter selection or invocation error.
    #[error("format error: {0}")]
    Format(#[from] FormatError),

    /// Symlink synchronization error.
    #[error("symlink error: {0}")]
    Symlink(#[from] SymlinkError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// A directory could not be read while walking the tree.
///
/// Only the affected subtree is lost; files yielded before the failure and
/// sibling subtrees remain valid.
#[derive(Error, Debug)]
pub enum WalkError {
    /// Reading a directory entry failed (permission denied, removed mid-walk, …).
    #[error("cannot read {}: {source}", .path.display())]
    ReadDir {
        /// Path that failed, or the walk root when the walker did not report one.
        path: PathBuf,
        /// Underlying walker error.
        source: ignore::Error,
    },
}

/// Failures running an external process.
#[derive(Error, Debug)]
pub enum ExecError {
    /// The process could not be started.
    #[error("failed to execute {program}: {source}")]
    Spawn {
        /// Program that was launched.
        program: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Waiting on the process or reading its output failed.
    #[error("lost contact with {program}: {source}")]
    Io {
        /// Program that was running.
        program: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The process outlived its deadline and was killed.
    #[error("{program} timed out after {}s and was killed", .after.as_secs())]
    TimedOut {
        /// Program that was killed.
        program: String,
        /// The deadline that was exceeded.
        after: Duration,
    },
}

/// Errors from formatting a dispatch group.
#[derive(Error, Debug)]
pub enum FormatError {
    /// The handler's executable is not on the search path; nothing was touched.
    #[error("{handler}: '{program}' not found on PATH")]
    HandlerUnavailable {
        /// Handler name.
        handler: String,
        /// Executable that could not be resolved.
        program: String,
    },

    /// The formatter exited with a failure status; the target was left unmodified.
    #[error("{handler} failed on {target} (exit {}): {}", exit_label(.code), .stderr.trim())]
    FormatterFailed {
        /// Handler name.
        handler: String,
        /// File (rewrite mode) or file count (batch mode) the run covered.
        target: String,
        /// Exit code, `None` when terminated by a signal.
        code: Option<i32>,
        /// Captured standard error.
        stderr: String,
    },

    /// The process could not be run to completion.
    #[error("{handler}: {source}")]
    Exec {
        /// Handler name.
        handler: String,
        /// Underlying process error.
        source: ExecError,
    },

    /// Reading or writing a target file failed.
    #[error("{handler}: cannot rewrite {}: {source}", .path.display())]
    Io {
        /// Handler name.
        handler: String,
        /// File being rewritten.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Several files of a rewrite-in-place group failed.
    #[error("{handler}: {} of {total} file(s) failed", .failures.len())]
    Partial {
        /// Handler name.
        handler: String,
        /// Number of files in the group.
        total: usize,
        /// One error per failed file.
        failures: Vec<FormatError>,
    },
}

fn exit_label(code: &Option<i32>) -> String {
    code.map_or_else(|| "signal".to_string(), |c| c.to_string())
}

/// Errors while creating or removing links.
#[derive(Error, Debug)]
pub enum SymlinkError {
    /// A filesystem call failed.
    #[error("{op} {}: {source}", .path.display())]
    Io {
        /// Operation that failed (e.g. `"create link"`).
        op: &'static str,
        /// Path being operated on.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Errors from configuration loading and registry construction.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("cannot read config file {}: {source}", .path.display())]
    Io {
        /// Path of the config file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The config file is not valid TOML for the expected schema.
    #[error("invalid config file {}: {source}", .path.display())]
    Parse {
        /// Path of the config file.
        path: PathBuf,
        /// Underlying TOML error.
        source: toml::de::Error,
    },

    /// A match rule is not a valid regular expression.
    #[error("invalid match rule '{rule}': {source}")]
    InvalidRule {
        /// The offending rule text.
        rule: String,
        /// Underlying regex error.
        source: regex::Error,
    },

    /// A match rule was registered twice.
    #[error("match rule '{rule}' is already registered to {handler}")]
    DuplicateRule {
        /// The duplicated rule text.
        rule: String,
        /// Handler that owns the first registration.
        handler: String,
    },

    /// A handler definition has no rules and could never be selected.
    #[error("handler '{0}' has no match rules")]
    NoRules(String),

    /// The home directory could not be determined.
    #[error("cannot determine home directory: set HOME or CFGCTL_HOME")]
    NoHome,

    /// The repository root could not be determined or does not exist.
    #[error("cannot use {} as repository root: {reason}", .path.display())]
    InvalidRoot {
        /// Candidate root path.
        path: PathBuf,
        /// Why it was rejected.
        reason: String,
    },
}
