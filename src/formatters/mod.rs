//! Formatter selection and invocation.
//!
//! - [`registry`] maps match rules to handlers
//! - [`dispatch`] partitions walked files into one group per handler
//! - [`invoke`] runs a handler over its group
pub mod dispatch;
pub mod invoke;
pub mod registry;

use std::fmt;

use serde::Deserialize;

/// How a formatter consumes and produces file content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IoMode {
    /// One process per file; its standard output replaces the file content.
    #[serde(alias = "rewrite")]
    RewriteInPlace,
    /// One process for the whole group; the formatter edits files itself.
    #[default]
    Batch,
}

impl fmt::Display for IoMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RewriteInPlace => write!(f, "rewrite"),
            Self::Batch => write!(f, "batch"),
        }
    }
}

/// An external formatter: executable, fixed arguments and I/O mode.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HandlerDescriptor {
    /// Display name, e.g. `JSON`.
    pub name: String,
    /// Executable looked up on `PATH` at invocation time.
    pub program: String,
    /// Arguments placed before the file path(s).
    pub args: Vec<String>,
    /// Rewrite-in-place or batch.
    pub mode: IoMode,
}

impl HandlerDescriptor {
    /// Create a descriptor.
    #[must_use]
    pub fn new(name: &str, program: &str, args: &[&str], mode: IoMode) -> Self {
        Self {
            name: name.to_string(),
            program: program.to_string(),
            args: args.iter().map(ToString::to_string).collect(),
            mode,
        }
    }

    /// `"JSON (jq)"`: name plus program, for task lines.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} ({})", self.name, self.program)
    }

    /// The full command line as it will be run, without file arguments.
    #[must_use]
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct ModeOnly {
        mode: IoMode,
    }

    fn parse(s: &str) -> IoMode {
        toml::from_str::<ModeOnly>(&format!("mode = \"{s}\""))
            .expect("valid mode")
            .mode
    }

    #[test]
    fn io_mode_deserializes_both_spellings() {
        assert_eq!(parse("batch"), IoMode::Batch);
        assert_eq!(parse("rewrite"), IoMode::RewriteInPlace);
        assert_eq!(parse("rewrite-in-place"), IoMode::RewriteInPlace);
    }

    #[test]
    fn io_mode_rejects_unknown() {
        assert!(toml::from_str::<ModeOnly>("mode = \"stream\"").is_err());
    }

    #[test]
    fn descriptor_label_and_command_line() {
        let d = HandlerDescriptor::new("Shell", "shfmt", &["-i=2", "-w"], IoMode::Batch);
        assert_eq!(d.label(), "Shell (shfmt)");
        assert_eq!(d.command_line(), "shfmt -i=2 -w");
        assert_eq!(d.mode.to_string(), "batch");
    }
}
