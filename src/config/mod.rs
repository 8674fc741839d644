//! Repository configuration: `cfgctl.toml` plus built-in defaults.
pub mod handlers;
pub mod toml_loader;

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::walk::IgnoreSet;
use handlers::HandlerSpec;

/// Name of the optional config file at the repository root.
pub const FILE_NAME: &str = "cfgctl.toml";

/// Raw shape of `cfgctl.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    ignore: Vec<String>,
    timeout_secs: Option<u64>,
    #[serde(default)]
    replace_builtin: bool,
    #[serde(default, rename = "handler")]
    handlers: Vec<HandlerSpec>,
}

/// All loaded configuration for one run.
#[derive(Debug, Clone)]
pub struct Config {
    /// Repository root.
    pub root: PathBuf,
    /// Directory the `home/` subtree is linked into.
    pub home: PathBuf,
    /// Segment names pruned from every walk.
    pub ignore: IgnoreSet,
    /// Handlers in registration order.
    pub handlers: Vec<HandlerSpec>,
    /// Default per-process timeout.
    pub timeout: Option<Duration>,
}

impl Config {
    /// Load `<root>/cfgctl.toml` (if present) on top of the built-in defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if a handler
    /// declares no match rules.
    pub fn load(root: &Path, home: &Path) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml_loader::load_config(&root.join(FILE_NAME))?;

        if let Some(empty) = file.handlers.iter().find(|h| h.rules.is_empty()) {
            return Err(ConfigError::NoRules(empty.name.clone()));
        }

        let base = if file.replace_builtin {
            Vec::new()
        } else {
            handlers::builtin()
        };

        Ok(Self {
            root: root.to_path_buf(),
            home: home.to_path_buf(),
            ignore: IgnoreSet::default().with(file.ignore),
            handlers: handlers::merge(base, file.handlers),
            timeout: file.timeout_secs.map(Duration::from_secs),
        })
    }

    /// Built-in defaults only, without reading any file.
    #[must_use]
    pub fn defaults(root: &Path, home: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            home: home.to_path_buf(),
            ignore: IgnoreSet::default(),
            handlers: handlers::builtin(),
            timeout: None,
        }
    }

    /// `<root>/home`, the subtree mirrored into [`Config::home`].
    #[must_use]
    pub fn home_source(&self) -> PathBuf {
        self.root.join("home")
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use std::ffi::OsStr;
    use std::fs;

    fn load_with(contents: &str) -> Result<Config, ConfigError> {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(FILE_NAME), contents).unwrap();
        Config::load(dir.path(), Path::new("/home/test"))
    }

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path(), Path::new("/home/test")).unwrap();
        assert_eq!(config.handlers, handlers::builtin());
        assert_eq!(config.ignore, IgnoreSet::default());
        assert_eq!(config.timeout, None);
        assert_eq!(config.home_source(), dir.path().join("home"));
    }

    #[test]
    fn extra_ignores_and_timeout() {
        let config = load_with("ignore = [\"node_modules\"]\ntimeout_secs = 90\n").unwrap();
        assert!(config.ignore.contains(OsStr::new("node_modules")));
        assert!(config.ignore.contains(OsStr::new(".git")));
        assert_eq!(config.timeout, Some(Duration::from_secs(90)));
    }

    #[test]
    fn handler_entries_append_after_builtins() {
        let config = load_with(
            r#"
[[handler]]
name = "Markdown"
program = "mdformat"
rules = ['.*\.md$']
"#,
        )
        .unwrap();
        assert_eq!(config.handlers.len(), 8);
        assert_eq!(config.handlers[7].name, "Markdown");
    }

    #[test]
    fn replace_builtin_drops_table() {
        let config = load_with(
            r#"
replace_builtin = true

[[handler]]
name = "Upper"
program = "sh"
args = ["-c", "tr a-z A-Z < \"$1\"", "sh"]
mode = "rewrite"
rules = ['\.txt$']
"#,
        )
        .unwrap();
        assert_eq!(config.handlers.len(), 1);
        assert_eq!(config.handlers[0].args.len(), 3);
    }

    #[test]
    fn handler_without_rules_is_rejected() {
        let err = load_with(
            "[[handler]]\nname = \"Empty\"\nprogram = \"true\"\nrules = []\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::NoRules(ref n) if n == "Empty"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = load_with("ignroe = []\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
