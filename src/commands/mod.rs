pub mod format;
pub mod handlers;
pub mod symlinks;

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use crate::cli::GlobalOpts;
use crate::config::{self, Config};
use crate::context::Context;
use crate::error::ConfigError;
use crate::logging::{Log, Logger};

/// Environment variable overriding the home directory links are created under.
pub const HOME_ENV: &str = "CFGCTL_HOME";

/// Shared state produced by the common command setup sequence.
///
/// Resolves the repository root and home directory and loads `cfgctl.toml`
/// so that each command does not have to repeat the boilerplate.
#[derive(Debug)]
pub struct CommandSetup {
    /// Context shared by the command.
    pub ctx: Context,
}

impl CommandSetup {
    /// Resolve root and home, load configuration and build the [`Context`].
    ///
    /// # Errors
    ///
    /// Returns an error if the root or home cannot be determined or the
    /// configuration file fails to parse.
    pub fn init(global: &GlobalOpts, log: Arc<dyn Log>, cancel: Arc<AtomicBool>) -> Result<Self> {
        let version = option_env!("CFGCTL_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"));
        log.debug(&format!("cfgctl {version}"));

        let root = resolve_root(global)?;
        let home = resolve_home()?;
        log.debug(&format!("root: {}", root.display()));
        log.debug(&format!("home: {}", home.display()));

        log.stage("Loading configuration");
        let config = Config::load(&root, &home)?;
        log.debug(&format!(
            "ignoring: {}",
            config
                .ignore
                .iter()
                .map(|n| n.to_string_lossy())
                .collect::<Vec<_>>()
                .join(", ")
        ));
        log.info(&format!(
            "loaded {} handler(s){}",
            config.handlers.len(),
            if root.join(config::FILE_NAME).is_file() {
                format!(" with {}", config::FILE_NAME)
            } else {
                String::new()
            }
        ));

        let timeout = global.timeout();
        let ctx = Context::new(config, log)
            .with_parallel(global.parallel_opts(cancel))
            .with_dry_run(global.dry_run)
            .with_timeout(timeout);
        Ok(Self { ctx })
    }
}

/// Resolve the repository root.
///
/// Uses `--root` (or `CFGCTL_ROOT`) when given, otherwise the working tree of
/// the git repository containing the current directory, otherwise the current
/// directory itself.
///
/// # Errors
///
/// Returns an error if the chosen root does not exist or is not a directory.
pub fn resolve_root(global: &GlobalOpts) -> Result<PathBuf, ConfigError> {
    let candidate = match global.root {
        Some(ref root) => root.clone(),
        None => {
            let cwd = std::env::current_dir().map_err(|e| ConfigError::InvalidRoot {
                path: PathBuf::from("."),
                reason: e.to_string(),
            })?;
            discover_worktree(&cwd).unwrap_or(cwd)
        }
    };
    canonical_dir(&candidate)
}

fn discover_worktree(start: &Path) -> Option<PathBuf> {
    let repo = git2::Repository::discover(start).ok()?;
    repo.workdir().map(Path::to_path_buf)
}

fn canonical_dir(path: &Path) -> Result<PathBuf, ConfigError> {
    let resolved = dunce::canonicalize(path).map_err(|e| ConfigError::InvalidRoot {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    if !resolved.is_dir() {
        return Err(ConfigError::InvalidRoot {
            path: resolved,
            reason: "not a directory".to_string(),
        });
    }
    Ok(resolved)
}

/// Resolve the home directory from `CFGCTL_HOME`, falling back to `HOME`.
///
/// # Errors
///
/// Returns [`ConfigError::NoHome`] when neither variable is set to a
/// non-empty value.
pub fn resolve_home() -> Result<PathBuf, ConfigError> {
    home_from(
        std::env::var_os(HOME_ENV),
        std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE")),
    )
}

fn home_from(
    explicit: Option<std::ffi::OsString>,
    fallback: Option<std::ffi::OsString>,
) -> Result<PathBuf, ConfigError> {
    explicit
        .filter(|v| !v.is_empty())
        .or_else(|| fallback.filter(|v| !v.is_empty()))
        .map(PathBuf::from)
        .ok_or(ConfigError::NoHome)
}

/// Print the summary and bail if any task failed.
///
/// # Errors
///
/// Returns an error if one or more tasks recorded a failure.
pub fn finish(log: &Logger) -> Result<()> {
    log.print_summary();

    let count = log.failure_count();
    if count > 0 {
        anyhow::bail!("{count} task(s) failed");
    }
    Ok(())
}
