//! Shared state handed to every command.
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::exec::{Executor, SystemExecutor};
use crate::logging::Log;
use crate::parallel::ParallelOpts;

/// Everything a command needs: configuration, output, processes, and
/// execution policy.
pub struct Context {
    /// Loaded configuration (root, home, ignores, handlers).
    pub config: Config,
    /// Logger for output and task recording.
    pub log: Arc<dyn Log>,
    /// Process runner (real or mocked).
    pub executor: Arc<dyn Executor>,
    /// Worker pool policy.
    pub parallel: ParallelOpts,
    /// Report what would change without changing it.
    pub dry_run: bool,
    /// Per-process timeout; overrides the config default when set.
    pub timeout: Option<Duration>,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("config", &self.config)
            .field("log", &"<dyn Log>")
            .field("executor", &"<dyn Executor>")
            .field("parallel", &self.parallel)
            .field("dry_run", &self.dry_run)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Context {
    /// Create a context using the real process runner, parallel execution
    /// and no dry run.
    #[must_use]
    pub fn new(config: Config, log: Arc<dyn Log>) -> Self {
        Self {
            config,
            log,
            executor: Arc::new(SystemExecutor),
            parallel: ParallelOpts::default(),
            dry_run: false,
            timeout: None,
        }
    }

    /// Replace the process runner.
    #[must_use]
    pub fn with_executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = executor;
        self
    }

    /// Replace the worker pool policy.
    #[must_use]
    pub fn with_parallel(mut self, parallel: ParallelOpts) -> Self {
        self.parallel = parallel;
        self
    }

    /// Enable or disable dry-run mode.
    #[must_use]
    pub const fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Set the per-process timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Repository root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.config.root
    }

    /// Home directory links are created under.
    #[must_use]
    pub fn home(&self) -> &Path {
        &self.config.home
    }

    /// Timeout to apply to each formatter process.
    #[must_use]
    pub fn effective_timeout(&self) -> Option<Duration> {
        self.timeout.or(self.config.timeout)
    }

    /// `~/.bashrc` style rendering of a home-side path.
    #[must_use]
    pub fn pretty_home(&self, path: &Path) -> String {
        path.strip_prefix(self.home()).map_or_else(
            |_| path.display().to_string(),
            |rel| Path::new("~").join(rel).display().to_string(),
        )
    }

    /// Repository-relative rendering of a path under the root.
    #[must_use]
    pub fn pretty_repo(&self, path: &Path) -> String {
        path.strip_prefix(self.root())
            .map_or_else(|_| path.display().to_string(), |rel| rel.display().to_string())
    }

    /// `<root>/home`, the subtree mirrored into the home directory.
    #[must_use]
    pub fn home_source(&self) -> PathBuf {
        self.config.home_source()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::MemoryLog;

    fn ctx() -> Context {
        Context::new(
            Config::defaults(Path::new("/repo"), Path::new("/home/u")),
            Arc::new(MemoryLog::new()),
        )
    }

    #[test]
    fn pretty_paths() {
        let ctx = ctx();
        assert_eq!(ctx.pretty_home(Path::new("/home/u/.bashrc")), "~/.bashrc");
        assert_eq!(ctx.pretty_home(Path::new("/etc/hosts")), "/etc/hosts");
        assert_eq!(ctx.pretty_repo(Path::new("/repo/home/.bashrc")), "home/.bashrc");
    }

    #[test]
    fn explicit_timeout_overrides_config() {
        let mut ctx = ctx();
        ctx.config.timeout = Some(Duration::from_secs(60));
        assert_eq!(ctx.effective_timeout(), Some(Duration::from_secs(60)));
        let ctx = ctx.with_timeout(Some(Duration::from_secs(5)));
        assert_eq!(ctx.effective_timeout(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn debug_hides_trait_objects() {
        let rendered = format!("{:?}", ctx().with_dry_run(true));
        assert!(rendered.contains("<dyn Log>"));
        assert!(rendered.contains("dry_run: true"));
    }
}
