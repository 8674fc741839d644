// Shared helpers for integration tests.
//
// Provides a temporary repository plus a fake home directory, and a fluent
// builder so each integration test can set up an isolated environment
// without repeating filesystem boilerplate. The binary is always run with
// `--root`, `CFGCTL_HOME` and `XDG_CACHE_HOME` pointing inside the temp dir.
//
// Used by all integration test binaries that declare `mod common;`.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::Arc;

use cfgctl::Context;
use cfgctl::config::Config;
use cfgctl::logging::MemoryLog;
use cfgctl::parallel::ParallelOpts;

/// An isolated repository and home directory backed by a [`tempfile::TempDir`].
pub struct IntegrationTestContext {
    tmp: tempfile::TempDir,
}

impl IntegrationTestContext {
    /// Create empty `repo/home/` and `user/` directories.
    pub fn new() -> Self {
        let tmp = tempfile::tempdir().expect("create temp dir");
        std::fs::create_dir_all(tmp.path().join("repo/home")).expect("create repo/home");
        std::fs::create_dir_all(tmp.path().join("user")).expect("create user home");
        std::fs::create_dir_all(tmp.path().join("cache")).expect("create cache");
        Self { tmp }
    }

    /// Repository root.
    pub fn root(&self) -> PathBuf {
        self.tmp.path().join("repo")
    }

    /// Fake home directory.
    pub fn home(&self) -> PathBuf {
        self.tmp.path().join("user")
    }

    /// Read a repository file as a string.
    pub fn read(&self, rel: &str) -> String {
        std::fs::read_to_string(self.root().join(rel)).expect("read repository file")
    }

    /// Run the `cfgctl` binary against this repository.
    pub fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_cfgctl"))
            .arg("--root")
            .arg(self.root())
            .args(args)
            .env("CFGCTL_HOME", self.home())
            .env("XDG_CACHE_HOME", self.tmp.path().join("cache"))
            .env_remove("CFGCTL_ROOT")
            .output()
            .expect("run cfgctl")
    }

    /// Load the repository configuration and wrap it in a [`Context`] that
    /// logs to memory.
    pub fn context(&self, parallel: bool) -> (Context, Arc<MemoryLog>) {
        let config = Config::load(&self.root(), &self.home()).expect("load config");
        let log = Arc::new(MemoryLog::new());
        let opts = if parallel {
            ParallelOpts::default()
        } else {
            ParallelOpts::sequential()
        };
        let ctx = Context::new(config, log.clone()).with_parallel(opts);
        (ctx, log)
    }
}

/// Combined stdout and stderr of a finished run.
pub fn output_text(output: &Output) -> String {
    format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    )
}

/// Fluent builder for [`IntegrationTestContext`].
pub struct TestContextBuilder {
    ctx: IntegrationTestContext,
}

impl TestContextBuilder {
    /// Begin building a new context with empty directories.
    pub fn new() -> Self {
        Self {
            ctx: IntegrationTestContext::new(),
        }
    }

    /// Write `content` to `<repo>/<rel>`, creating parents.
    pub fn with_file(self, rel: &str, content: &str) -> Self {
        write(&self.ctx.root().join(rel), content);
        self
    }

    /// Write `content` to `<repo>/home/<rel>`, creating parents.
    pub fn with_home_file(self, rel: &str, content: &str) -> Self {
        write(&self.ctx.root().join("home").join(rel), content);
        self
    }

    /// Write `content` to `<home>/<rel>`, creating parents.
    pub fn with_user_file(self, rel: &str, content: &str) -> Self {
        write(&self.ctx.home().join(rel), content);
        self
    }

    /// Write `cfgctl.toml` at the repository root.
    pub fn with_config(self, content: &str) -> Self {
        write(&self.ctx.root().join("cfgctl.toml"), content);
        self
    }

    /// Finish building and return the configured context.
    pub fn build(self) -> IntegrationTestContext {
        self.ctx
    }
}

fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create parent");
    }
    std::fs::write(path, content).expect("write file");
}
