//! External process execution.
//!
//! Every child is owned by a [`ChildGuard`] for its whole life: whichever way
//! the caller leaves (success, error, timeout, unwinding) the process is
//! killed if still running and then reaped.
use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::error::ExecError;

/// How often a child with a deadline is polled for exit.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Result of a command execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecResult {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub success: bool,
    pub code: Option<i32>,
}

impl ExecResult {
    /// Standard output decoded lossily, one entry per line.
    #[must_use]
    pub fn stdout_lines(&self) -> Vec<String> {
        lossy_lines(&self.stdout)
    }

    /// Standard error decoded lossily, one entry per line.
    #[must_use]
    pub fn stderr_lines(&self) -> Vec<String> {
        lossy_lines(&self.stderr)
    }

    /// Standard error decoded lossily.
    #[must_use]
    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

fn lossy_lines(bytes: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(bytes)
        .lines()
        .map(str::to_string)
        .collect()
}

/// Seam between the formatter layer and real processes.
///
/// Production code uses [`SystemExecutor`]; unit tests substitute a mock.
#[cfg_attr(test, mockall::automock)]
pub trait Executor: Send + Sync {
    /// Resolve `program` on the search path.
    fn resolve(&self, program: &str) -> Option<PathBuf>;

    /// Run `program` with `args` from `cwd`, capturing both output streams.
    ///
    /// A non-zero exit is reported through [`ExecResult::success`], not as an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned, its output cannot be
    /// collected, or it is still running when `timeout` elapses.
    fn run(
        &self,
        program: &Path,
        args: &[OsString],
        cwd: &Path,
        timeout: Option<Duration>,
    ) -> Result<ExecResult, ExecError>;
}

/// [`Executor`] backed by [`std::process::Command`] and the `which` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemExecutor;

impl Executor for SystemExecutor {
    fn resolve(&self, program: &str) -> Option<PathBuf> {
        which::which(program).ok()
    }

    fn run(
        &self,
        program: &Path,
        args: &[OsString],
        cwd: &Path,
        timeout: Option<Duration>,
    ) -> Result<ExecResult, ExecError> {
        run_captured(program, args, cwd, timeout)
    }
}

/// Kills (if needed) and reaps the wrapped child when dropped.
struct ChildGuard {
    child: Child,
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if matches!(self.child.try_wait(), Ok(None)) {
            let _ = self.child.kill();
        }
        let _ = self.child.wait();
    }
}

/// Spawn `program` in `cwd`, drain stdout and stderr on helper threads, and
/// wait for it, killing it once `timeout` elapses.
///
/// # Errors
///
/// See [`Executor::run`].
pub fn run_captured(
    program: &Path,
    args: &[OsString],
    cwd: &Path,
    timeout: Option<Duration>,
) -> Result<ExecResult, ExecError> {
    let label = program.display().to_string();
    let child = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| ExecError::Spawn {
            program: label.clone(),
            source,
        })?;
    let mut guard = ChildGuard { child };

    let stdout = guard.child.stdout.take().map(drain);
    let stderr = guard.child.stderr.take().map(drain);

    let status = wait(&mut guard.child, timeout, &label)?;

    let io_err = |source| ExecError::Io {
        program: label.clone(),
        source,
    };
    let stdout = collect(stdout).map_err(io_err)?;
    let stderr = collect(stderr).map_err(io_err)?;

    Ok(ExecResult {
        stdout,
        stderr,
        success: status.success(),
        code: status.code(),
    })
}

fn drain(mut stream: impl Read + Send + 'static) -> JoinHandle<std::io::Result<Vec<u8>>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf)?;
        Ok(buf)
    })
}

fn collect(handle: Option<JoinHandle<std::io::Result<Vec<u8>>>>) -> std::io::Result<Vec<u8>> {
    match handle {
        None => Ok(Vec::new()),
        Some(handle) => handle
            .join()
            .map_err(|_| std::io::Error::other("output reader thread panicked"))?,
    }
}

/// Wait for `child`, enforcing an optional deadline.
///
/// On timeout the child is killed here; reader threads are left to finish on
/// their own since a surviving grandchild may still hold the pipes open.
fn wait(child: &mut Child, timeout: Option<Duration>, label: &str) -> Result<ExitStatus, ExecError> {
    let io_err = |source| ExecError::Io {
        program: label.to_string(),
        source,
    };
    let Some(timeout) = timeout else {
        return child.wait().map_err(io_err);
    };

    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait().map_err(io_err)? {
            return Ok(status);
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Err(ExecError::TimedOut {
                program: label.to_string(),
                after: timeout,
            });
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}
