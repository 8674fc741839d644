//! Run one handler over its dispatch group.
//!
//! In rewrite-in-place mode each file gets its own process and is only
//! written after that process exits successfully. A failing file is left
//! byte-for-byte untouched and the rest of the group still runs. In batch mode
//! one process receives every path and edits the files itself; its output is
//! only logged.
use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io::{Read as _, Seek as _, SeekFrom, Write as _};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{HandlerDescriptor, IoMode};
use crate::error::FormatError;
use crate::exec::{ExecResult, Executor};
use crate::logging::Log;

/// What one handler did to its group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationReport {
    /// Handler name.
    pub handler: String,
    /// Mode the handler ran in.
    pub mode: IoMode,
    /// Files in the group.
    pub files: usize,
    /// Files whose content changed (rewrite mode only).
    pub rewritten: usize,
    /// Files already formatted (rewrite mode only).
    pub unchanged: usize,
}

impl InvocationReport {
    /// One-line description for the summary.
    #[must_use]
    pub fn summary(&self) -> String {
        match self.mode {
            IoMode::RewriteInPlace => format!(
                "{} file(s), {} rewritten, {} unchanged",
                self.files, self.rewritten, self.unchanged
            ),
            IoMode::Batch => format!("{} file(s)", self.files),
        }
    }
}

/// Format `files` with `handler`, running it from `root`.
///
/// # Errors
///
/// - [`FormatError::HandlerUnavailable`] if the program is not on `PATH`;
///   no file is opened.
/// - In batch mode, the failure of the single invocation.
/// - In rewrite mode, the failure of the only failing file, or
///   [`FormatError::Partial`] when several files failed.
pub fn invoke(
    handler: &HandlerDescriptor,
    root: &Path,
    files: &[PathBuf],
    executor: &dyn Executor,
    log: &dyn Log,
    timeout: Option<Duration>,
) -> Result<InvocationReport, FormatError> {
    let program = executor
        .resolve(&handler.program)
        .ok_or_else(|| FormatError::HandlerUnavailable {
            handler: handler.name.clone(),
            program: handler.program.clone(),
        })?;
    log.info(&format!(
        "Running {} with [{}]",
        handler.label(),
        relative_list(root, files)
    ));
    log.debug(&format!(
        "{}: {} over {} file(s) using {}",
        handler.name,
        handler.mode,
        files.len(),
        program.display()
    ));

    let runner = Runner {
        handler,
        program: &program,
        root,
        executor,
        timeout,
    };
    match handler.mode {
        IoMode::RewriteInPlace => runner.rewrite_all(files, log),
        IoMode::Batch => runner.batch(files, log),
    }
}

fn relative_list(root: &Path, files: &[PathBuf]) -> String {
    files
        .iter()
        .map(|f| f.strip_prefix(root).unwrap_or(f).display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// One resolved handler bound to the directory it runs from.
struct Runner<'a> {
    handler: &'a HandlerDescriptor,
    program: &'a Path,
    root: &'a Path,
    executor: &'a dyn Executor,
    timeout: Option<Duration>,
}

impl Runner<'_> {
    fn base_args(&self) -> Vec<OsString> {
        self.handler.args.iter().map(OsString::from).collect()
    }

    fn exec(&self, args: &[OsString]) -> Result<ExecResult, FormatError> {
        self.executor
            .run(self.program, args, self.root, self.timeout)
            .map_err(|source| FormatError::Exec {
                handler: self.handler.name.clone(),
                source,
            })
    }

    fn rewrite_all(&self, files: &[PathBuf], log: &dyn Log) -> Result<InvocationReport, FormatError> {
        let name = &self.handler.name;
        let mut report = InvocationReport {
            handler: name.clone(),
            mode: IoMode::RewriteInPlace,
            files: files.len(),
            rewritten: 0,
            unchanged: 0,
        };
        let mut failures = Vec::new();

        for file in files {
            match self.rewrite_one(file) {
                Ok(true) => {
                    log.debug(&format!("{name}: rewrote {}", file.display()));
                    report.rewritten += 1;
                }
                Ok(false) => report.unchanged += 1,
                Err(e) => {
                    log.debug(&e.to_string());
                    failures.push(e);
                }
            }
        }

        if failures.len() > 1 {
            return Err(FormatError::Partial {
                handler: name.clone(),
                total: files.len(),
                failures,
            });
        }
        failures.pop().map_or(Ok(report), Err)
    }

    /// Run the formatter on one file and replace its content with the
    /// captured output. Returns whether the content changed.
    fn rewrite_one(&self, file: &Path) -> Result<bool, FormatError> {
        let io_err = |source| FormatError::Io {
            handler: self.handler.name.clone(),
            path: file.to_path_buf(),
            source,
        };

        let mut handle = OpenOptions::new()
            .read(true)
            .write(true)
            .open(file)
            .map_err(io_err)?;
        let mut current = Vec::new();
        handle.read_to_end(&mut current).map_err(io_err)?;

        let mut args = self.base_args();
        args.push(file.as_os_str().to_os_string());
        let result = self.exec(&args)?;

        if !result.success {
            return Err(FormatError::FormatterFailed {
                handler: self.handler.name.clone(),
                target: file.display().to_string(),
                code: result.code,
                stderr: result.stderr_text(),
            });
        }
        if result.stdout == current {
            return Ok(false);
        }
        replace_contents(&mut handle, &result.stdout).map_err(io_err)?;
        Ok(true)
    }

    fn batch(&self, files: &[PathBuf], log: &dyn Log) -> Result<InvocationReport, FormatError> {
        let handler = self.handler;
        let mut args = self.base_args();
        args.extend(files.iter().map(|f| f.as_os_str().to_os_string()));

        let result = self.exec(&args)?;

        for line in result.stdout_lines() {
            log.info(&format!("{} > {} stdout: {line}", handler.name, handler.program));
        }
        for line in result.stderr_lines() {
            log.info(&format!("{} > {} stderr: {line}", handler.name, handler.program));
        }

        if !result.success {
            return Err(FormatError::FormatterFailed {
                handler: handler.name.clone(),
                target: format!("{} file(s)", files.len()),
                code: result.code,
                stderr: result.stderr_text(),
            });
        }

        Ok(InvocationReport {
            handler: handler.name.clone(),
            mode: IoMode::Batch,
            files: files.len(),
            rewritten: 0,
            unchanged: 0,
        })
    }
}

fn replace_contents(handle: &mut File, contents: &[u8]) -> std::io::Result<()> {
    handle.seek(SeekFrom::Start(0))?;
    handle.set_len(0)?;
    handle.write_all(contents)?;
    handle.flush()
}

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use crate::error::ExecError;
    use crate::exec::MockExecutor;
    use crate::logging::{Level, MemoryLog};
    use std::fs;

    fn jq() -> HandlerDescriptor {
        HandlerDescriptor::new("JSON", "jq", &["."], IoMode::RewriteInPlace)
    }

    fn stylua() -> HandlerDescriptor {
        HandlerDescriptor::new("Lua", "stylua", &[], IoMode::Batch)
    }

    fn ok(stdout: &[u8]) -> ExecResult {
        ExecResult {
            stdout: stdout.to_vec(),
            stderr: Vec::new(),
            success: true,
            code: Some(0),
        }
    }

    fn failed(stderr: &str) -> ExecResult {
        ExecResult {
            stdout: Vec::new(),
            stderr: stderr.as_bytes().to_vec(),
            success: false,
            code: Some(2),
        }
    }

    fn resolving(mock: &mut MockExecutor) {
        mock.expect_resolve()
            .returning(|p| Some(PathBuf::from(format!("/usr/bin/{p}"))));
    }

    #[test]
    fn unavailable_handler_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.json");
        fs::write(&file, "{ }").unwrap();

        let mut mock = MockExecutor::new();
        mock.expect_resolve().returning(|_| None);
        mock.expect_run().never();

        let err = invoke(&jq(), dir.path(), &[file.clone()], &mock, &MemoryLog::new(), None).unwrap_err();
        assert!(matches!(err, FormatError::HandlerUnavailable { ref program, .. } if program == "jq"));
        assert_eq!(fs::read_to_string(file).unwrap(), "{ }");
    }

    #[test]
    fn rewrite_replaces_content_with_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.json");
        fs::write(&file, "{\"a\":1}").unwrap();

        let mut mock = MockExecutor::new();
        resolving(&mut mock);
        let expected = file.clone();
        mock.expect_run()
            .withf(move |program, args, _, _| {
                program == Path::new("/usr/bin/jq")
                    && args.len() == 2
                    && args[0] == "."
                    && args[1] == expected.as_os_str()
            })
            .times(1)
            .returning(|_, _, _, _| Ok(ok(b"{\n  \"a\": 1\n}\n")));

        let report = invoke(&jq(), dir.path(), &[file.clone()], &mock, &MemoryLog::new(), None).unwrap();
        assert_eq!(report.rewritten, 1);
        assert_eq!(fs::read_to_string(file).unwrap(), "{\n  \"a\": 1\n}\n");
    }

    #[test]
    fn rewrite_shrinks_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.json");
        fs::write(&file, "{   \"a\"   :   1   }   ").unwrap();

        let mut mock = MockExecutor::new();
        resolving(&mut mock);
        mock.expect_run().returning(|_, _, _, _| Ok(ok(b"{}")));

        invoke(&jq(), dir.path(), &[file.clone()], &mock, &MemoryLog::new(), None).unwrap();
        assert_eq!(fs::read(file).unwrap(), b"{}");
    }

    #[test]
    fn identical_output_counts_as_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.json");
        fs::write(&file, "{}\n").unwrap();

        let mut mock = MockExecutor::new();
        resolving(&mut mock);
        mock.expect_run().returning(|_, _, _, _| Ok(ok(b"{}\n")));

        let report = invoke(&jq(), dir.path(), &[file], &mock, &MemoryLog::new(), None).unwrap();
        assert_eq!((report.rewritten, report.unchanged), (0, 1));
        assert_eq!(report.summary(), "1 file(s), 0 rewritten, 1 unchanged");
    }

    #[test]
    fn failing_file_is_left_untouched_and_siblings_still_run() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("bad.json");
        let good = dir.path().join("good.json");
        fs::write(&bad, "{ broken").unwrap();
        fs::write(&good, "{\"b\":2}").unwrap();

        let mut mock = MockExecutor::new();
        resolving(&mut mock);
        mock.expect_run().times(2).returning(|_, args, _, _| {
            if args[1].to_string_lossy().ends_with("bad.json") {
                Ok(failed("parse error: unfinished JSON term"))
            } else {
                Ok(ok(b"{\"b\": 2}\n"))
            }
        });

        let err = invoke(&jq(), dir.path(), &[bad.clone(), good.clone()], &mock, &MemoryLog::new(), None)
            .unwrap_err();
        assert!(
            matches!(err, FormatError::FormatterFailed { code: Some(2), ref stderr, .. } if stderr.contains("parse error"))
        );
        assert_eq!(fs::read_to_string(bad).unwrap(), "{ broken");
        assert_eq!(fs::read_to_string(good).unwrap(), "{\"b\": 2}\n");
    }

    #[test]
    fn several_failures_are_collected() {
        let dir = tempfile::tempdir().unwrap();
        let files: Vec<_> = ["a", "b", "c"]
            .iter()
            .map(|n| {
                let p = dir.path().join(format!("{n}.json"));
                fs::write(&p, "x").unwrap();
                p
            })
            .collect();

        let mut mock = MockExecutor::new();
        resolving(&mut mock);
        mock.expect_run().returning(|_, _, _, _| Ok(failed("nope")));

        let err = invoke(&jq(), dir.path(), &files, &mock, &MemoryLog::new(), None).unwrap_err();
        let FormatError::Partial { total, failures, .. } = err else {
            panic!("expected Partial, got {err:?}");
        };
        assert_eq!(total, 3);
        assert_eq!(failures.len(), 3);
        for f in &files {
            assert_eq!(fs::read_to_string(f).unwrap(), "x");
        }
    }

    #[test]
    fn timeout_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.json");
        fs::write(&file, "{}").unwrap();

        let mut mock = MockExecutor::new();
        resolving(&mut mock);
        mock.expect_run()
            .withf(|_, _, _, timeout| *timeout == Some(Duration::from_secs(1)))
            .returning(|p, _, _, t| {
                Err(ExecError::TimedOut {
                    program: p.display().to_string(),
                    after: t.unwrap_or_default(),
                })
            });

        let err = invoke(
            &jq(),
            dir.path(),
            &[file.clone()],
            &mock,
            &MemoryLog::new(),
            Some(Duration::from_secs(1)),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            FormatError::Exec {
                source: ExecError::TimedOut { .. },
                ..
            }
        ));
        assert_eq!(fs::read_to_string(file).unwrap(), "{}");
    }

    #[test]
    fn missing_file_is_an_io_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut mock = MockExecutor::new();
        resolving(&mut mock);
        mock.expect_run().never();

        let err = invoke(
            &jq(),
            dir.path(),
            &[dir.path().join("gone.json")],
            &mock,
            &MemoryLog::new(),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, FormatError::Io { .. }));
    }

    #[test]
    fn batch_passes_every_file_once_and_logs_output() {
        let files = vec![PathBuf::from("/r/a.lua"), PathBuf::from("/r/b.lua")];
        let mut mock = MockExecutor::new();
        resolving(&mut mock);
        mock.expect_run()
            .withf(|_, args, _, _| args.len() == 2 && args[0] == "/r/a.lua" && args[1] == "/r/b.lua")
            .times(1)
            .returning(|_, _, _, _| {
                Ok(ExecResult {
                    stdout: b"formatted 2 files\n".to_vec(),
                    stderr: b"warning: tabs\n".to_vec(),
                    success: true,
                    code: Some(0),
                })
            });

        let log = MemoryLog::new();
        let report = invoke(&stylua(), Path::new("/r"), &files, &mock, &log, None).unwrap();
        assert_eq!(report.summary(), "2 file(s)");
        let info = log.messages(Level::Info);
        assert!(info.contains(&"Lua > stylua stdout: formatted 2 files".to_string()));
        assert!(info.contains(&"Lua > stylua stderr: warning: tabs".to_string()));
    }

    #[test]
    fn batch_failure_reports_group() {
        let mut mock = MockExecutor::new();
        resolving(&mut mock);
        mock.expect_run().returning(|_, _, _, _| Ok(failed("syntax error")));

        let err = invoke(
            &stylua(),
            Path::new("/r"),
            &[PathBuf::from("/r/a.lua")],
            &mock,
            &MemoryLog::new(),
            None,
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Lua failed on 1 file(s) (exit 2): syntax error");
    }

    #[test]
    fn info_line_names_handler_and_relative_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("conf")).unwrap();
        let files = vec![dir.path().join("alpha.json"), dir.path().join("conf/beta.json")];
        for f in &files {
            fs::write(f, "{}").unwrap();
        }

        let mut mock = MockExecutor::new();
        resolving(&mut mock);
        mock.expect_run().returning(|_, _, _, _| Ok(ok(b"{}")));

        let log = MemoryLog::new();
        invoke(&jq(), dir.path(), &files, &mock, &log, None).unwrap();
        assert_eq!(
            log.messages(Level::Info),
            vec!["Running JSON (jq) with [alpha.json, conf/beta.json]".to_string()]
        );
    }

    #[test]
    fn handler_runs_from_root() {
        let root = PathBuf::from("/srv/repo");
        let mut mock = MockExecutor::new();
        resolving(&mut mock);
        mock.expect_run()
            .withf(|_, _, cwd, _| cwd == Path::new("/srv/repo"))
            .times(1)
            .returning(|_, _, _, _| Ok(ok(b"")));

        invoke(
            &stylua(),
            &root,
            &[root.join("a.lua")],
            &mock,
            &MemoryLog::new(),
            None,
        )
        .unwrap();
    }
}
