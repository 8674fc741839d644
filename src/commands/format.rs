//! Command: format every matched file in the repository.
use anyhow::Result;

use crate::context::Context;
use crate::error::CfgctlError;
use crate::formatters::dispatch::{self, DispatchPlan};
use crate::formatters::invoke::{InvocationReport, invoke};
use crate::formatters::registry::PatternRegistry;
use crate::logging::TaskStatus;
use crate::parallel::{Job, JobOutcome, run_jobs};
use crate::walk;

/// Walk the repository, group files by handler, and run each group.
///
/// Walk errors and failing groups are recorded as failed tasks; they never
/// stop the other groups. Only configuration problems (an invalid rule)
/// abort the command.
///
/// # Errors
///
/// Returns an error if the handler registry cannot be built.
pub fn run(ctx: &Context) -> Result<()> {
    let registry = PatternRegistry::from_specs(&ctx.config.handlers)?;
    let plan = plan(ctx, &registry);

    if plan.groups.is_empty() {
        ctx.log.info("nothing to format");
        return Ok(());
    }

    if ctx.dry_run {
        for line in plan.describe(ctx.root()).lines() {
            ctx.log.dry_run(line);
        }
        for group in &plan.groups {
            ctx.log.record_task(
                &group.handler.label(),
                TaskStatus::DryRun,
                Some(&format!("would format {} file(s)", group.files.len())),
            );
        }
        return Ok(());
    }

    ctx.log.stage("Running formatters");
    let executor = ctx.executor.as_ref();
    let log = ctx.log.as_ref();
    let root = ctx.root();
    let timeout = ctx.effective_timeout();

    let jobs: Vec<Job<'_, InvocationReport>> = plan
        .groups
        .iter()
        .map(|group| {
            let handler = group.handler.as_ref();
            let files = group.file_list();
            Job::new(handler.label(), move || {
                Ok(invoke(handler, root, &files, executor, log, timeout)?)
            })
        })
        .collect();

    for outcome in run_jobs(jobs, &ctx.parallel) {
        match outcome {
            JobOutcome::Done { label, value } => {
                ctx.log
                    .record_task(&label, TaskStatus::Ok, Some(&value.summary()));
            }
            JobOutcome::Failed { label, error } => {
                ctx.log.error(&format!("{error:#}"));
                ctx.log
                    .record_task(&label, TaskStatus::Failed, Some(&error.to_string()));
            }
            JobOutcome::Cancelled { label } => {
                ctx.log
                    .record_task(&label, TaskStatus::Skipped, Some("cancelled"));
            }
        }
    }
    Ok(())
}

/// Walk the root and group its files, recording every walk error as a
/// failed task.
#[must_use]
pub fn plan(ctx: &Context, registry: &PatternRegistry) -> DispatchPlan {
    ctx.log.stage(&format!("Scanning {}", ctx.root().display()));
    let (files, errors) = walk::collect_files(ctx.root(), &ctx.config.ignore);
    for err in errors.into_iter().map(CfgctlError::from) {
        ctx.log.warn(&err.to_string());
        ctx.log
            .record_task("walk", TaskStatus::Failed, Some(&err.to_string()));
    }

    let plan = dispatch::group(files, registry);
    ctx.log.info(&format!(
        "{} file(s) in {} group(s), {} unmatched",
        plan.file_count(),
        plan.groups.len(),
        plan.unmatched
    ));
    plan
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
    use crate::config::Config;
    use crate::config::handlers::HandlerSpec;
    use crate::exec::{ExecResult, MockExecutor};
    use crate::formatters::IoMode;
    use crate::logging::{Level, MemoryLog};
    use crate::parallel::ParallelOpts;
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    fn spec(name: &str, program: &str, mode: IoMode, rule: &str) -> HandlerSpec {
        HandlerSpec {
            name: name.to_string(),
            program: program.to_string(),
            args: Vec::new(),
            mode,
            rules: vec![rule.to_string()],
        }
    }

    fn repo(files: &[(&str, &str)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (rel, body) in files {
            let path = dir.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, body).unwrap();
        }
        dir
    }

    fn context(root: &Path, executor: MockExecutor) -> (Context, Arc<MemoryLog>) {
        let mut config = Config::defaults(root, Path::new("/home/test"));
        config.handlers = vec![
            spec("JSON", "jq", IoMode::RewriteInPlace, r".*\.json$"),
            spec("Lua", "stylua", IoMode::Batch, r".*\.lua$"),
        ];
        let log = Arc::new(MemoryLog::new());
        let ctx = Context::new(config, log.clone())
            .with_executor(Arc::new(executor))
            .with_parallel(ParallelOpts::sequential());
        (ctx, log)
    }

    fn exit(success: bool, stdout: &[u8]) -> ExecResult {
        ExecResult {
            stdout: stdout.to_vec(),
            stderr: if success { Vec::new() } else { b"boom".to_vec() },
            success,
            code: Some(i32::from(!success)),
        }
    }

    #[test]
    fn formats_each_group_and_ignores_unmatched() {
        let dir = repo(&[("a.json", "{ }"), ("b.lua", "x=1"), ("c.txt", "text")]);
        let mut exec = MockExecutor::new();
        exec.expect_resolve()
            .returning(|p| Some(PathBuf::from(format!("/usr/bin/{p}"))));
        exec.expect_run()
            .withf(|p, args, _, _| p == Path::new("/usr/bin/jq") && args.len() == 1)
            .times(1)
            .returning(|_, _, _, _| Ok(exit(true, b"{}\n")));
        exec.expect_run()
            .withf(|p, args, _, _| p == Path::new("/usr/bin/stylua") && args.len() == 1)
            .times(1)
            .returning(|_, _, _, _| Ok(exit(true, b"")));

        let (ctx, log) = context(dir.path(), exec);
        run(&ctx).unwrap();

        assert_eq!(fs::read_to_string(dir.path().join("a.json")).unwrap(), "{}\n");
        assert_eq!(fs::read_to_string(dir.path().join("c.txt")).unwrap(), "text");
        let tasks = log.task_entries();
        assert_eq!(tasks.len(), 2);
        assert!(tasks.iter().all(|t| t.status == TaskStatus::Ok));
        assert!(log.contains("2 file(s) in 2 group(s), 1 unmatched"));
        let info = log.messages(Level::Info);
        assert!(info.contains(&"Running JSON (jq) with [a.json]".to_string()));
        assert!(info.contains(&"Running Lua (stylua) with [b.lua]".to_string()));
    }

    #[test]
    fn failing_group_does_not_stop_others() {
        let dir = repo(&[("a.json", "{ }"), ("b.lua", "x=1")]);
        let mut exec = MockExecutor::new();
        exec.expect_resolve()
            .returning(|p| Some(PathBuf::from(format!("/usr/bin/{p}"))));
        exec.expect_run()
            .withf(|p, _, _, _| p == Path::new("/usr/bin/jq"))
            .returning(|_, _, _, _| Ok(exit(false, b"")));
        exec.expect_run()
            .withf(|p, _, _, _| p == Path::new("/usr/bin/stylua"))
            .times(1)
            .returning(|_, _, _, _| Ok(exit(true, b"")));

        let (ctx, log) = context(dir.path(), exec);
        run(&ctx).unwrap();

        assert_eq!(fs::read_to_string(dir.path().join("a.json")).unwrap(), "{ }");
        assert_eq!(log.failure_count(), 1);
        let tasks = log.task_entries();
        let json = tasks.iter().find(|t| t.name == "JSON (jq)").unwrap();
        assert_eq!(json.status, TaskStatus::Failed);
        let lua = tasks.iter().find(|t| t.name == "Lua (stylua)").unwrap();
        assert_eq!(lua.status, TaskStatus::Ok);
        assert!(!log.messages(Level::Error).is_empty());
    }

    #[test]
    fn missing_program_fails_its_group_only() {
        let dir = repo(&[("a.json", "{ }"), ("b.lua", "x=1")]);
        let mut exec = MockExecutor::new();
        exec.expect_resolve()
            .returning(|p| (p == "stylua").then(|| PathBuf::from("/usr/bin/stylua")));
        exec.expect_run()
            .times(1)
            .returning(|_, _, _, _| Ok(exit(true, b"")));

        let (ctx, log) = context(dir.path(), exec);
        run(&ctx).unwrap();

        let failed: Vec<_> = log
            .task_entries()
            .into_iter()
            .filter(|t| t.status == TaskStatus::Failed)
            .collect();
        assert_eq!(failed.len(), 1);
        assert!(failed[0].message.as_deref().unwrap().contains("not found"));
    }

    #[test]
    fn dry_run_spawns_nothing() {
        let dir = repo(&[("a.json", "{ }"), ("nested/b.lua", "x=1")]);
        let exec = MockExecutor::new();
        let (ctx, log) = context(dir.path(), exec);
        let ctx = ctx.with_dry_run(true);
        run(&ctx).unwrap();

        let planned = log.messages(Level::DryRun);
        assert!(planned.iter().any(|l| l.contains("a.json")));
        assert!(planned.iter().any(|l| l.contains("nested/b.lua")));
        assert!(
            log.task_entries()
                .iter()
                .all(|t| t.status == TaskStatus::DryRun)
        );
        assert_eq!(fs::read_to_string(dir.path().join("a.json")).unwrap(), "{ }");
    }

    #[test]
    fn ignored_directories_are_not_formatted() {
        let dir = repo(&[(".git/config.json", "{ }"), ("__pycache__/x.lua", "")]);
        let (ctx, log) = context(dir.path(), MockExecutor::new());
        run(&ctx).unwrap();
        assert!(log.contains("nothing to format"));
        assert!(log.task_entries().is_empty());
    }

    #[test]
    fn invalid_rule_aborts() {
        let dir = repo(&[]);
        let (mut ctx, _log) = context(dir.path(), MockExecutor::new());
        ctx.config.handlers = vec![spec("Bad", "x", IoMode::Batch, "(")];
        let err = run(&ctx).unwrap_err();
        assert!(err.to_string().contains("invalid match rule"));
    }

    #[cfg(unix)]
    #[test]
    fn walk_errors_are_recorded_as_failures() {
        use std::os::unix::fs::PermissionsExt;

        let dir = repo(&[("locked/a.json", "{}")]);
        let locked = dir.path().join("locked");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        if fs::read_dir(&locked).is_ok() {
            // running as root; permissions are not enforced
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let (ctx, log) = context(dir.path(), MockExecutor::new());
        run(&ctx).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        let walk = log
            .task_entries()
            .into_iter()
            .find(|t| t.name == "walk")
            .unwrap();
        assert_eq!(walk.status, TaskStatus::Failed);
        assert!(!log.messages(Level::Warn).is_empty());
    }
}
