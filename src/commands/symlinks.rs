//! Command: mirror `<root>/home` into the home directory as symlinks.
use anyhow::Result;

use crate::cli::SymlinkCommand;
use crate::context::Context;
use crate::error::CfgctlError;
use crate::logging::TaskStatus;
use crate::parallel::{Job, JobOutcome, run_jobs};
use crate::resources::symlink::{LinkKind, SymlinkResource};
use crate::resources::{Applicable, Resource, ResourceChange, ResourceState, SkipReason};
use crate::walk;

/// Direction of a symlink run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymlinkAction {
    /// Create links under the home directory.
    Link,
    /// Remove links under the home directory.
    Unlink,
}

impl From<SymlinkCommand> for SymlinkAction {
    fn from(cmd: SymlinkCommand) -> Self {
        match cmd {
            SymlinkCommand::Create => Self::Link,
            SymlinkCommand::Remove => Self::Unlink,
        }
    }
}

/// Counters for one symlink run.
///
/// # Examples
///
/// ```
/// use cfgctl::commands::symlinks::SyncStats;
///
/// let stats = SyncStats { changed: 2, already_ok: 5, skipped: 0, failed: 0 };
/// assert_eq!(stats.summary(false), "2 changed, 5 already ok");
/// assert_eq!(stats.summary(true), "2 would change, 5 already ok");
/// ```
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncStats {
    /// Links created, replaced or removed.
    pub changed: u32,
    /// Links already in the requested state.
    pub already_ok: u32,
    /// Pairs left alone (conflict or missing target).
    pub skipped: u32,
    /// Pairs whose filesystem operation failed.
    pub failed: u32,
}

impl SyncStats {
    /// Format the summary string (e.g. "3 changed, 10 already ok, 1 skipped").
    #[must_use]
    pub fn summary(&self, dry_run: bool) -> String {
        let verb = if dry_run { "would change" } else { "changed" };
        let mut out = format!("{} {verb}, {} already ok", self.changed, self.already_ok);
        if self.skipped > 0 {
            out.push_str(&format!(", {} skipped", self.skipped));
        }
        if self.failed > 0 {
            out.push_str(&format!(", {} failed", self.failed));
        }
        out
    }
}

impl std::ops::AddAssign for SyncStats {
    fn add_assign(&mut self, other: Self) {
        self.changed += other.changed;
        self.already_ok += other.already_ok;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

/// Per-pair result, folded into [`SyncStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PairOutcome {
    Changed,
    AlreadyOk,
    Skipped,
}

impl From<PairOutcome> for SyncStats {
    fn from(outcome: PairOutcome) -> Self {
        let mut stats = Self::default();
        match outcome {
            PairOutcome::Changed => stats.changed = 1,
            PairOutcome::AlreadyOk => stats.already_ok = 1,
            PairOutcome::Skipped => stats.skipped = 1,
        }
        stats
    }
}

/// Run `action` over every file under `<root>/home` and record the result.
///
/// # Errors
///
/// Returns an error only if the home source tree itself is unusable; failures
/// of individual pairs are recorded as failed tasks.
pub fn run(ctx: &Context, action: SymlinkAction) -> Result<SyncStats> {
    let verb = match action {
        SymlinkAction::Link => "Linking",
        SymlinkAction::Unlink => "Unlinking",
    };
    ctx.log.stage(&format!(
        "{verb} {} into {}",
        ctx.pretty_repo(&ctx.home_source()),
        ctx.home().display()
    ));

    let stats = sync(ctx, action)?;
    let summary = stats.summary(ctx.dry_run);
    ctx.log.info(&summary);

    let status = if stats.failed > 0 {
        TaskStatus::Failed
    } else if ctx.dry_run {
        TaskStatus::DryRun
    } else {
        TaskStatus::Ok
    };
    let name = match action {
        SymlinkAction::Link => "Create symlinks",
        SymlinkAction::Unlink => "Remove symlinks",
    };
    ctx.log.record_task(name, status, Some(&summary));
    Ok(stats)
}

/// Build one pair per file under `<root>/home` and process every pair on
/// the worker pool.
///
/// # Errors
///
/// Returns an error if `<root>/home` does not exist.
pub fn sync(ctx: &Context, action: SymlinkAction) -> Result<SyncStats> {
    let source = ctx.home_source();
    if !source.is_dir() {
        anyhow::bail!("{} is not a directory", source.display());
    }

    let mut stats = SyncStats::default();
    let (files, errors) = walk::collect_files(&source, &ctx.config.ignore);
    for err in errors.into_iter().map(CfgctlError::from) {
        ctx.log.error(&err.to_string());
        stats.failed += 1;
    }

    let jobs: Vec<Job<'_, PairOutcome>> = files
        .into_iter()
        .filter_map(|target| {
            let rel = target.strip_prefix(&source).ok()?.to_path_buf();
            let resource = SymlinkResource::new(target, ctx.home().join(&rel));
            Some(Job::new(rel.display().to_string(), move || {
                process(ctx, &resource, action)
            }))
        })
        .collect();
    ctx.log.debug(&format!("{} pair(s)", jobs.len()));

    for outcome in run_jobs(jobs, &ctx.parallel) {
        match outcome {
            JobOutcome::Done { value, .. } => stats += SyncStats::from(value),
            JobOutcome::Failed { label, error } => {
                ctx.log.error(&format!("{label}: {error:#}"));
                stats.failed += 1;
            }
            JobOutcome::Cancelled { label } => {
                ctx.log.debug(&format!("{label}: cancelled"));
                stats.skipped += 1;
            }
        }
    }
    Ok(stats)
}

fn process(ctx: &Context, resource: &SymlinkResource, action: SymlinkAction) -> Result<PairOutcome> {
    let link = ctx.pretty_home(&resource.link);
    let target = ctx.pretty_repo(&resource.target);
    match action {
        SymlinkAction::Link => link_pair(ctx, resource, &link, &target),
        SymlinkAction::Unlink => unlink_pair(ctx, resource, &link, &target),
    }
}

fn link_pair(ctx: &Context, resource: &SymlinkResource, link: &str, target: &str) -> Result<PairOutcome> {
    let state = resource.current_state()?;
    match &state {
        ResourceState::Invalid { reason } => {
            report_skip(ctx, *reason, link, target);
            return Ok(PairOutcome::Skipped);
        }
        ResourceState::Correct => {
            ctx.log
                .debug(&format!("{link} already symlinks to {target} - skipping"));
            return Ok(PairOutcome::AlreadyOk);
        }
        ResourceState::Incorrect { current } => {
            announce(
                ctx,
                &format!("{link} symlink already exists but not to {target} - unlinking"),
            );
            ctx.log.debug(&format!("{link} points to {current}"));
        }
        ResourceState::Missing => {}
    }

    if let Some(parent) = resource.link.parent()
        && !parent.is_dir()
    {
        announce(
            ctx,
            &format!("{} does not exist - creating", ctx.pretty_home(parent)),
        );
    }

    announce(ctx, &format!("linking {link} to {target}"));
    if ctx.dry_run {
        return Ok(PairOutcome::Changed);
    }
    Ok(match resource.apply()? {
        ResourceChange::Applied => PairOutcome::Changed,
        ResourceChange::AlreadyCorrect => PairOutcome::AlreadyOk,
        ResourceChange::Skipped { reason } => {
            report_skip(ctx, reason, link, target);
            PairOutcome::Skipped
        }
    })
}

fn unlink_pair(ctx: &Context, resource: &SymlinkResource, link: &str, target: &str) -> Result<PairOutcome> {
    match resource.link_kind()? {
        LinkKind::Absent => {
            ctx.log.debug(&format!("{link} does not exist - skipping"));
            Ok(PairOutcome::AlreadyOk)
        }
        LinkKind::Occupied => {
            report_skip(ctx, SkipReason::SymlinkConflict, link, target);
            Ok(PairOutcome::Skipped)
        }
        LinkKind::Symlink(_) if ctx.dry_run => {
            ctx.log.dry_run(&format!("unlinking {link} from {target}"));
            Ok(PairOutcome::Changed)
        }
        LinkKind::Symlink(_) => {
            ctx.log.info(&format!("unlinking {link} from {target}"));
            Ok(match resource.remove()? {
                ResourceChange::Applied => PairOutcome::Changed,
                ResourceChange::AlreadyCorrect => PairOutcome::AlreadyOk,
                ResourceChange::Skipped { reason } => {
                    report_skip(ctx, reason, link, target);
                    PairOutcome::Skipped
                }
            })
        }
    }
}

/// Log a change that is about to happen, or would happen in dry-run mode.
fn announce(ctx: &Context, msg: &str) {
    if ctx.dry_run {
        ctx.log.dry_run(msg);
    } else {
        ctx.log.info(msg);
    }
}

fn report_skip(ctx: &Context, reason: SkipReason, link: &str, target: &str) {
    match reason {
        SkipReason::SymlinkConflict => ctx.log.warn(&format!("{link} {reason} - skipping")),
        SkipReason::MissingLinkTarget => ctx.log.warn(&format!("{target} {reason} - skipping")),
    }
}
