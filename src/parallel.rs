//! Bounded fan-out/fan-in job execution.
//!
//! Each [`run_jobs`] call builds its own rayon pool and joins every worker
//! before returning. A job that fails or panics never stops siblings already
//! running; outcomes come back in submission order.
use std::num::NonZeroUsize;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::anyhow;

/// How a batch of jobs is executed.
#[derive(Debug, Clone)]
pub struct ParallelOpts {
    /// Run on a worker pool; `false` runs jobs one by one on the caller thread.
    pub parallel: bool,
    /// Worker count.
    pub threads: usize,
    /// After the first failure, jobs that have not started are cancelled.
    pub fail_fast: bool,
    /// Interrupt flag; once set, jobs that have not started are cancelled.
    pub cancel: Arc<AtomicBool>,
}

impl Default for ParallelOpts {
    fn default() -> Self {
        Self {
            parallel: true,
            threads: std::thread::available_parallelism().map_or(1, NonZeroUsize::get),
            fail_fast: false,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl ParallelOpts {
    /// Sequential execution on the caller thread.
    #[must_use]
    pub fn sequential() -> Self {
        Self {
            parallel: false,
            ..Self::default()
        }
    }

    /// `true` once the interrupt flag has been raised.
    #[must_use]
    pub fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }
}

type Work<'a, T> = Box<dyn FnOnce() -> anyhow::Result<T> + Send + 'a>;

/// A labelled unit of work.
pub struct Job<'a, T> {
    label: String,
    work: Work<'a, T>,
}

impl<'a, T> Job<'a, T> {
    /// Wrap `work` under `label`.
    pub fn new(label: impl Into<String>, work: impl FnOnce() -> anyhow::Result<T> + Send + 'a) -> Self {
        Self {
            label: label.into(),
            work: Box::new(work),
        }
    }

    /// The job's label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl<T> std::fmt::Debug for Job<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job").field("label", &self.label).finish_non_exhaustive()
    }
}

/// What happened to one job.
#[derive(Debug)]
pub enum JobOutcome<T> {
    /// The job returned a value.
    Done {
        /// Job label.
        label: String,
        /// Returned value.
        value: T,
    },
    /// The job returned an error or panicked.
    Failed {
        /// Job label.
        label: String,
        /// The error, or a description of the panic.
        error: anyhow::Error,
    },
    /// The job never started.
    Cancelled {
        /// Job label.
        label: String,
    },
}

impl<T> JobOutcome<T> {
    /// The job's label.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Done { label, .. } | Self::Failed { label, .. } | Self::Cancelled { label } => {
                label
            }
        }
    }

    /// `true` for [`JobOutcome::Failed`].
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Run every job and collect the outcomes in submission order.
///
/// Falls back to sequential execution if the worker pool cannot be built.
pub fn run_jobs<'a, T: Send>(jobs: Vec<Job<'a, T>>, opts: &ParallelOpts) -> Vec<JobOutcome<T>> {
    let tripped = AtomicBool::new(false);
    let run_one = |job: Job<'a, T>| run_guarded(job, opts, &tripped);

    if !opts.parallel || opts.threads <= 1 || jobs.len() <= 1 {
        return jobs.into_iter().map(run_one).collect();
    }

    let mut pending = Some(jobs);
    let built = rayon::ThreadPoolBuilder::new()
        .num_threads(opts.threads)
        .thread_name(|i| format!("cfgctl-worker-{i}"))
        .build_scoped(
            |thread| thread.run(),
            |pool| {
                pool.install(|| {
                    use rayon::prelude::*;
                    pending
                        .take()
                        .map(|jobs| jobs.into_par_iter().map(&run_one).collect::<Vec<_>>())
                })
            },
        );

    match built {
        Ok(Some(outcomes)) => outcomes,
        _ => pending
            .take()
            .unwrap_or_default()
            .into_iter()
            .map(run_one)
            .collect(),
    }
}

fn run_guarded<T>(job: Job<'_, T>, opts: &ParallelOpts, tripped: &AtomicBool) -> JobOutcome<T> {
    let Job { label, work } = job;
    if opts.cancelled() || (opts.fail_fast && tripped.load(Ordering::SeqCst)) {
        return JobOutcome::Cancelled { label };
    }
    let outcome = match catch_unwind(AssertUnwindSafe(work)) {
        Ok(Ok(value)) => JobOutcome::Done { label, value },
        Ok(Err(error)) => JobOutcome::Failed { label, error },
        Err(payload) => JobOutcome::Failed {
            label,
            error: anyhow!("panicked: {}", panic_message(payload.as_ref())),
        },
    };
    if outcome.is_failed() {
        tripped.store(true, Ordering::SeqCst);
    }
    outcome
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
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
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn opts(threads: usize) -> ParallelOpts {
        ParallelOpts {
            threads,
            ..ParallelOpts::default()
        }
    }

    #[test]
    fn outcomes_keep_submission_order() {
        let jobs: Vec<_> = (0..16u64)
            .map(|i| {
                Job::new(format!("job-{i}"), move || {
                    std::thread::sleep(Duration::from_millis(16 - i));
                    Ok(i)
                })
            })
            .collect();
        let outcomes = run_jobs(jobs, &opts(4));
        let labels: Vec<_> = outcomes.iter().map(JobOutcome::label).collect();
        let expected: Vec<_> = (0..16).map(|i| format!("job-{i}")).collect();
        assert_eq!(labels, expected);
    }

    #[test]
    fn failure_does_not_affect_siblings() {
        let jobs = vec![
            Job::new("a", || Ok(1)),
            Job::new("b", || Err(anyhow!("boom"))),
            Job::new("c", || Ok(3)),
        ];
        let outcomes = run_jobs(jobs, &opts(3));
        assert!(matches!(outcomes[0], JobOutcome::Done { value: 1, .. }));
        assert!(matches!(&outcomes[1], JobOutcome::Failed { error, .. } if error.to_string() == "boom"));
        assert!(matches!(outcomes[2], JobOutcome::Done { value: 3, .. }));
    }

    #[test]
    fn panic_is_caught_as_failure() {
        let jobs = vec![
            Job::new("ok", || Ok(())),
            Job::new("bad", || panic!("exploded")),
        ];
        let outcomes = run_jobs(jobs, &opts(2));
        assert!(matches!(outcomes[0], JobOutcome::Done { .. }));
        let JobOutcome::Failed { error, .. } = &outcomes[1] else {
            panic!("expected failure");
        };
        assert!(error.to_string().contains("exploded"));
    }

    #[test]
    fn fail_fast_cancels_jobs_not_yet_started() {
        let ran = AtomicUsize::new(0);
        let jobs: Vec<_> = (0..5)
            .map(|i| {
                let ran = &ran;
                Job::new(format!("{i}"), move || {
                    ran.fetch_add(1, Ordering::SeqCst);
                    if i == 1 { Err(anyhow!("stop")) } else { Ok(()) }
                })
            })
            .collect();
        let opts = ParallelOpts {
            fail_fast: true,
            ..ParallelOpts::sequential()
        };
        let outcomes = run_jobs(jobs, &opts);
        assert_eq!(ran.load(Ordering::SeqCst), 2);
        assert!(outcomes[1].is_failed());
        assert!(outcomes[2..].iter().all(|o| matches!(o, JobOutcome::Cancelled { .. })));
    }

    #[test]
    fn interrupt_flag_cancels_pending_jobs() {
        let opts = opts(2);
        opts.cancel.store(true, Ordering::SeqCst);
        let jobs = vec![Job::new("a", || Ok(())), Job::new("b", || Ok(()))];
        let outcomes = run_jobs(jobs, &opts);
        assert!(outcomes.iter().all(|o| matches!(o, JobOutcome::Cancelled { .. })));
    }

    #[test]
    fn concurrency_is_bounded_by_thread_count() {
        let current = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        let jobs: Vec<_> = (0..12)
            .map(|i| {
                let (current, peak) = (&current, &peak);
                Job::new(format!("{i}"), move || {
                    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(20));
                    current.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                })
            })
            .collect();
        run_jobs(jobs, &opts(3));
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert!(peak.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn jobs_may_borrow_caller_data() {
        let words = vec!["alpha".to_string(), "beta".to_string()];
        let jobs: Vec<_> = words
            .iter()
            .map(|w| Job::new(w.clone(), move || Ok(w.len())))
            .collect();
        let outcomes = run_jobs(jobs, &opts(2));
        let lens: Vec<_> = outcomes
            .into_iter()
            .filter_map(|o| match o {
                JobOutcome::Done { value, .. } => Some(value),
                _ => None,
            })
            .collect();
        assert_eq!(lens, vec![5, 4]);
    }

    #[test]
    fn sequential_mode_runs_on_caller_thread() {
        let caller = std::thread::current().id();
        let jobs = vec![
            Job::new("a", move || Ok(std::thread::current().id() == caller)),
            Job::new("b", move || Ok(std::thread::current().id() == caller)),
        ];
        let outcomes = run_jobs(jobs, &ParallelOpts::sequential());
        assert!(
            outcomes
                .iter()
                .all(|o| matches!(o, JobOutcome::Done { value: true, .. }))
        );
    }
}
