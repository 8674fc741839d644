//! Task records and the [`Log`] seam every command writes through.

/// One line of the end-of-run summary: a formatter group, a symlink sync,
/// or a walk error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskEntry {
    /// Handler label (`JSON (jq)`), `Create symlinks`, or `walk`.
    pub name: String,
    /// How the task ended.
    pub status: TaskStatus,
    /// Counts on success, the error text on failure.
    pub message: Option<String>,
}

/// Status of a completed task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Task completed successfully.
    Ok,
    /// Task was skipped (conflicting file, missing target, cancelled).
    Skipped,
    /// Task ran in dry-run mode; no changes were applied.
    DryRun,
    /// Task encountered an error and could not complete.
    Failed,
}

/// Number of failed entries; any failure makes the run exit non-zero.
pub(super) fn count_failures(tasks: &[TaskEntry]) -> usize {
    tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Failed)
        .count()
}

/// Abstraction over logging backends.
///
/// [`Logger`](super::logger::Logger) routes messages through `tracing`;
/// [`MemoryLog`](super::memory::MemoryLog) keeps them in memory. Command code
/// logs through this trait without knowing which one it has.
pub trait Log: Send + Sync {
    /// Log a stage header (major section).
    fn stage(&self, msg: &str);
    /// Log an informational message.
    fn info(&self, msg: &str);
    /// Log a debug message (may be suppressed on console).
    fn debug(&self, msg: &str);
    /// Log a warning message.
    fn warn(&self, msg: &str);
    /// Log an error message.
    fn error(&self, msg: &str);
    /// Log a dry-run action message.
    fn dry_run(&self, msg: &str);
    /// Record a task result for the summary.
    fn record_task(&self, name: &str, status: TaskStatus, message: Option<&str>);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, status: TaskStatus) -> TaskEntry {
        TaskEntry {
            name: name.to_string(),
            status,
            message: None,
        }
    }

    #[test]
    fn only_failed_entries_count() {
        let tasks = [
            entry("JSON (jq)", TaskStatus::Ok),
            entry("walk", TaskStatus::Failed),
            entry("Lua (stylua)", TaskStatus::Skipped),
            entry("Create symlinks", TaskStatus::DryRun),
            entry("YAML (yamlfmt)", TaskStatus::Failed),
        ];
        assert_eq!(count_failures(&tasks), 2);
        assert_eq!(count_failures(&[]), 0);
    }
}
