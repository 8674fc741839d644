//! Partition walked files into one group per handler.
use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::HandlerDescriptor;
use super::registry::PatternRegistry;

/// The files assigned to one handler for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchGroup {
    /// Handler every file in the group is formatted with.
    pub handler: Arc<HandlerDescriptor>,
    /// Sorted, de-duplicated file set.
    pub files: BTreeSet<PathBuf>,
}

impl DispatchGroup {
    /// Files as an ordered slice-friendly vector.
    #[must_use]
    pub fn file_list(&self) -> Vec<PathBuf> {
        self.files.iter().cloned().collect()
    }
}

/// Result of grouping: non-empty groups in registration order, plus the
/// number of files no rule matched.
#[derive(Debug, Default)]
pub struct DispatchPlan {
    /// One group per handler that received at least one file.
    pub groups: Vec<DispatchGroup>,
    /// Files that matched no rule.
    pub unmatched: usize,
}

impl DispatchPlan {
    /// Total number of files across all groups.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.groups.iter().map(|g| g.files.len()).sum()
    }

    /// Render the plan, with paths relative to `root` where possible.
    #[must_use]
    pub fn describe(&self, root: &Path) -> String {
        let mut out = String::new();
        for group in &self.groups {
            let _ = writeln!(
                out,
                "{} [{}] {}:",
                group.handler.name,
                group.handler.mode,
                group.handler.command_line()
            );
            for file in &group.files {
                let shown = file.strip_prefix(root).unwrap_or(file);
                let _ = writeln!(out, "  {}", shown.display());
            }
        }
        let _ = write!(
            out,
            "{} file(s) in {} group(s), {} unmatched",
            self.file_count(),
            self.groups.len(),
            self.unmatched
        );
        out
    }
}

/// Assign each file to the handler of its first matching rule.
///
/// Unmatched files are counted, not reported as errors. A path given more
/// than once lands in its group once.
pub fn group<I>(files: I, registry: &PatternRegistry) -> DispatchPlan
where
    I: IntoIterator<Item = PathBuf>,
{
    let handlers = registry.handlers();
    let mut buckets: Vec<BTreeSet<PathBuf>> = vec![BTreeSet::new(); handlers.len()];
    let mut unmatched = 0;

    for file in files {
        match registry.resolve_index(&file).and_then(|idx| buckets.get_mut(idx)) {
            Some(bucket) => {
                bucket.insert(file);
            }
            None => unmatched += 1,
        }
    }

    let groups = handlers
        .iter()
        .zip(buckets)
        .filter(|(_, files)| !files.is_empty())
        .map(|(handler, files)| DispatchGroup {
            handler: Arc::clone(handler),
            files,
        })
        .collect();

    DispatchPlan { groups, unmatched }
}
