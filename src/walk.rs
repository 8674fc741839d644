//! Ignore-aware tree walker shared by every command.
//!
//! The walk is lazy and depth-first. Entries are sorted by file name within
//! each directory so repeated runs see the same sequence. Symbolic links are
//! reported as leaves and never followed.
use std::collections::BTreeSet;
use std::ffi::{OsStr, OsString};
use std::path::{Component, Path, PathBuf};

use ignore::WalkBuilder;

use crate::error::WalkError;

/// Path-segment names excluded from every walk, with their subtrees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoreSet {
    names: BTreeSet<OsString>,
}

impl Default for IgnoreSet {
    fn default() -> Self {
        Self::empty().with([".git", ".mypy_cache", "__pycache__"])
    }
}

impl IgnoreSet {
    /// A set that ignores nothing.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            names: BTreeSet::new(),
        }
    }

    /// Add segment names to the set.
    #[must_use]
    pub fn with<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.extend(names);
        self
    }

    /// Add segment names to the set in place.
    pub fn extend<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.names.extend(names.into_iter().map(Into::into));
    }

    /// `true` if `name` is an ignored segment.
    #[must_use]
    pub fn contains(&self, name: &OsStr) -> bool {
        self.names.contains(name)
    }

    /// `true` if any normal component of `path` is an ignored segment.
    ///
    /// Callers pass paths relative to the walk root so the root's own
    /// ancestors never count.
    #[must_use]
    pub fn excludes(&self, path: &Path) -> bool {
        path.components().any(|c| match c {
            Component::Normal(name) => self.contains(name),
            _ => false,
        })
    }

    /// Iterate over the ignored names in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &OsStr> {
        self.names.iter().map(OsString::as_os_str)
    }
}

/// Lazily walk `root`, yielding every non-directory entry.
///
/// Pruned directories are never opened. A directory that cannot be read
/// produces one `Err` at the point of failure; entries already yielded remain
/// valid and the walk carries on with the next sibling subtree. A missing
/// `root` produces exactly one `Err`.
pub fn walk(
    root: &Path,
    ignore: &IgnoreSet,
) -> impl Iterator<Item = Result<PathBuf, WalkError>> + use<> {
    let filter = ignore.clone();
    let base = root.to_path_buf();
    let fallback = root.to_path_buf();
    WalkBuilder::new(root)
        .standard_filters(false)
        .follow_links(false)
        .sort_by_file_name(|a: &OsStr, b: &OsStr| a.cmp(b))
        .filter_entry(move |entry| {
            let rel = entry.path().strip_prefix(&base).unwrap_or(entry.path());
            !filter.excludes(rel)
        })
        .build()
        .filter_map(move |entry| match entry {
            Ok(entry) => match entry.file_type() {
                Some(ft) if ft.is_dir() => None,
                Some(_) => Some(Ok(entry.into_path())),
                None => None,
            },
            Err(source) => Some(Err(WalkError::ReadDir {
                path: error_path(&source).unwrap_or_else(|| fallback.clone()),
                source,
            })),
        })
}

/// Drain [`walk`], separating files from errors.
#[must_use]
pub fn collect_files(root: &Path, ignore: &IgnoreSet) -> (Vec<PathBuf>, Vec<WalkError>) {
    let mut files = Vec::new();
    let mut errors = Vec::new();
    for item in walk(root, ignore) {
        match item {
            Ok(path) => files.push(path),
            Err(e) => errors.push(e),
        }
    }
    (files, errors)
}

fn error_path(err: &ignore::Error) -> Option<PathBuf> {
    match err {
        ignore::Error::WithPath { path, .. } => Some(path.clone()),
        ignore::Error::WithDepth { err, .. } | ignore::Error::WithLineNumber { err, .. } => {
            error_path(err)
        }
        _ => None,
    }
}
