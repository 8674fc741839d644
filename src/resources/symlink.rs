//! Symlink resource: one home-side link pointing into the repository.
//!
//! Linking never clobbers real data. A slot holding a regular file or a
//! directory is reported as a conflict and left alone; only symlinks are ever
//! replaced or removed.
use anyhow::Result;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::helpers::fs::ensure_parent_dir;
use super::{Applicable, Resource, ResourceChange, ResourceState, SkipReason};
use crate::error::SymlinkError;

/// What currently occupies the link slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkKind {
    /// Nothing, not even a dangling link.
    Absent,
    /// A symlink, with its raw destination.
    Symlink(PathBuf),
    /// A regular file, directory or other non-link entry.
    Occupied,
}

/// A symlink `link -> target`, where `target` is a file in the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymlinkResource {
    /// Repository-side file the link points to.
    pub target: PathBuf,
    /// Home-side path where the link lives.
    pub link: PathBuf,
}

impl SymlinkResource {
    /// Create a new symlink resource.
    #[must_use]
    pub const fn new(target: PathBuf, link: PathBuf) -> Self {
        Self { target, link }
    }

    /// Inspect the link slot without following symlinks.
    ///
    /// # Errors
    ///
    /// Returns an error if the slot exists but cannot be inspected.
    pub fn link_kind(&self) -> Result<LinkKind, SymlinkError> {
        match std::fs::symlink_metadata(&self.link) {
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(LinkKind::Absent),
            Err(source) => Err(SymlinkError::Io {
                op: "inspect",
                path: self.link.clone(),
                source,
            }),
            Ok(meta) if meta.file_type().is_symlink() => std::fs::read_link(&self.link)
                .map(LinkKind::Symlink)
                .map_err(|source| SymlinkError::Io {
                    op: "read link",
                    path: self.link.clone(),
                    source,
                }),
            Ok(_) => Ok(LinkKind::Occupied),
        }
    }
}

impl Applicable for SymlinkResource {
    fn description(&self) -> String {
        format!("{} -> {}", self.link.display(), self.target.display())
    }

    fn apply(&self) -> Result<ResourceChange> {
        match self.current_state()? {
            ResourceState::Invalid { reason } => return Ok(ResourceChange::Skipped { reason }),
            ResourceState::Correct => return Ok(ResourceChange::AlreadyCorrect),
            ResourceState::Incorrect { .. } => remove_symlink(&self.link)?,
            ResourceState::Missing => {}
        }
        ensure_parent_dir(&self.link)?;
        create_symlink(&self.target, &self.link)?;
        Ok(ResourceChange::Applied)
    }

    /// Remove whatever symlink occupies the slot, wherever it points.
    fn remove(&self) -> Result<ResourceChange> {
        match self.link_kind()? {
            LinkKind::Absent => Ok(ResourceChange::AlreadyCorrect),
            LinkKind::Occupied => Ok(ResourceChange::Skipped {
                reason: SkipReason::SymlinkConflict,
            }),
            LinkKind::Symlink(_) => {
                remove_symlink(&self.link)?;
                Ok(ResourceChange::Applied)
            }
        }
    }
}

impl Resource for SymlinkResource {
    fn current_state(&self) -> Result<ResourceState> {
        if !self.target.is_file() {
            return Ok(ResourceState::Invalid {
                reason: SkipReason::MissingLinkTarget,
            });
        }
        Ok(match self.link_kind()? {
            LinkKind::Absent => ResourceState::Missing,
            LinkKind::Symlink(existing) if paths_equal(&existing, &self.target) => {
                ResourceState::Correct
            }
            LinkKind::Symlink(existing) => ResourceState::Incorrect {
                current: existing.display().to_string(),
            },
            LinkKind::Occupied => ResourceState::Invalid {
                reason: SkipReason::SymlinkConflict,
            },
        })
    }
}

/// Compare two paths for equality, handling UNC prefix normalization on Windows.
fn paths_equal(a: &Path, b: &Path) -> bool {
    let normalize = |p: &Path| -> PathBuf {
        #[cfg(windows)]
        {
            let s = p.to_string_lossy();
            if let Some(stripped) = s.strip_prefix(r"\\?\") {
                return PathBuf::from(stripped);
            }
        }
        p.to_path_buf()
    };

    normalize(a) == normalize(b)
}

/// Create a symlink at `link` pointing to `target`.
fn create_symlink(target: &Path, link: &Path) -> Result<(), SymlinkError> {
    #[cfg(unix)]
    let result = std::os::unix::fs::symlink(target, link);
    #[cfg(windows)]
    let result = std::os::windows::fs::symlink_file(target, link);

    result.map_err(|source| SymlinkError::Io {
        op: "create link",
        path: link.to_path_buf(),
        source,
    })
}

/// Remove the symlink at `path` (never its destination).
fn remove_symlink(path: &Path) -> Result<(), SymlinkError> {
    std::fs::remove_file(path).map_err(|source| SymlinkError::Io {
        op: "remove link",
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(all(test, unix))]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::symlink;

    struct Fixture {
        _tmp: tempfile::TempDir,
        repo: PathBuf,
        home: PathBuf,
    }

    fn fixture() -> Fixture {
        let tmp = tempfile::tempdir().unwrap();
        let repo = tmp.path().join("repo/home");
        let home = tmp.path().join("user");
        fs::create_dir_all(&repo).unwrap();
        fs::create_dir_all(&home).unwrap();
        Fixture {
            _tmp: tmp,
            repo,
            home,
        }
    }

    impl Fixture {
        fn resource(&self, rel: &str) -> SymlinkResource {
            let target = self.repo.join(rel);
            fs::create_dir_all(target.parent().unwrap()).unwrap();
            fs::write(&target, rel).unwrap();
            SymlinkResource::new(target, self.home.join(rel))
        }
    }

    #[test]
    fn description_names_both_ends() {
        let r = SymlinkResource::new(PathBuf::from("/repo/home/.bashrc"), PathBuf::from("/u/.bashrc"));
        assert_eq!(r.description(), "/u/.bashrc -> /repo/home/.bashrc");
    }

    #[test]
    fn missing_target_is_skipped() {
        let f = fixture();
        let r = SymlinkResource::new(f.repo.join("nope"), f.home.join("nope"));
        assert_eq!(
            r.current_state().unwrap(),
            ResourceState::Invalid {
                reason: SkipReason::MissingLinkTarget
            }
        );
        assert_eq!(
            r.apply().unwrap(),
            ResourceChange::Skipped {
                reason: SkipReason::MissingLinkTarget
            }
        );
        assert!(r.link.symlink_metadata().is_err());
    }

    #[test]
    fn directory_target_is_skipped() {
        let f = fixture();
        fs::create_dir(f.repo.join("dir")).unwrap();
        let r = SymlinkResource::new(f.repo.join("dir"), f.home.join("dir"));
        assert!(matches!(r.apply().unwrap(), ResourceChange::Skipped { .. }));
    }

    #[test]
    fn link_creates_symlink_and_is_idempotent() {
        let f = fixture();
        let r = f.resource(".bashrc");
        assert_eq!(r.current_state().unwrap(), ResourceState::Missing);
        assert_eq!(r.apply().unwrap(), ResourceChange::Applied);
        assert_eq!(fs::read_link(&r.link).unwrap(), r.target);
        assert_eq!(r.current_state().unwrap(), ResourceState::Correct);
        assert_eq!(r.apply().unwrap(), ResourceChange::AlreadyCorrect);
        assert_eq!(fs::read_link(&r.link).unwrap(), r.target);
    }

    #[test]
    fn link_replaces_stale_symlink() {
        let f = fixture();
        let r = f.resource(".vimrc");
        symlink("/somewhere/else", &r.link).unwrap();
        assert!(matches!(
            r.current_state().unwrap(),
            ResourceState::Incorrect { ref current } if current == "/somewhere/else"
        ));
        assert_eq!(r.apply().unwrap(), ResourceChange::Applied);
        assert_eq!(fs::read_link(&r.link).unwrap(), r.target);
    }

    #[test]
    fn link_never_clobbers_regular_file() {
        let f = fixture();
        let r = f.resource(".bashrc");
        fs::write(&r.link, "precious").unwrap();
        assert_eq!(
            r.apply().unwrap(),
            ResourceChange::Skipped {
                reason: SkipReason::SymlinkConflict
            }
        );
        assert_eq!(fs::read_to_string(&r.link).unwrap(), "precious");
    }

    #[test]
    fn link_never_clobbers_directory() {
        let f = fixture();
        let r = f.resource("config");
        fs::create_dir(&r.link).unwrap();
        fs::write(r.link.join("keep"), "x").unwrap();
        assert!(matches!(r.apply().unwrap(), ResourceChange::Skipped { .. }));
        assert!(r.link.join("keep").is_file());
    }

    #[test]
    fn link_creates_missing_parents() {
        let f = fixture();
        let r = f.resource(".config/nvim/init.lua");
        assert_eq!(r.apply().unwrap(), ResourceChange::Applied);
        assert!(f.home.join(".config/nvim").is_dir());
        assert_eq!(fs::read_to_string(&r.link).unwrap(), ".config/nvim/init.lua");
    }

    #[test]
    fn unlink_removes_only_symlinks() {
        let f = fixture();
        let linked = f.resource(".bashrc");
        let real = f.resource(".profile");
        linked.apply().unwrap();
        fs::write(&real.link, "mine").unwrap();

        assert_eq!(linked.remove().unwrap(), ResourceChange::Applied);
        assert!(linked.link.symlink_metadata().is_err());
        assert!(linked.target.is_file(), "repository file must survive");

        assert_eq!(
            real.remove().unwrap(),
            ResourceChange::Skipped {
                reason: SkipReason::SymlinkConflict
            }
        );
        assert_eq!(fs::read_to_string(&real.link).unwrap(), "mine");
    }

    #[test]
    fn unlink_absent_is_already_correct() {
        let f = fixture();
        let r = f.resource(".zshrc");
        assert_eq!(r.remove().unwrap(), ResourceChange::AlreadyCorrect);
    }

    #[test]
    fn unlink_removes_foreign_and_dangling_symlinks() {
        let f = fixture();
        let r = f.resource(".inputrc");
        symlink("/does/not/exist", &r.link).unwrap();
        assert_eq!(r.remove().unwrap(), ResourceChange::Applied);
        assert_eq!(r.link_kind().unwrap(), LinkKind::Absent);
    }

    #[test]
    fn link_kind_reports_slot_contents() {
        let f = fixture();
        let r = f.resource("a");
        assert_eq!(r.link_kind().unwrap(), LinkKind::Absent);
        fs::write(&r.link, "x").unwrap();
        assert_eq!(r.link_kind().unwrap(), LinkKind::Occupied);
        fs::remove_file(&r.link).unwrap();
        symlink(&r.target, &r.link).unwrap();
        assert_eq!(r.link_kind().unwrap(), LinkKind::Symlink(r.target.clone()));
    }

    #[test]
    fn paths_equal_works() {
        assert!(paths_equal(Path::new("/tmp/test"), Path::new("/tmp/test")));
        assert!(!paths_equal(Path::new("/tmp/test"), Path::new("/tmp/other")));
    }
}
