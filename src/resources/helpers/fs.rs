//! File-system resource helpers.
use std::path::Path;

use crate::error::SymlinkError;

/// Mode for directories created on the home side.
#[cfg(unix)]
const DIR_MODE: u32 = 0o700;

/// Ensure the parent directory of `path` exists, creating it and any missing
/// ancestors (mode `0o700` on unix). Returns `true` if anything was created.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub fn ensure_parent_dir(path: &Path) -> Result<bool, SymlinkError> {
    let Some(parent) = path.parent() else {
        return Ok(false);
    };
    if parent.as_os_str().is_empty() || parent.is_dir() {
        return Ok(false);
    }

    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt as _;
        builder.mode(DIR_MODE);
    }
    builder.create(parent).map_err(|source| SymlinkError::Io {
        op: "create directory",
        path: parent.to_path_buf(),
        source,
    })?;
    Ok(true)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn creates_missing_parents() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b").join("file.txt");
        assert!(ensure_parent_dir(&nested).unwrap());
        assert!(dir.path().join("a").join("b").is_dir());
    }

    #[test]
    fn noop_when_parent_exists() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!ensure_parent_dir(&dir.path().join("file.txt")).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn created_directories_are_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        ensure_parent_dir(&dir.path().join("x").join("y").join("f")).unwrap();
        for sub in ["x", "x/y"] {
            let mode = std::fs::metadata(dir.path().join(sub))
                .unwrap()
                .permissions()
                .mode();
            // umask may only clear bits
            assert_eq!(mode & 0o077, 0, "{sub} has mode {mode:o}");
        }
    }

    #[test]
    fn parent_is_a_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "x").unwrap();
        let err = ensure_parent_dir(&blocker.join("child")).unwrap_err();
        assert!(err.to_string().starts_with("create directory"));
    }
}
