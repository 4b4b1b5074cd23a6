//! Scoped backup of the subject file.
//!
//! A [`Backup`] is taken before a mutation is written and consumed by
//! [`Backup::restore`]. A backup that is dropped without being restored
//! (early return, panic) restores itself on drop.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Backup failures.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The subject could not be copied to the side file.
    #[error("failed to back up {path}: {source}")]
    Create {
        /// Subject path.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
    /// The subject could not be restored. The file on disk may still be mutated.
    #[error("failed to restore {path} from backup, file may be left mutated: {source}")]
    Restore {
        /// Subject path.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
}

/// Side-file copy of a subject, valid until restored.
#[derive(Debug)]
#[must_use = "a backup restores the subject when dropped"]
pub struct Backup {
    target: PathBuf,
    backup: PathBuf,
    armed: bool,
}

/// Side-file location used for `path` (`<path>.bak`).
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".bak");
    PathBuf::from(name)
}

impl Backup {
    /// Copy `path` to its side file.
    pub fn snapshot(path: &Path) -> Result<Self, SnapshotError> {
        let backup = backup_path(path);
        std::fs::copy(path, &backup).map_err(|source| SnapshotError::Create {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::trace!(path = %path.display(), "backup created");
        Ok(Self {
            target: path.to_path_buf(),
            backup,
            armed: true,
        })
    }

    /// Side file holding the saved bytes.
    pub fn backup_file(&self) -> &Path {
        &self.backup
    }

    /// Overwrite the subject with the saved bytes and delete the side file.
    pub fn restore(mut self) -> Result<(), SnapshotError> {
        self.armed = false;
        self.restore_inner()
    }

    fn restore_inner(&self) -> Result<(), SnapshotError> {
        let restore_err = |source| SnapshotError::Restore {
            path: self.target.clone(),
            source,
        };
        std::fs::copy(&self.backup, &self.target).map_err(restore_err)?;
        std::fs::remove_file(&self.backup).map_err(restore_err)?;
        tracing::trace!(path = %self.target.display(), "backup restored");
        Ok(())
    }
}

impl Drop for Backup {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(err) = self.restore_inner() {
            tracing::error!(error = %err, "restore on drop failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn restore_is_byte_exact_and_removes_side_file() {
        let tmp = tempdir().expect("tempdir should be created");
        let path = tmp.path().join("calculator.py");
        let original = b"def add(a, b):\r\n    return a + b\n\xe2\x9c\x93 no newline";
        std::fs::write(&path, original).expect("subject should be written");

        let backup = Backup::snapshot(&path).expect("snapshot should succeed");
        assert!(backup.backup_file().exists());
        std::fs::write(&path, b"garbage").expect("mutation should be written");

        backup.restore().expect("restore should succeed");
        assert_eq!(std::fs::read(&path).expect("subject should read"), original);
        assert!(!backup_path(&path).exists());
    }

    #[test]
    fn dropped_backup_restores_subject() {
        let tmp = tempdir().expect("tempdir should be created");
        let path = tmp.path().join("calculator.py");
        std::fs::write(&path, "return a + b\n").expect("subject should be written");

        {
            let _backup = Backup::snapshot(&path).expect("snapshot should succeed");
            std::fs::write(&path, "return a - b\n").expect("mutation should be written");
        }

        assert_eq!(
            std::fs::read_to_string(&path).expect("subject should read"),
            "return a + b\n"
        );
        assert!(!backup_path(&path).exists());
    }

    #[test]
    fn snapshot_of_missing_file_is_create_error() {
        let tmp = tempdir().expect("tempdir should be created");
        let err = Backup::snapshot(&tmp.path().join("missing.py")).unwrap_err();
        assert!(matches!(err, SnapshotError::Create { .. }));
    }

    #[test]
    fn restore_without_side_file_is_restore_error() {
        let tmp = tempdir().expect("tempdir should be created");
        let path = tmp.path().join("calculator.py");
        std::fs::write(&path, "x = 1\n").expect("subject should be written");

        let backup = Backup::snapshot(&path).expect("snapshot should succeed");
        std::fs::remove_file(backup.backup_file()).expect("side file should be removed");

        let err = backup.restore().unwrap_err();
        assert!(matches!(err, SnapshotError::Restore { .. }));
    }

    proptest! {
        #[test]
        fn snapshot_then_restore_round_trips_any_bytes(
            original in proptest::collection::vec(any::<u8>(), 0..512),
            mutated in proptest::collection::vec(any::<u8>(), 0..512),
        ) {
            let tmp = tempdir().expect("tempdir should be created");
            let path = tmp.path().join("subject.py");
            std::fs::write(&path, &original).expect("subject should be written");

            let backup = Backup::snapshot(&path).expect("snapshot should succeed");
            std::fs::write(&path, &mutated).expect("mutation should be written");
            backup.restore().expect("restore should succeed");

            prop_assert_eq!(std::fs::read(&path).expect("subject should read"), original);
        }
    }
}
