//! Recursive remote delete.
//!
//! SFTP can only remove files and empty directories, so a directory tree is
//! taken apart as a depth-first post-order walk: every child goes before its
//! parent, and a directory is removed only once it is provably empty. The
//! walk keeps its own stack, so tree depth is not bounded by the call stack.
//!
//! The first failed removal aborts the walk. Nothing is rolled back; entries
//! removed before the failure stay removed.

use crate::backend::FsBackend;
use crate::error::{GateError, OpPhase};
use crate::ops::path::join_remote_path;

enum Step {
    /// List the directory and schedule its children.
    Expand(String),
    /// All children are gone; remove the directory itself.
    RemoveDir(String),
}

/// Delete `path`, recursing into it when it is a directory.
///
/// Returns the number of entries removed.
pub fn delete<F: FsBackend + ?Sized>(fs: &F, path: &str) -> Result<u64, GateError> {
    let stat = fs
        .stat(path)
        .map_err(|e| GateError::op(OpPhase::Delete, path, e))?;

    if !stat.is_dir {
        fs.remove_file(path)
            .map_err(|e| GateError::op(OpPhase::Delete, path, e))?;
        tracing::debug!("Deleted file {}", path);
        return Ok(1);
    }

    let mut removed = 0u64;
    let mut stack = vec![Step::Expand(path.to_string())];

    while let Some(step) = stack.pop() {
        match step {
            Step::Expand(dir) => {
                let children = fs
                    .read_dir(&dir)
                    .map_err(|e| GateError::op(OpPhase::Delete, dir.as_str(), e))?;

                stack.push(Step::RemoveDir(dir.clone()));

                // Files are removed right away; subdirectories are pushed so
                // they are fully handled before this directory's RemoveDir.
                let mut subdirs = Vec::new();
                for (name, child) in children {
                    let child_path = join_remote_path(&dir, &name);
                    if child.is_dir {
                        subdirs.push(child_path);
                    } else {
                        fs.remove_file(&child_path)
                            .map_err(|e| GateError::op(OpPhase::Delete, child_path.as_str(), e))?;
                        removed += 1;
                    }
                }
                // Reverse so subdirectories are visited in listing order.
                for sub in subdirs.into_iter().rev() {
                    stack.push(Step::Expand(sub));
                }
            }
            Step::RemoveDir(dir) => {
                fs.remove_dir(&dir)
                    .map_err(|e| GateError::op(OpPhase::Delete, dir.as_str(), e))?;
                removed += 1;
            }
        }
    }

    tracing::debug!("Deleted {} entries under {}", removed, path);
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::local::LocalBackend;
    use crate::ops::testing::{path_str, FailingBackend, RecordingBackend};
    use std::fs;

    #[test]
    fn deletes_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("x.txt");
        fs::write(&file, b"x").unwrap();

        let removed = delete(&LocalBackend::new(), &path_str(&file)).unwrap();
        assert_eq!(removed, 1);
        assert!(!file.exists());
    }

    #[test]
    fn removes_children_before_parent() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a");
        fs::create_dir(&a).unwrap();
        fs::write(a.join("x"), b"x").unwrap();
        fs::create_dir(a.join("b")).unwrap();

        let fs_rec = RecordingBackend::new(LocalBackend::new());
        let root = path_str(&a);
        delete(&fs_rec, &root).unwrap();

        assert_eq!(
            fs_rec.calls(),
            vec![
                format!("rm {}/x", root),
                format!("rmdir {}/b", root),
                format!("rmdir {}", root),
            ]
        );
        assert!(!a.exists());
    }

    #[test]
    fn deletes_deep_tree_completely() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("root");
        let mut deep = root.clone();
        for i in 0..50 {
            deep = deep.join(format!("level{}", i));
        }
        fs::create_dir_all(&deep).unwrap();
        fs::write(deep.join("leaf.txt"), b"leaf").unwrap();
        fs::write(root.join("top.txt"), b"top").unwrap();
        fs::create_dir_all(root.join("side/branch")).unwrap();
        fs::write(root.join("side/branch/f"), b"f").unwrap();

        let removed = delete(&LocalBackend::new(), &path_str(&root)).unwrap();
        // 1 root + 50 levels + leaf + top + side + branch + f
        assert_eq!(removed, 56);
        assert!(!root.exists());
    }

    #[test]
    fn every_directory_removed_after_its_contents() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("t");
        fs::create_dir_all(root.join("p/q")).unwrap();
        fs::write(root.join("p/q/1"), b"1").unwrap();
        fs::write(root.join("p/2"), b"2").unwrap();
        fs::create_dir_all(root.join("r")).unwrap();

        let fs_rec = RecordingBackend::new(LocalBackend::new());
        delete(&fs_rec, &path_str(&root)).unwrap();

        let ops = fs_rec.calls();
        let position = |target: &str| ops.iter().position(|op| op.ends_with(target)).unwrap();
        for (child, parent) in [
            ("/t/p/q/1", "/t/p/q"),
            ("/t/p/q", "/t/p"),
            ("/t/p/2", "/t/p"),
            ("/t/p", "/t"),
            ("/t/r", "/t"),
        ] {
            assert!(
                position(child) < position(parent),
                "{} must be removed before {}: {:?}",
                child,
                parent,
                ops
            );
        }
    }

    #[test]
    fn first_failure_aborts_without_rollback() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a");
        fs::create_dir(&a).unwrap();
        fs::write(a.join("1.txt"), b"1").unwrap();
        fs::create_dir(a.join("locked")).unwrap();
        fs::write(a.join("locked/inner.txt"), b"i").unwrap();

        let locked = path_str(&a.join("locked/inner.txt"));
        let failing = FailingBackend::new(LocalBackend::new(), &locked);
        let err = delete(&failing, &path_str(&a)).unwrap_err();

        match &err {
            GateError::Operation { phase, path, .. } => {
                assert_eq!(*phase, OpPhase::Delete);
                assert_eq!(path, &locked);
            }
            other => panic!("Expected Operation error, got: {:?}", other),
        }
        assert_eq!(err.code(), "SFTP_DELETE_ERROR");
        // Already-removed files stay removed; the rest of the tree survives.
        assert!(!a.join("1.txt").exists());
        assert!(a.join("locked/inner.txt").exists());
        assert!(a.exists());
    }

    #[test]
    fn missing_path_is_delete_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = path_str(&dir.path().join("nope"));
        let err = delete(&LocalBackend::new(), &missing).unwrap_err();
        assert_eq!(err.code(), "SFTP_DELETE_ERROR");
    }
}
