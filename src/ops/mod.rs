//! Filesystem operations built on top of the backend primitives.
//!
//! Every function takes the backend by reference, performs no retries, and
//! wraps primitive failures in [`GateError::Operation`] tagged with the
//! operation's phase and the path that failed.

mod delete;
pub mod path;
#[cfg(test)]
pub(crate) mod testing;

use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::backend::{format_mode, FileStat, FsBackend};
use crate::error::{GateError, OpPhase};

pub use delete::delete;
pub use path::{base_name, join_remote_path};

/// Buffer size for local staging reads and writes: 256KB.
const BUF_SIZE: usize = 256 * 1024;

/// One filesystem node as reported to API callers.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub name: String,
    pub path: String,
    pub size: u64,
    pub is_dir: bool,
    pub mod_time: Option<DateTime<Utc>>,
    pub permissions: String,
}

impl FileEntry {
    fn new(name: String, path: String, stat: &FileStat) -> Self {
        FileEntry {
            name,
            path,
            size: stat.size,
            is_dir: stat.is_dir,
            mod_time: stat.modified,
            permissions: format_mode(stat.permissions, stat.is_dir),
        }
    }
}

fn list_entries<F: FsBackend + ?Sized>(
    fs: &F,
    path: &str,
    phase: OpPhase,
) -> Result<Vec<FileEntry>, GateError> {
    let children = fs.read_dir(path).map_err(|e| GateError::op(phase, path, e))?;
    Ok(children
        .into_iter()
        .map(|(name, stat)| {
            let full = join_remote_path(path, &name);
            FileEntry::new(name, full, &stat)
        })
        .collect())
}

/// Immediate children of `path`, each with `path = join(path, name)`.
pub fn list_dir<F: FsBackend + ?Sized>(fs: &F, path: &str) -> Result<Vec<FileEntry>, GateError> {
    list_entries(fs, path, OpPhase::List)
}

/// Same normalization as [`list_dir`] for the local side of the browser.
pub fn list_local_dir<F: FsBackend + ?Sized>(
    fs: &F,
    path: &str,
) -> Result<Vec<FileEntry>, GateError> {
    list_entries(fs, path, OpPhase::LocalList)
}

/// Create `path` and any missing ancestors. Existing directories are fine.
pub fn make_dir_all<F: FsBackend + ?Sized>(fs: &F, path: &str) -> Result<(), GateError> {
    for current in path::ancestors_inclusive(path) {
        match fs.stat(&current) {
            Ok(stat) if stat.is_dir => continue,
            Ok(_) => {
                return Err(GateError::Operation {
                    phase: OpPhase::Mkdir,
                    path: current,
                    reason: "exists and is not a directory".to_string(),
                })
            }
            Err(_) => {}
        }

        if let Err(e) = fs.mkdir(&current) {
            // Another request may have created it in the meantime.
            if matches!(fs.stat(&current), Ok(stat) if stat.is_dir) {
                continue;
            }
            return Err(GateError::op(OpPhase::Mkdir, current, e));
        }
        tracing::debug!("Created directory {}", current);
    }
    Ok(())
}

/// Rename or move `old_path` to `new_path`.
///
/// An existing destination is rejected rather than overwritten, whatever
/// the server would do on its own.
pub fn rename<F: FsBackend + ?Sized>(
    fs: &F,
    old_path: &str,
    new_path: &str,
) -> Result<(), GateError> {
    fs.stat(old_path)
        .map_err(|e| GateError::op(OpPhase::Rename, old_path, e))?;

    if fs.stat(new_path).is_ok() {
        return Err(GateError::Operation {
            phase: OpPhase::Rename,
            path: new_path.to_string(),
            reason: "destination already exists".to_string(),
        });
    }

    fs.rename(old_path, new_path)
        .map_err(|e| GateError::op(OpPhase::Rename, old_path, e))
}

/// Entry for the single node at `path`.
pub fn stat<F: FsBackend + ?Sized>(fs: &F, path: &str) -> Result<FileEntry, GateError> {
    let stat = fs.stat(path).map_err(|e| GateError::op(OpPhase::Stat, path, e))?;
    Ok(FileEntry::new(
        base_name(path).to_string(),
        path.to_string(),
        &stat,
    ))
}

/// Copy a remote file to `local_path`, replacing it only once the transfer
/// has finished.
///
/// Bytes are staged in a temp file next to `local_path` and renamed over it
/// on success. On failure the temp file is dropped and an existing file at
/// `local_path` is left untouched.
pub fn download<F: FsBackend + ?Sized>(
    fs: &F,
    remote_path: &str,
    local_path: &Path,
) -> Result<u64, GateError> {
    let local_err =
        |e: std::io::Error| GateError::op(OpPhase::Download, local_path.to_string_lossy(), e);

    let dir = match local_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let staged = tempfile::Builder::new()
        .prefix(".sftpgate-download-")
        .tempfile_in(dir)
        .map_err(local_err)?;

    let bytes = {
        let mut writer = BufWriter::with_capacity(BUF_SIZE, staged.as_file());
        fs.read_into(remote_path, &mut writer)
            .and_then(|n| writer.flush().map(|_| n))
            .map_err(|e| GateError::op(OpPhase::Download, remote_path, e))?
    };

    staged.persist(local_path).map_err(|e| local_err(e.error))?;
    tracing::debug!(
        "Downloaded {} ({} bytes) to {}",
        remote_path,
        bytes,
        local_path.display()
    );
    Ok(bytes)
}

/// Copy a local file to `remote_path`, creating or truncating it.
pub fn upload<F: FsBackend + ?Sized>(
    fs: &F,
    local_path: &Path,
    remote_path: &str,
) -> Result<u64, GateError> {
    let file = std::fs::File::open(local_path)
        .map_err(|e| GateError::op(OpPhase::Upload, local_path.to_string_lossy(), e))?;
    let mut reader = BufReader::with_capacity(BUF_SIZE, file);

    let bytes = fs
        .write_from(remote_path, &mut reader)
        .map_err(|e| GateError::op(OpPhase::Upload, remote_path, e))?;
    tracing::debug!(
        "Uploaded {} ({} bytes) to {}",
        local_path.display(),
        bytes,
        remote_path
    );
    Ok(bytes)
}
