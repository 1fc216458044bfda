pub mod hostkey;
pub mod local;
pub mod sftp;

use std::io::{Read, Write};

use chrono::{DateTime, Utc};

/// Metadata about a file or directory.
#[derive(Debug, Clone)]
pub struct FileStat {
    pub size: u64,
    pub is_dir: bool,
    pub modified: Option<DateTime<Utc>>,
    /// Raw mode bits, including the file-type bits when the backend reports them.
    pub permissions: Option<u32>,
}

/// Filesystem primitives the operations layer is built on.
///
/// Paths are plain strings because remote paths always use `/` regardless
/// of the local platform. Every method performs exactly one protocol call
/// (or one local syscall family); composite behaviour such as recursive
/// delete and parent creation lives in [`crate::ops`].
///
/// Synchronous trait -- all I/O is blocking from the caller's perspective.
pub trait FsBackend: Send + Sync {
    /// Get file/directory metadata.
    fn stat(&self, path: &str) -> std::io::Result<FileStat>;

    /// List directory contents (non-recursive) as `(leaf name, stat)` pairs.
    fn read_dir(&self, path: &str) -> std::io::Result<Vec<(String, FileStat)>>;

    /// Create a single directory level.
    fn mkdir(&self, path: &str) -> std::io::Result<()>;

    fn rename(&self, from: &str, to: &str) -> std::io::Result<()>;

    fn remove_file(&self, path: &str) -> std::io::Result<()>;

    /// Remove an empty directory.
    fn remove_dir(&self, path: &str) -> std::io::Result<()>;

    /// Copy the whole file at `path` into `sink`, returning the byte count.
    fn read_into(&self, path: &str, sink: &mut dyn Write) -> std::io::Result<u64>;

    /// Create or truncate `path` and fill it from `source`.
    fn write_from(&self, path: &str, source: &mut dyn Read) -> std::io::Result<u64>;
}

/// A live remote connection: filesystem primitives plus lifecycle.
pub trait RemoteConnection: FsBackend {
    /// Display string `user@host`. Performs no network I/O.
    fn info(&self) -> String;

    /// Release the connection. Idempotent; later calls are no-ops and later
    /// filesystem calls fail with [`closed_error`].
    fn close(&self);
}

/// The error every primitive returns once its connection has been closed.
pub fn closed_error() -> std::io::Error {
    std::io::Error::new(
        std::io::ErrorKind::NotConnected,
        "remote connection is closed",
    )
}

/// Render mode bits the way `ls -l` does, e.g. `drwxr-xr-x`.
///
/// The type character comes from the mode's file-type bits when present and
/// falls back to `is_dir` for backends that only report permission bits.
pub fn format_mode(mode: Option<u32>, is_dir: bool) -> String {
    const S_IFMT: u32 = 0o170000;
    const S_IFDIR: u32 = 0o040000;
    const S_IFLNK: u32 = 0o120000;

    let mode = mode.unwrap_or(if is_dir { S_IFDIR | 0o755 } else { 0o644 });
    let kind = match mode & S_IFMT {
        S_IFDIR => 'd',
        S_IFLNK => 'l',
        0 if is_dir => 'd',
        _ => '-',
    };

    let mut out = String::with_capacity(10);
    out.push(kind);
    for shift in [6u32, 3, 0] {
        let bits = (mode >> shift) & 0o7;
        out.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        out.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        out.push(if bits & 0o1 != 0 { 'x' } else { '-' });
    }
    out
}
