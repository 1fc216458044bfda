//! Test doubles wrapping a real backend.

use std::io::{Read, Write};
use std::path::Path;
use std::sync::Mutex;

use crate::backend::{FileStat, FsBackend};

pub fn path_str(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

/// Records every removal in call order, then delegates.
pub struct RecordingBackend<B> {
    inner: B,
    log: Mutex<Vec<String>>,
}

impl<B: FsBackend> RecordingBackend<B> {
    pub fn new(inner: B) -> Self {
        Self {
            inner,
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn record(&self, entry: String) {
        self.log.lock().unwrap().push(entry);
    }
}

impl<B: FsBackend> FsBackend for RecordingBackend<B> {
    fn stat(&self, path: &str) -> std::io::Result<FileStat> {
        self.inner.stat(path)
    }
    fn read_dir(&self, path: &str) -> std::io::Result<Vec<(String, FileStat)>> {
        self.inner.read_dir(path)
    }
    fn mkdir(&self, path: &str) -> std::io::Result<()> {
        self.record(format!("mkdir {}", path));
        self.inner.mkdir(path)
    }
    fn rename(&self, from: &str, to: &str) -> std::io::Result<()> {
        self.inner.rename(from, to)
    }
    fn remove_file(&self, path: &str) -> std::io::Result<()> {
        self.record(format!("rm {}", path));
        self.inner.remove_file(path)
    }
    fn remove_dir(&self, path: &str) -> std::io::Result<()> {
        self.record(format!("rmdir {}", path));
        self.inner.remove_dir(path)
    }
    fn read_into(&self, path: &str, sink: &mut dyn Write) -> std::io::Result<u64> {
        self.inner.read_into(path, sink)
    }
    fn write_from(&self, path: &str, source: &mut dyn Read) -> std::io::Result<u64> {
        self.inner.write_from(path, source)
    }
}

impl<B: FsBackend> RecordingBackend<B> {
    /// Only the `mkdir` calls, without the prefix.
    pub fn mkdirs(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|op| op.strip_prefix("mkdir ").map(str::to_string))
            .collect()
    }
}

/// Refuses to remove one specific path with `PermissionDenied`.
pub struct FailingBackend<B> {
    inner: B,
    refuse: String,
}

impl<B: FsBackend> FailingBackend<B> {
    pub fn new(inner: B, refuse: &str) -> Self {
        Self {
            inner,
            refuse: refuse.to_string(),
        }
    }

    fn check(&self, path: &str) -> std::io::Result<()> {
        if path == self.refuse {
            Err(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "permission denied",
            ))
        } else {
            Ok(())
        }
    }
}

impl<B: FsBackend> FsBackend for FailingBackend<B> {
    fn stat(&self, path: &str) -> std::io::Result<FileStat> {
        self.inner.stat(path)
    }
    fn read_dir(&self, path: &str) -> std::io::Result<Vec<(String, FileStat)>> {
        self.inner.read_dir(path)
    }
    fn mkdir(&self, path: &str) -> std::io::Result<()> {
        self.inner.mkdir(path)
    }
    fn rename(&self, from: &str, to: &str) -> std::io::Result<()> {
        self.inner.rename(from, to)
    }
    fn remove_file(&self, path: &str) -> std::io::Result<()> {
        self.check(path)?;
        self.inner.remove_file(path)
    }
    fn remove_dir(&self, path: &str) -> std::io::Result<()> {
        self.check(path)?;
        self.inner.remove_dir(path)
    }
    fn read_into(&self, path: &str, sink: &mut dyn Write) -> std::io::Result<u64> {
        self.inner.read_into(path, sink)
    }
    fn write_from(&self, path: &str, source: &mut dyn Read) -> std::io::Result<u64> {
        self.inner.write_from(path, source)
    }
}
