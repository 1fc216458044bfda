use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use chrono::{DateTime, Utc};

use crate::backend::{FileStat, FsBackend};

/// Buffer size for BufReader/BufWriter: 256KB.
const BUF_SIZE: usize = 256 * 1024;

/// Local filesystem backend using std::fs.
///
/// Serves the local directory listing and stands in for a remote host in
/// tests, since it shares the primitive set with the SFTP connection.
pub struct LocalBackend;

impl LocalBackend {
    pub fn new() -> Self {
        LocalBackend
    }
}

impl Default for LocalBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert std::fs::Metadata to FileStat.
fn metadata_to_stat(meta: &std::fs::Metadata) -> FileStat {
    let modified = meta.modified().ok().map(DateTime::<Utc>::from);

    #[cfg(unix)]
    let permissions = {
        use std::os::unix::fs::PermissionsExt;
        Some(meta.permissions().mode())
    };

    #[cfg(not(unix))]
    let permissions = None;

    FileStat {
        size: meta.len(),
        is_dir: meta.is_dir(),
        modified,
        permissions,
    }
}

impl FsBackend for LocalBackend {
    fn stat(&self, path: &str) -> std::io::Result<FileStat> {
        let meta = std::fs::metadata(path)?;
        Ok(metadata_to_stat(&meta))
    }

    fn read_dir(&self, path: &str) -> std::io::Result<Vec<(String, FileStat)>> {
        let mut entries = Vec::new();
        for entry_result in std::fs::read_dir(path)? {
            let entry = entry_result?;
            // Entries that vanish or deny metadata between readdir and stat are skipped.
            let meta = match entry.metadata() {
                Ok(meta) => meta,
                Err(e) => {
                    tracing::debug!(
                        "Skipping {}: {}",
                        entry.path().display(),
                        e
                    );
                    continue;
                }
            };
            let name = entry.file_name().to_string_lossy().to_string();
            entries.push((name, metadata_to_stat(&meta)));
        }
        Ok(entries)
    }

    fn mkdir(&self, path: &str) -> std::io::Result<()> {
        std::fs::create_dir(path)
    }

    fn rename(&self, from: &str, to: &str) -> std::io::Result<()> {
        std::fs::rename(from, to)
    }

    fn remove_file(&self, path: &str) -> std::io::Result<()> {
        std::fs::remove_file(path)
    }

    fn remove_dir(&self, path: &str) -> std::io::Result<()> {
        std::fs::remove_dir(path)
    }

    fn read_into(&self, path: &str, sink: &mut dyn Write) -> std::io::Result<u64> {
        let file = std::fs::File::open(path)?;
        let mut reader = BufReader::with_capacity(BUF_SIZE, file);
        std::io::copy(&mut reader, sink)
    }

    fn write_from(&self, path: &str, source: &mut dyn Read) -> std::io::Result<u64> {
        let file = std::fs::File::create(Path::new(path))?;
        let mut writer = BufWriter::with_capacity(BUF_SIZE, file);
        let written = std::io::copy(source, &mut writer)?;
        writer.flush()?;
        Ok(written)
    }
}

/// The current user's home directory, or `/` when it cannot be determined.
pub fn home_dir() -> String {
    dirs::home_dir()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|| "/".to_string())
}
