//! SFTP connection using the ssh2 crate (libssh2 bindings).
//!
//! Provides `SftpConnection`, the single remote connection the session owns.
//! Authenticates with exactly one credential (password or private key file)
//! and verifies the host key according to a [`HostKeyPolicy`] before sending
//! any credential.
//!
//! # Thread safety
//!
//! `libssh2` is **not** thread-safe. `ssh2::Session` and `ssh2::Sftp` must
//! never be accessed concurrently from multiple threads. All `FsBackend`
//! methods acquire the `Mutex<Option<SftpInner>>` for the duration of one
//! protocol call, which serializes remote traffic from concurrent API
//! requests. `None` inside the mutex means the connection has been closed.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::DateTime;
use ssh2::{HashType, Session, Sftp};
use zeroize::Zeroizing;

use crate::backend::hostkey::{format_sha256_fingerprint, HostKeyPolicy};
use crate::backend::{closed_error, FileStat, FsBackend, RemoteConnection};
use crate::error::GateError;

/// Connection timeout for TCP connection to SFTP server (30 seconds).
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// The single credential used to authenticate.
pub enum Credential {
    Password(Zeroizing<String>),
    IdentityFile(std::path::PathBuf),
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::Password(_) => f.write_str("Password(***)"),
            Credential::IdentityFile(path) => write!(f, "IdentityFile({})", path.display()),
        }
    }
}

/// Inner connection state that owns the libssh2 handles.
///
/// Both `Session` and `Sftp` are stored together so a single `Mutex` covers
/// all libssh2 calls. `Sftp` internally borrows resources from `Session`.
struct SftpInner {
    session: Session,
    sftp: Sftp,
}

// SAFETY: `SftpInner` is only ever reached through `Mutex<Option<SftpInner>>`,
// so at most one thread touches the libssh2 handles at any instant.
unsafe impl Send for SftpInner {}

/// One authenticated SFTP channel to a remote host.
pub struct SftpConnection {
    inner: Mutex<Option<SftpInner>>,
    host: String,
    user: String,
}

impl SftpConnection {
    /// Dial, verify the host key, authenticate and open the SFTP subsystem.
    ///
    /// Any failure after the TCP dial disconnects the SSH session before
    /// returning, so no half-open connection is leaked.
    pub fn open(
        host: &str,
        port: u16,
        user: &str,
        credential: &Credential,
        host_keys: &HostKeyPolicy,
    ) -> Result<Self, GateError> {
        let tcp = dial(host, port)?;

        let mut session =
            Session::new().map_err(|e| conn_err(host, "Failed to create SSH session", e))?;
        session.set_tcp_stream(tcp);
        session
            .handshake()
            .map_err(|e| conn_err(host, "SSH handshake failed", e))?;

        let sftp = match negotiate(&session, host, port, user, credential, host_keys) {
            Ok(sftp) => sftp,
            Err(e) => {
                let _ = session.disconnect(None, "connection setup failed", None);
                return Err(e);
            }
        };

        Ok(SftpConnection {
            inner: Mutex::new(Some(SftpInner { session, sftp })),
            host: host.to_string(),
            user: user.to_string(),
        })
    }

    /// Acquire the inner mutex, converting a poisoned mutex into an I/O error.
    fn lock(&self) -> std::io::Result<MutexGuard<'_, Option<SftpInner>>> {
        self.inner.lock().map_err(|_| {
            std::io::Error::new(
                std::io::ErrorKind::Other,
                "SFTP connection mutex was poisoned; a previous operation panicked",
            )
        })
    }

    /// Run `f` against the live SFTP handle, or fail if the connection is closed.
    fn with_sftp<T>(&self, f: impl FnOnce(&Sftp) -> Result<T, ssh2::Error>) -> std::io::Result<T> {
        let guard = self.lock()?;
        let inner = guard.as_ref().ok_or_else(closed_error)?;
        f(&inner.sftp).map_err(sftp_err)
    }
}

/// Resolve `host:port` and connect to the first address that answers.
fn dial(host: &str, port: u16) -> Result<TcpStream, GateError> {
    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|e| GateError::Connection {
            host: host.to_string(),
            reason: format!("Cannot resolve '{}:{}': {}", host, port, e),
        })?
        .collect();

    let mut last_err = None;
    for addr in &addrs {
        match TcpStream::connect_timeout(addr, CONNECT_TIMEOUT) {
            Ok(tcp) => return Ok(tcp),
            Err(e) => {
                tracing::debug!("SFTP: dial {} failed: {}", addr, e);
                last_err = Some(e);
            }
        }
    }

    Err(GateError::Connection {
        host: host.to_string(),
        reason: match last_err {
            Some(e) => format!("TCP connection failed: {}", e),
            None => format!("No addresses found for '{}:{}'", host, port),
        },
    })
}

/// Host key check, authentication and SFTP subsystem start-up.
fn negotiate(
    session: &Session,
    host: &str,
    port: u16,
    user: &str,
    credential: &Credential,
    host_keys: &HostKeyPolicy,
) -> Result<Sftp, GateError> {
    let (_, key_type) = session.host_key().ok_or_else(|| GateError::Connection {
        host: host.to_string(),
        reason: "Server did not provide a host key during handshake.".to_string(),
    })?;
    let hash = session
        .host_key_hash(HashType::Sha256)
        .ok_or_else(|| GateError::Connection {
            host: host.to_string(),
            reason: "Server host key hash is unavailable.".to_string(),
        })?;
    let fingerprint = format_sha256_fingerprint(hash);
    host_keys.verify(host, port, &fingerprint, &format!("{:?}", key_type))?;

    authenticate(session, user, credential).map_err(|reason| GateError::Connection {
        host: host.to_string(),
        reason: format!("Authentication failed for user '{}': {}", user, reason),
    })?;

    session
        .sftp()
        .map_err(|e| conn_err(host, "Failed to open SFTP channel", e))
}

/// Authenticate with the single configured credential.
fn authenticate(session: &Session, user: &str, credential: &Credential) -> Result<(), String> {
    match credential {
        Credential::Password(password) => {
            session
                .userauth_password(user, password)
                .map_err(|e| e.to_string())?;
        }
        Credential::IdentityFile(path) => {
            let key = Zeroizing::new(
                std::fs::read_to_string(path)
                    .map_err(|e| format!("failed to read private key {}: {}", path.display(), e))?,
            );
            session
                .userauth_pubkey_memory(user, None, &key, None)
                .map_err(|e| format!("failed to use private key {}: {}", path.display(), e))?;
        }
    }

    if session.authenticated() {
        Ok(())
    } else {
        Err("server did not accept the credential".to_string())
    }
}

fn conn_err(host: &str, what: &str, e: ssh2::Error) -> GateError {
    GateError::Connection {
        host: host.to_string(),
        reason: format!("{}: {}", what, e),
    }
}

/// Convert an ssh2::Error to std::io::Error.
fn sftp_err(e: ssh2::Error) -> std::io::Error {
    e.into()
}

fn to_stat(stat: &ssh2::FileStat) -> FileStat {
    FileStat {
        size: stat.size.unwrap_or(0),
        is_dir: stat.is_dir(),
        modified: stat
            .mtime
            .and_then(|t| DateTime::from_timestamp(t as i64, 0)),
        permissions: stat.perm,
    }
}

impl FsBackend for SftpConnection {
    fn stat(&self, path: &str) -> std::io::Result<FileStat> {
        let stat = self.with_sftp(|sftp| sftp.stat(Path::new(path)))?;
        Ok(to_stat(&stat))
    }

    fn read_dir(&self, path: &str) -> std::io::Result<Vec<(String, FileStat)>> {
        let entries = self.with_sftp(|sftp| sftp.readdir(Path::new(path)))?;

        let mut result = Vec::with_capacity(entries.len());
        for (entry_path, stat) in entries {
            let name = match entry_path.file_name() {
                Some(name) => name.to_string_lossy().to_string(),
                None => continue,
            };
            // Filter out . and .. entries
            if name == "." || name == ".." {
                continue;
            }
            result.push((name, to_stat(&stat)));
        }
        Ok(result)
    }

    fn mkdir(&self, path: &str) -> std::io::Result<()> {
        self.with_sftp(|sftp| sftp.mkdir(Path::new(path), 0o755))
    }

    fn rename(&self, from: &str, to: &str) -> std::io::Result<()> {
        self.with_sftp(|sftp| sftp.rename(Path::new(from), Path::new(to), None))
    }

    fn remove_file(&self, path: &str) -> std::io::Result<()> {
        self.with_sftp(|sftp| sftp.unlink(Path::new(path)))
    }

    fn remove_dir(&self, path: &str) -> std::io::Result<()> {
        self.with_sftp(|sftp| sftp.rmdir(Path::new(path)))
    }

    fn read_into(&self, path: &str, sink: &mut dyn Write) -> std::io::Result<u64> {
        // `ssh2::File` borrows from `Sftp`, so the whole copy runs under the lock.
        let guard = self.lock()?;
        let inner = guard.as_ref().ok_or_else(closed_error)?;
        let mut file = inner.sftp.open(Path::new(path)).map_err(sftp_err)?;
        std::io::copy(&mut file, sink)
    }

    fn write_from(&self, path: &str, source: &mut dyn Read) -> std::io::Result<u64> {
        let guard = self.lock()?;
        let inner = guard.as_ref().ok_or_else(closed_error)?;
        let mut file = inner.sftp.create(Path::new(path)).map_err(sftp_err)?;
        let written = std::io::copy(source, &mut file)?;
        file.flush()?;
        Ok(written)
    }
}

impl RemoteConnection for SftpConnection {
    fn info(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }

    fn close(&self) {
        let taken = match self.inner.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(SftpInner { session, sftp }) = taken {
            // Filesystem handle first, then the transport. Both best-effort.
            drop(sftp);
            if let Err(e) = session.disconnect(None, "closing", None) {
                tracing::debug!("SFTP: disconnect from {} failed: {}", self.host, e);
            }
            tracing::info!("Closed SFTP connection to {}", self.info());
        }
    }
}

impl Drop for SftpConnection {
    fn drop(&mut self) {
        self.close();
    }
}
