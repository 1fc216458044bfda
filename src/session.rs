//! The process-wide remote session.
//!
//! A [`Session`] owns the single live [`RemoteConnection`] plus the local
//! download directory. Request handlers fetch the connection under a shared
//! read lock so they never block each other; [`Session::close`] takes the
//! exclusive lock, so it waits for in-flight readers before tearing the
//! connection down.
//!
//! [`SessionCell`] is the constructor guard that keeps "exactly one session"
//! true: the first `initialize` wins and every later call gets the winner.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, RwLock};

use crate::backend::RemoteConnection;

pub struct Session {
    connection: RwLock<Arc<dyn RemoteConnection>>,
    download_dir: PathBuf,
    closed: AtomicBool,
}

impl Session {
    fn new(connection: Arc<dyn RemoteConnection>, download_dir: PathBuf) -> Self {
        Session {
            connection: RwLock::new(connection),
            download_dir,
            closed: AtomicBool::new(false),
        }
    }

    /// The held connection. After [`close`](Self::close) this is the closed
    /// handle, whose operations fail with a transport error.
    pub fn connection(&self) -> Arc<dyn RemoteConnection> {
        match self.connection.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// False once [`close`](Self::close) has run.
    pub fn is_open(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    /// Close the underlying connection. Safe to call more than once.
    pub fn close(&self) {
        let guard = match self.connection.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        tracing::info!("Closing session {}", guard.info());
        guard.close();
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Holds at most one [`Session`] for the lifetime of the cell.
#[derive(Default)]
pub struct SessionCell {
    inner: OnceLock<Arc<Session>>,
}

impl SessionCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `connection` and `download_dir` as the session.
    ///
    /// Only the first call has effect; later calls (including concurrent
    /// ones that lose the race) are ignored and get the existing session.
    /// A losing connection is dropped, not installed.
    pub fn initialize(
        &self,
        connection: Arc<dyn RemoteConnection>,
        download_dir: PathBuf,
    ) -> Arc<Session> {
        let mut installed = false;
        let session = self.inner.get_or_init(|| {
            installed = true;
            Arc::new(Session::new(connection, download_dir))
        });
        if !installed {
            tracing::debug!("Session already initialized; ignoring");
        }
        Arc::clone(session)
    }

    /// The session, or `None` before [`initialize`](Self::initialize).
    pub fn current(&self) -> Option<Arc<Session>> {
        self.inner.get().cloned()
    }
}
