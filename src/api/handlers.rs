//! Request dispatch.
//!
//! Each handler is synchronous and blocking; the server runs them on the
//! blocking pool. Remote handlers fetch the connection from the session
//! per request, so a closed session surfaces as an operation error rather
//! than a dangling handle.

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::watch;

use crate::api::{staging, ApiError, ApiResponse, Request};
use crate::backend::local::{self, LocalBackend};
use crate::ops;
use crate::session::Session;

type Outcome = Result<Option<Value>, ApiError>;

pub struct Api {
    session: Arc<Session>,
    local: LocalBackend,
    shutdown: watch::Sender<bool>,
}

/// A required, non-empty request field.
fn required(value: Option<String>, field: &str) -> Result<String, ApiError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::invalid(format!("{} is required", field)))
}

fn to_value<T: serde::Serialize>(value: T) -> Outcome {
    serde_json::to_value(value)
        .map(Some)
        .map_err(|e| ApiError::invalid(format!("cannot encode response: {}", e)))
}

impl Api {
    pub fn new(session: Arc<Session>, shutdown: watch::Sender<bool>) -> Self {
        Api {
            session,
            local: LocalBackend::new(),
            shutdown,
        }
    }

    /// Flag shutdown to the server and every open API connection.
    pub fn begin_shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    /// Run one request to completion.
    pub fn handle(&self, request: Request) -> ApiResponse {
        tracing::debug!("API request: {:?}", RedactedRequest(&request));
        let outcome = match request {
            Request::RemoteList { path } => self.remote_list(path),
            Request::RemoteMkdir { path } => self.remote_mkdir(path),
            Request::RemoteRename { old_path, new_path } => self.remote_rename(old_path, new_path),
            Request::RemoteDelete { path } => self.remote_delete(path),
            Request::RemoteStat { path } => self.remote_stat(path),
            Request::RemoteDownload { path } => self.remote_download(path),
            Request::RemoteUpload {
                path,
                filename,
                content,
            } => self.remote_upload(path, filename, content),
            Request::LocalList { path } => self.local_list(path),
            Request::Status => self.status(),
            Request::Shutdown => self.request_shutdown(),
        };
        if let Err(err) = &outcome {
            tracing::warn!("API request failed [{}]: {}", err.code, err.message);
        }
        ApiResponse::from(outcome)
    }

    fn remote_list(&self, path: Option<String>) -> Outcome {
        let path = path.filter(|p| !p.is_empty()).unwrap_or_else(|| "/".to_string());
        let conn = self.session.connection();
        to_value(ops::list_dir(conn.as_ref(), &path)?)
    }

    fn remote_mkdir(&self, path: Option<String>) -> Outcome {
        let path = required(path, "path")?;
        let conn = self.session.connection();
        ops::make_dir_all(conn.as_ref(), &path)?;
        Ok(None)
    }

    fn remote_rename(&self, old_path: Option<String>, new_path: Option<String>) -> Outcome {
        let old_path = required(old_path, "oldPath")?;
        let new_path = required(new_path, "newPath")?;
        let conn = self.session.connection();
        ops::rename(conn.as_ref(), &old_path, &new_path)?;
        Ok(None)
    }

    fn remote_delete(&self, path: Option<String>) -> Outcome {
        let path = required(path, "path")?;
        let conn = self.session.connection();
        let removed = ops::delete(conn.as_ref(), &path)?;
        tracing::debug!("Deleted {} ({} entries)", path, removed);
        Ok(None)
    }

    fn remote_stat(&self, path: Option<String>) -> Outcome {
        let path = required(path, "path")?;
        let conn = self.session.connection();
        to_value(ops::stat(conn.as_ref(), &path)?)
    }

    fn remote_download(&self, path: Option<String>) -> Outcome {
        let path = required(path, "path")?;
        let name = ops::base_name(&path);
        if name.is_empty() || name == "." || name == ".." {
            return Err(ApiError::invalid(format!("{} does not name a file", path)));
        }
        let local_path = self.session.download_dir().join(name);

        let conn = self.session.connection();
        ops::download(conn.as_ref(), &path, &local_path)?;
        Ok(Some(json!({ "localPath": local_path.to_string_lossy() })))
    }

    fn remote_upload(
        &self,
        path: Option<String>,
        filename: Option<String>,
        content: Option<String>,
    ) -> Outcome {
        let dest_dir = required(path, "path")?;
        let filename = required(filename, "filename")?;
        if filename.contains('/') || filename == "." || filename == ".." {
            return Err(ApiError::invalid(format!("invalid filename '{}'", filename)));
        }
        let content = content.ok_or_else(|| ApiError::invalid("content is required"))?;

        let staged = staging::stage(&content)?;
        let remote_path = ops::join_remote_path(&dest_dir, &filename);

        let conn = self.session.connection();
        ops::upload(conn.as_ref(), staged.path(), &remote_path)?;
        Ok(Some(json!({ "remotePath": remote_path })))
    }

    fn local_list(&self, path: Option<String>) -> Outcome {
        let path = path.filter(|p| !p.is_empty()).unwrap_or_else(local::home_dir);
        to_value(ops::list_local_dir(&self.local, &path)?)
    }

    fn status(&self) -> Outcome {
        let conn = self.session.connection();
        Ok(Some(json!({
            "connected": self.session.is_open(),
            "connection": conn.info(),
            "downloadDir": self.session.download_dir().to_string_lossy(),
        })))
    }

    fn request_shutdown(&self) -> Outcome {
        tracing::info!("Shutdown requested over the API");
        self.begin_shutdown();
        Ok(Some(json!({ "message": "Shutting down..." })))
    }
}

/// Debug view of a request with upload bodies elided.
struct RedactedRequest<'a>(&'a Request);

impl std::fmt::Debug for RedactedRequest<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Request::RemoteUpload {
                path,
                filename,
                content,
            } => f
                .debug_struct("RemoteUpload")
                .field("path", path)
                .field("filename", filename)
                .field("content_len", &content.as_ref().map(String::len))
                .finish(),
            other => std::fmt::Debug::fmt(other, f),
        }
    }
}
