//! Local JSON API.
//!
//! Newline-delimited JSON over TCP: one [`Request`] object per line in, one
//! [`ApiResponse`] envelope per line out.

pub mod handlers;
pub mod server;
pub mod staging;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::GateError;

/// Error code for requests that are malformed or missing a required field.
pub const INVALID_REQUEST: &str = "INVALID_REQUEST";

/// A single API request, tagged by `op`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Request {
    RemoteList {
        path: Option<String>,
    },
    RemoteMkdir {
        path: Option<String>,
    },
    RemoteRename {
        old_path: Option<String>,
        new_path: Option<String>,
    },
    RemoteDelete {
        path: Option<String>,
    },
    RemoteStat {
        path: Option<String>,
    },
    RemoteDownload {
        path: Option<String>,
    },
    /// `path` is the destination directory, `content` the base64 file body.
    RemoteUpload {
        path: Option<String>,
        filename: Option<String>,
        content: Option<String>,
    },
    LocalList {
        path: Option<String>,
    },
    Status,
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    pub message: String,
    pub code: String,
}

impl ApiError {
    pub fn invalid(message: impl Into<String>) -> Self {
        ApiError {
            message: message.into(),
            code: INVALID_REQUEST.to_string(),
        }
    }
}

impl From<GateError> for ApiError {
    fn from(err: GateError) -> Self {
        ApiError {
            message: err.to_string(),
            code: err.code().to_string(),
        }
    }
}

/// Response envelope: `{success, data?, error?}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

impl ApiResponse {
    pub fn ok(data: Option<Value>) -> Self {
        ApiResponse {
            success: true,
            data,
            error: None,
        }
    }

    pub fn failure(error: ApiError) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(error),
        }
    }

    /// The error code, if this is a failure.
    #[cfg(test)]
    pub fn code(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.code.as_str())
    }
}

impl From<Result<Option<Value>, ApiError>> for ApiResponse {
    fn from(result: Result<Option<Value>, ApiError>) -> Self {
        match result {
            Ok(data) => ApiResponse::ok(data),
            Err(error) => ApiResponse::failure(error),
        }
    }
}
