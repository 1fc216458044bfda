use std::fmt;

use thiserror::Error;

/// Which remote (or local) operation an [`GateError::Operation`] came from.
///
/// Each phase maps to its own API error code so callers can tell failure
/// domains apart without parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpPhase {
    List,
    Mkdir,
    Rename,
    Delete,
    Stat,
    Download,
    Upload,
    LocalList,
}

impl OpPhase {
    /// Stable API error code for this phase.
    pub fn code(&self) -> &'static str {
        match self {
            OpPhase::List => "SFTP_LIST_ERROR",
            OpPhase::Mkdir => "SFTP_MKDIR_ERROR",
            OpPhase::Rename => "SFTP_RENAME_ERROR",
            OpPhase::Delete => "SFTP_DELETE_ERROR",
            OpPhase::Stat => "SFTP_STAT_ERROR",
            OpPhase::Download => "SFTP_DOWNLOAD_ERROR",
            OpPhase::Upload => "SFTP_UPLOAD_ERROR",
            OpPhase::LocalList => "LOCAL_LIST_ERROR",
        }
    }
}

impl fmt::Display for OpPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OpPhase::List => "List",
            OpPhase::Mkdir => "Mkdir",
            OpPhase::Rename => "Rename",
            OpPhase::Delete => "Delete",
            OpPhase::Stat => "Stat",
            OpPhase::Download => "Download",
            OpPhase::Upload => "Upload",
            OpPhase::LocalList => "Local list",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum GateError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Connection failed to {host}: {reason}")]
    Connection { host: String, reason: String },

    #[error("{phase} failed for {path}: {reason}")]
    Operation {
        phase: OpPhase,
        path: String,
        reason: String,
    },

    #[error("Local staging error: {0}")]
    LocalStaging(String),
}

impl GateError {
    /// Wrap a primitive filesystem failure with the operation and path it hit.
    pub fn op(phase: OpPhase, path: impl Into<String>, err: std::io::Error) -> Self {
        GateError::Operation {
            phase,
            path: path.into(),
            reason: err.to_string(),
        }
    }

    /// Stable API error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            GateError::Config(_) => "CONFIG_ERROR",
            GateError::Connection { .. } => "CONNECTION_ERROR",
            GateError::Operation { phase, .. } => phase.code(),
            GateError::LocalStaging(_) => "LOCAL_ERROR",
        }
    }

    /// Returns a user-friendly suggestion for how to fix the error.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            GateError::Config(_) => Some(
                "Usage: sftpgate --host <host> --user <user> [--password <pass> | --key <keyfile>]",
            ),
            GateError::Connection { .. } => Some(
                "Check that the host is reachable, the port is correct and the credential is valid.",
            ),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_error_code_follows_phase() {
        let err = GateError::Operation {
            phase: OpPhase::Delete,
            path: "/a/x".to_string(),
            reason: "permission denied".to_string(),
        };
        assert_eq!(err.code(), "SFTP_DELETE_ERROR");
        let msg = err.to_string();
        assert!(msg.contains("/a/x"));
        assert!(msg.contains("permission denied"));
    }

    #[test]
    fn every_phase_has_a_distinct_code() {
        let phases = [
            OpPhase::List,
            OpPhase::Mkdir,
            OpPhase::Rename,
            OpPhase::Delete,
            OpPhase::Stat,
            OpPhase::Download,
            OpPhase::Upload,
            OpPhase::LocalList,
        ];
        let mut codes: Vec<&str> = phases.iter().map(|p| p.code()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), phases.len());
    }

    #[test]
    fn op_wraps_io_error_message() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = GateError::op(OpPhase::Stat, "/missing", io_err);
        match &err {
            GateError::Operation { phase, path, reason } => {
                assert_eq!(*phase, OpPhase::Stat);
                assert_eq!(path, "/missing");
                assert!(reason.contains("no such file"));
            }
            other => panic!("Expected Operation variant, got: {:?}", other),
        }
    }

    #[test]
    fn config_error_display_and_suggestion() {
        let err = GateError::Config("host is required".to_string());
        let msg = format!("{}", err);
        assert!(msg.contains("Configuration error"));
        assert!(msg.contains("host is required"));
        assert_eq!(err.code(), "CONFIG_ERROR");
        assert!(err.suggestion().unwrap().contains("--host"));
    }

    #[test]
    fn connection_error_format() {
        let err = GateError::Connection {
            host: "example.com".to_string(),
            reason: "Connection refused".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("example.com"));
        assert!(msg.contains("Connection refused"));
        assert_eq!(err.code(), "CONNECTION_ERROR");
    }

    #[test]
    fn staging_error_has_no_suggestion() {
        let err = GateError::LocalStaging("disk full".to_string());
        assert_eq!(err.code(), "LOCAL_ERROR");
        assert!(err.suggestion().is_none());
    }
}
