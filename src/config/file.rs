//! Optional TOML config file.
//!
//! Supplies defaults for everything except credentials, which are only
//! accepted on the command line. Command-line flags override file values.
//!
//! ```toml
//! port = 2222
//! listen = "127.0.0.1:9090"
//! download_dir = "/home/me/Downloads"
//! host_key = "pinned"
//! fingerprints = ["SHA256:..."]
//! known_hosts = "/home/me/.config/sftpgate/known_hosts.json"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::types::HostKeyMode;
use crate::error::GateError;

/// Serialized config file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub port: Option<u16>,
    pub listen: Option<String>,
    pub download_dir: Option<PathBuf>,
    pub host_key: Option<HostKeyMode>,
    #[serde(default)]
    pub fingerprints: Vec<String>,
    pub known_hosts: Option<PathBuf>,
}

impl FileConfig {
    /// Load the config file at `path`.
    ///
    /// A missing file yields the defaults only when `required` is false;
    /// an explicitly named file must exist.
    pub fn load(path: &Path, required: bool) -> Result<Self, GateError> {
        if !path.exists() {
            if required {
                return Err(GateError::Config(format!(
                    "Config file {} does not exist",
                    path.display()
                )));
            }
            return Ok(FileConfig::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|e| {
            GateError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str(&contents)
            .map_err(|e| GateError::Config(format!("Invalid {}: {}", path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_optional_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = FileConfig::load(&dir.path().join("config.toml"), false).unwrap();
        assert_eq!(cfg, FileConfig::default());
    }

    #[test]
    fn missing_required_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileConfig::load(&dir.path().join("config.toml"), true).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn parses_all_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
port = 2222
listen = "127.0.0.1:9090"
download_dir = "/srv/downloads"
host_key = "accept-any"
fingerprints = ["SHA256:abc"]
known_hosts = "/srv/known.json"
"#,
        )
        .unwrap();

        let cfg = FileConfig::load(&path, true).unwrap();
        assert_eq!(cfg.port, Some(2222));
        assert_eq!(cfg.listen.as_deref(), Some("127.0.0.1:9090"));
        assert_eq!(cfg.download_dir, Some(PathBuf::from("/srv/downloads")));
        assert_eq!(cfg.host_key, Some(HostKeyMode::AcceptAny));
        assert_eq!(cfg.fingerprints, vec!["SHA256:abc"]);
        assert_eq!(cfg.known_hosts, Some(PathBuf::from("/srv/known.json")));
    }

    #[test]
    fn rejects_credentials_in_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "password = \"nope\"\n").unwrap();
        let err = FileConfig::load(&path, true).unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
    }
}
