//! Platform-specific config and data directory helpers.
//!
//! Uses the `dirs` crate to resolve platform-appropriate directories:
//! - Linux:   `~/.config/sftpgate/`
//! - Windows: `%APPDATA%\sftpgate\`
//! - macOS:   `~/Library/Application Support/sftpgate/`

use std::path::PathBuf;

use crate::error::GateError;

/// Get the sftpgate config directory. Does not create it.
pub fn gate_config_dir() -> Result<PathBuf, GateError> {
    let base = dirs::config_dir()
        .ok_or_else(|| GateError::Config("Could not determine config directory".into()))?;
    Ok(base.join("sftpgate"))
}

/// Default config file location.
pub fn default_config_file() -> Result<PathBuf, GateError> {
    Ok(gate_config_dir()?.join("config.toml"))
}

/// Default trust-on-first-use store location.
pub fn default_known_hosts() -> Result<PathBuf, GateError> {
    Ok(gate_config_dir()?.join("known_hosts.json"))
}

/// Default download folder: `$HOME/temporary`, or `/tmp/temporary` without a home.
pub fn default_download_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("temporary")
}
