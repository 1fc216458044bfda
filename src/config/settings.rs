//! Validated runtime settings.
//!
//! Everything that can be wrong with the invocation is caught here, before
//! any network work: missing host or user, zero or two credentials, a bad
//! listen address, an inconsistent host key policy, an unusable download
//! folder.

use std::net::SocketAddr;
use std::path::PathBuf;

use zeroize::Zeroizing;

use crate::backend::hostkey::HostKeyPolicy;
use crate::backend::sftp::Credential;
use crate::cli::args::Cli;
use crate::config::file::FileConfig;
use crate::config::paths;
use crate::config::types::HostKeyMode;
use crate::error::GateError;

/// Default SSH port.
const DEFAULT_SSH_PORT: u16 = 22;

/// Default API listen address.
const DEFAULT_LISTEN: &str = "127.0.0.1:8080";

#[derive(Debug)]
pub struct Settings {
    pub host: String,
    pub user: String,
    pub port: u16,
    pub credential: Credential,
    pub listen: SocketAddr,
    pub download_dir: PathBuf,
    pub host_keys: HostKeyPolicy,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl Settings {
    /// Load the config file (explicit `--config`, or the default location if
    /// present) and merge it with the command line.
    pub fn from_cli(cli: Cli) -> Result<Self, GateError> {
        let file = match &cli.config {
            Some(path) => FileConfig::load(path, true)?,
            None => match paths::default_config_file() {
                Ok(path) => FileConfig::load(&path, false)?,
                Err(_) => FileConfig::default(),
            },
        };
        Self::resolve(cli, file)
    }

    /// Merge `cli` over `file` and validate the result.
    pub fn resolve(cli: Cli, file: FileConfig) -> Result<Self, GateError> {
        let host = non_empty(cli.host)
            .ok_or_else(|| GateError::Config("host is required".into()))?;
        let user = non_empty(cli.user)
            .ok_or_else(|| GateError::Config("user is required".into()))?;

        let credential = match (non_empty(cli.password), cli.key) {
            (Some(password), None) => Credential::Password(Zeroizing::new(password)),
            (None, Some(key)) => {
                if !key.is_file() {
                    return Err(GateError::Config(format!(
                        "key file {} does not exist",
                        key.display()
                    )));
                }
                Credential::IdentityFile(key)
            }
            (None, None) => {
                return Err(GateError::Config(
                    "either a password or a key file path is required".into(),
                ))
            }
            (Some(_), Some(_)) => {
                return Err(GateError::Config(
                    "use either a password or a key file, not both".into(),
                ))
            }
        };

        let port = cli.port.or(file.port).unwrap_or(DEFAULT_SSH_PORT);

        let listen_str = cli
            .listen
            .or(file.listen)
            .unwrap_or_else(|| DEFAULT_LISTEN.to_string());
        let listen: SocketAddr = listen_str.parse().map_err(|e| {
            GateError::Config(format!("invalid listen address '{}': {}", listen_str, e))
        })?;

        let fingerprints = if cli.fingerprints.is_empty() {
            file.fingerprints
        } else {
            cli.fingerprints
        };
        let mode = cli.host_key.or(file.host_key).unwrap_or_default();
        let host_keys = match mode {
            HostKeyMode::Pinned => {
                if fingerprints.is_empty() {
                    return Err(GateError::Config(
                        "--host-key pinned requires at least one --fingerprint".into(),
                    ));
                }
                HostKeyPolicy::Pinned(fingerprints)
            }
            _ if !fingerprints.is_empty() => {
                return Err(GateError::Config(
                    "fingerprints only apply to --host-key pinned".into(),
                ))
            }
            HostKeyMode::Tofu => HostKeyPolicy::TrustOnFirstUse {
                store: match cli.known_hosts.or(file.known_hosts) {
                    Some(path) => path,
                    None => paths::default_known_hosts()?,
                },
            },
            HostKeyMode::AcceptAny => HostKeyPolicy::AcceptAny,
        };

        let download_dir = cli
            .download_to
            .or(file.download_dir)
            .unwrap_or_else(paths::default_download_dir);
        std::fs::create_dir_all(&download_dir).map_err(|e| {
            GateError::Config(format!(
                "cannot create download folder {}: {}",
                download_dir.display(),
                e
            ))
        })?;

        Ok(Settings {
            host,
            user,
            port,
            credential,
            listen,
            download_dir,
            host_keys,
        })
    }
}
