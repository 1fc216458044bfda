//! Host key verification for the SFTP connection.
//!
//! Three policies are supported:
//!
//! - `TrustOnFirstUse` (default): the first fingerprint seen for `host:port`
//!   is recorded in a JSON store; later connections must present the same one.
//! - `Pinned`: the fingerprint must be one of an explicit set.
//! - `AcceptAny`: every key is accepted. Must be chosen explicitly and is
//!   logged as insecure on every connection.
//!
//! Fingerprints use the OpenSSH display format `SHA256:<unpadded base64>`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD_NO_PAD as BASE64_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::error::GateError;

/// How the server's host key is checked after the SSH handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostKeyPolicy {
    AcceptAny,
    TrustOnFirstUse { store: PathBuf },
    Pinned(Vec<String>),
}

/// Format a raw SHA-256 host key hash the way `ssh-keygen -l` prints it.
pub fn format_sha256_fingerprint(hash: &[u8]) -> String {
    format!("SHA256:{}", BASE64_NO_PAD.encode(hash))
}

/// Constant-time fingerprint comparison.
fn fingerprints_match(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    a.len() == b.len() && a.ct_eq(b).into()
}

impl HostKeyPolicy {
    /// Decide whether to trust `fingerprint` for `host:port`.
    ///
    /// Returns a `Connection` error when the key must be rejected.
    pub fn verify(
        &self,
        host: &str,
        port: u16,
        fingerprint: &str,
        key_type: &str,
    ) -> Result<(), GateError> {
        match self {
            HostKeyPolicy::AcceptAny => {
                tracing::warn!(
                    host,
                    port,
                    fingerprint,
                    "INSECURE: host key verification disabled, accepting any key"
                );
                Ok(())
            }
            HostKeyPolicy::Pinned(pins) => {
                if pins.iter().any(|pin| fingerprints_match(pin, fingerprint)) {
                    tracing::debug!(
                        host,
                        port,
                        fingerprint,
                        "Host key matches a pinned fingerprint"
                    );
                    Ok(())
                } else {
                    Err(GateError::Connection {
                        host: host.to_string(),
                        reason: format!(
                            "Host key {} is not among the pinned fingerprints. \
                             Refusing connection.",
                            fingerprint
                        ),
                    })
                }
            }
            HostKeyPolicy::TrustOnFirstUse { store } => {
                let mut known = KnownHosts::load(store)?;
                match known.check(host, port, fingerprint) {
                    HostKeyStatus::Trusted => {
                        tracing::debug!(host, port, "Host key verified");
                        known.touch(host, port);
                        known.save()
                    }
                    HostKeyStatus::Unknown => {
                        tracing::warn!(
                            host,
                            port,
                            fingerprint,
                            key_type,
                            "First connection to host, recording its key in {}",
                            store.display()
                        );
                        known.add(host, port, fingerprint, key_type);
                        known.save()
                    }
                    HostKeyStatus::Changed { expected } => Err(GateError::Connection {
                        host: host.to_string(),
                        reason: format!(
                            "REMOTE HOST IDENTIFICATION HAS CHANGED: expected {}, got {}. \
                             Refusing connection to prevent a possible man-in-the-middle \
                             attack. If the key legitimately changed, remove the entry for \
                             '{}:{}' from {}.",
                            expected,
                            fingerprint,
                            host,
                            port,
                            store.display()
                        ),
                    }),
                }
            }
        }
    }
}

/// Result of checking a host against the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostKeyStatus {
    Trusted,
    Unknown,
    Changed { expected: String },
}

/// One recorded host key.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct KnownHost {
    pub fingerprint: String,
    pub key_type: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// Persistent trust-on-first-use store, keyed by `host:port`.
///
/// Uses atomic writes (write to `.tmp`, then rename).
#[derive(Serialize, Deserialize, Default)]
pub struct KnownHosts {
    hosts: BTreeMap<String, KnownHost>,
    #[serde(skip)]
    path: PathBuf,
}

fn host_key(host: &str, port: u16) -> String {
    format!("{}:{}", host, port)
}

impl KnownHosts {
    /// Load the store, or start empty when the file does not exist yet.
    ///
    /// A corrupted store is an error rather than a silent reset: starting
    /// fresh would re-trust every host on its next connection.
    pub fn load(path: &Path) -> Result<Self, GateError> {
        if !path.exists() {
            return Ok(Self {
                hosts: BTreeMap::new(),
                path: path.to_path_buf(),
            });
        }

        let data = std::fs::read_to_string(path).map_err(|e| {
            GateError::Config(format!("Failed to read known hosts {}: {}", path.display(), e))
        })?;
        let mut store: KnownHosts = serde_json::from_str(&data).map_err(|e| {
            GateError::Config(format!(
                "Known hosts file {} is corrupted: {}",
                path.display(),
                e
            ))
        })?;
        store.path = path.to_path_buf();
        Ok(store)
    }

    pub fn save(&self) -> Result<(), GateError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    GateError::Config(format!("Failed to create {}: {}", parent.display(), e))
                })?;
            }
        }

        let tmp_path = self.path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(&self).map_err(|e| {
            GateError::Config(format!("Failed to serialize known hosts: {}", e))
        })?;
        std::fs::write(&tmp_path, &json).map_err(|e| {
            GateError::Config(format!("Failed to write known hosts: {}", e))
        })?;
        std::fs::rename(&tmp_path, &self.path).map_err(|e| {
            GateError::Config(format!("Failed to save known hosts: {}", e))
        })?;
        Ok(())
    }

    pub fn check(&self, host: &str, port: u16, fingerprint: &str) -> HostKeyStatus {
        match self.hosts.get(&host_key(host, port)) {
            None => HostKeyStatus::Unknown,
            Some(entry) if fingerprints_match(&entry.fingerprint, fingerprint) => {
                HostKeyStatus::Trusted
            }
            Some(entry) => HostKeyStatus::Changed {
                expected: entry.fingerprint.clone(),
            },
        }
    }

    pub fn add(&mut self, host: &str, port: u16, fingerprint: &str, key_type: &str) {
        let now = Utc::now();
        self.hosts.insert(
            host_key(host, port),
            KnownHost {
                fingerprint: fingerprint.to_string(),
                key_type: key_type.to_string(),
                first_seen: now,
                last_seen: now,
            },
        );
    }

    fn touch(&mut self, host: &str, port: u16) {
        if let Some(entry) = self.hosts.get_mut(&host_key(host, port)) {
            entry.last_seen = Utc::now();
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.hosts.len()
    }
}
