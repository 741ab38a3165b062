//! OpenSSH known_hosts verification.

use std::path::PathBuf;

use log::{info, warn};
use russh::keys::PublicKey;
use russh::keys::known_hosts::{
    check_known_hosts, check_known_hosts_path, learn_known_hosts, learn_known_hosts_path,
};

use super::{HostKeyRecord, HostKeyVerifier};
use crate::error::HostKeyError;

/// How unknown hosts are treated, analogous to OpenSSH's `StrictHostKeyChecking`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KnownHostsMode {
    /// Reject unknown and changed keys.
    #[default]
    Strict,

    /// Learn unknown keys, reject changed keys.
    AcceptNew,
}

/// Verifies host keys against a known_hosts file.
#[derive(Debug, Clone, Default)]
pub struct KnownHosts {
    mode: KnownHostsMode,
    path: Option<PathBuf>,
}

impl KnownHosts {
    /// Use `~/.ssh/known_hosts`.
    pub fn new(mode: KnownHostsMode) -> Self {
        Self { mode, path: None }
    }

    /// Use a specific known_hosts file.
    pub fn with_path(mode: KnownHostsMode, path: impl Into<PathBuf>) -> Self {
        Self {
            mode,
            path: Some(path.into()),
        }
    }

    /// The configured mode.
    pub fn mode(&self) -> KnownHostsMode {
        self.mode
    }

    /// Returns `Ok(true)` if matched, `Ok(false)` if the host is not listed.
    fn check(&self, record: &HostKeyRecord, key: &PublicKey) -> Result<bool, HostKeyError> {
        let result = match self.path {
            Some(ref path) => check_known_hosts_path(&record.hostname, record.port, key, path),
            None => check_known_hosts(&record.hostname, record.port, key),
        };

        match result {
            Ok(matched) => Ok(matched),
            Err(russh::keys::Error::KeyChanged { line }) => Err(HostKeyError::Changed {
                host: record.hostname.clone(),
                port: record.port,
                line,
            }),
            Err(e) => Err(HostKeyError::KnownHosts(e.to_string())),
        }
    }

    fn learn(&self, record: &HostKeyRecord, key: &PublicKey) -> Result<(), HostKeyError> {
        let result = match self.path {
            Some(ref path) => learn_known_hosts_path(&record.hostname, record.port, key, path),
            None => learn_known_hosts(&record.hostname, record.port, key),
        };

        result.map_err(|e| HostKeyError::KnownHosts(e.to_string()))
    }
}

impl HostKeyVerifier for KnownHosts {
    fn verify(&self, record: &HostKeyRecord) -> Result<(), HostKeyError> {
        let key = record.parse_key()?;

        if self.check(record, &key)? {
            return Ok(());
        }

        match self.mode {
            KnownHostsMode::Strict => Err(HostKeyError::Unknown {
                host: record.hostname.clone(),
                port: record.port,
            }),
            KnownHostsMode::AcceptNew => {
                info!(
                    "new host key for {}:{} ({}), adding to known_hosts",
                    record.hostname,
                    record.port,
                    record.describe_key()
                );
                if let Err(e) = self.learn(record, &key) {
                    warn!("Failed to save host key: {}", e);
                }
                Ok(())
            }
        }
    }
}
