//! Host key verification.
//!
//! A [`HostKeyVerifier`] is consulted exactly once per connection attempt,
//! during the handshake, with the key the server presented. It either accepts
//! the key or returns a [`HostKeyError`] describing the rejection, which dial
//! surfaces as [`ConnectionError::HostKey`](crate::error::ConnectionError::HostKey).
//!
//! Standard policies:
//! - [`AcceptAny`]: accepts everything. Diagnostics only.
//! - [`FixedKey`]: accepts only a single pinned key.
//! - [`Custom`]: delegates to a caller-supplied closure.
//! - [`KnownHosts`]: checks an OpenSSH `known_hosts` file.

mod known_hosts;

use std::fmt;
use std::net::SocketAddr;

use log::warn;
use russh::keys::{HashAlg, PublicKey};

use crate::error::{ConfigError, HostKeyError};

pub use known_hosts::{KnownHosts, KnownHostsMode};

/// The identity a server presented during the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostKeyRecord {
    /// Hostname the caller asked to connect to.
    pub hostname: String,

    /// Port the caller asked to connect to.
    pub port: u16,

    /// Address the TCP connection actually reached.
    pub remote_address: SocketAddr,

    /// SSH wire encoding of the presented public key.
    pub public_key: Vec<u8>,
}

impl HostKeyRecord {
    /// Parse the presented key.
    pub fn parse_key(&self) -> Result<PublicKey, HostKeyError> {
        PublicKey::from_bytes(&self.public_key).map_err(|e| HostKeyError::Encoding(e.to_string()))
    }

    /// SHA-256 fingerprint of the presented key, if it parses.
    pub fn fingerprint(&self) -> Option<String> {
        self.parse_key()
            .ok()
            .map(|key| key.fingerprint(HashAlg::Sha256).to_string())
    }

    fn describe_key(&self) -> String {
        self.fingerprint()
            .unwrap_or_else(|| format!("<{} undecodable bytes>", self.public_key.len()))
    }
}

/// Policy deciding whether a server's host key is acceptable.
pub trait HostKeyVerifier: Send + Sync {
    /// Accept the record with `Ok(())` or reject it with an error.
    fn verify(&self, record: &HostKeyRecord) -> Result<(), HostKeyError>;
}

/// Accepts every host key without checking.
///
/// This disables protection against man-in-the-middle attacks. Use it only
/// for diagnostics against hosts you control.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAny;

impl HostKeyVerifier for AcceptAny {
    fn verify(&self, record: &HostKeyRecord) -> Result<(), HostKeyError> {
        warn!(
            "accepting host key for {} ({}) without verification",
            record.hostname, record.remote_address
        );
        Ok(())
    }
}

/// Accepts exactly one pinned host key.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct FixedKey {
    expected: Option<Vec<u8>>,
}

impl FixedKey {
    /// Pin the SSH wire encoding of the expected key.
    pub fn new(expected: impl Into<Vec<u8>>) -> Self {
        Self {
            expected: Some(expected.into()),
        }
    }

    /// A verifier with no expected key. Rejects every connection.
    pub fn unset() -> Self {
        Self { expected: None }
    }

    /// Pin a key given as an OpenSSH public key line
    /// (`ssh-ed25519 AAAA... comment`), or as the bare base64 blob.
    pub fn from_openssh(line: &str) -> Result<Self, ConfigError> {
        let mut fields = line.split_whitespace();
        let first = fields.next().ok_or_else(|| ConfigError::InvalidHostKey {
            message: "empty key".to_string(),
        })?;
        let blob = fields.next().unwrap_or(first);

        let key = russh::keys::parse_public_key_base64(blob).map_err(|e| {
            ConfigError::InvalidHostKey {
                message: e.to_string(),
            }
        })?;
        Self::from_key(&key)
    }

    /// Pin an already parsed key.
    pub fn from_key(key: &PublicKey) -> Result<Self, ConfigError> {
        let bytes = key.to_bytes().map_err(|e| ConfigError::InvalidHostKey {
            message: e.to_string(),
        })?;
        Ok(Self::new(bytes))
    }

    /// The pinned key bytes, if any.
    pub fn expected(&self) -> Option<&[u8]> {
        self.expected.as_deref()
    }
}

impl fmt::Debug for FixedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixedKey")
            .field("expected_len", &self.expected.as_ref().map(Vec::len))
            .finish()
    }
}

impl HostKeyVerifier for FixedKey {
    fn verify(&self, record: &HostKeyRecord) -> Result<(), HostKeyError> {
        let expected = self.expected.as_deref().ok_or(HostKeyError::NoExpectedKey)?;

        if expected == record.public_key.as_slice() {
            return Ok(());
        }

        let expected_record = HostKeyRecord {
            public_key: expected.to_vec(),
            ..record.clone()
        };
        Err(HostKeyError::Mismatch {
            host: record.hostname.clone(),
            expected: expected_record.describe_key(),
            presented: record.describe_key(),
        })
    }
}

/// Delegates verification to a closure.
///
/// ```rust
/// use std::sync::{Arc, Mutex};
/// use shellwire::host_key::{Custom, HostKeyRecord};
///
/// let seen: Arc<Mutex<Vec<HostKeyRecord>>> = Arc::default();
/// let capture = seen.clone();
/// let verifier = Custom::new(move |record: &HostKeyRecord| {
///     capture.lock().unwrap().push(record.clone());
///     Ok(())
/// });
/// # let _ = verifier;
/// ```
pub struct Custom<F> {
    inspector: F,
}

impl<F> Custom<F>
where
    F: Fn(&HostKeyRecord) -> Result<(), HostKeyError> + Send + Sync,
{
    /// Wrap an inspector closure.
    pub fn new(inspector: F) -> Self {
        Self { inspector }
    }
}

impl<F> fmt::Debug for Custom<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Custom(..)")
    }
}

impl<F> HostKeyVerifier for Custom<F>
where
    F: Fn(&HostKeyRecord) -> Result<(), HostKeyError> + Send + Sync,
{
    fn verify(&self, record: &HostKeyRecord) -> Result<(), HostKeyError> {
        (self.inspector)(record)
    }
}
