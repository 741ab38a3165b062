//! Connection targets and address resolution.

use std::fmt;
use std::net::SocketAddr;

use log::trace;

use crate::error::ConnectionError;

/// Default SSH port.
pub const DEFAULT_PORT: u16 = 22;

/// Default target host (loopback).
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// A host and port to dial.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionTarget {
    host: String,
    port: u16,
}

impl ConnectionTarget {
    /// Create a target for the given host and port.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Target host (hostname or IP address).
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Target port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Resolve the target into socket addresses, in resolver order.
    pub async fn resolve(&self) -> Result<Vec<SocketAddr>, ConnectionError> {
        let addrs: Vec<SocketAddr> = tokio::net::lookup_host((self.host.as_str(), self.port))
            .await
            .map_err(|source| ConnectionError::Resolve {
                target: self.to_string(),
                source,
            })?
            .collect();

        if addrs.is_empty() {
            return Err(ConnectionError::NoAddresses {
                target: self.to_string(),
            });
        }

        trace!("resolved {} to {:?}", self, addrs);
        Ok(addrs)
    }
}

impl Default for ConnectionTarget {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_PORT)
    }
}

impl fmt::Display for ConnectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}
