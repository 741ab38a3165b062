//! SSH transport configuration.

use std::sync::Arc;
use std::time::Duration;

use russh::client;

/// Default bound on TCP connect plus handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Interval between SSH keepalive requests.
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Missed keepalive replies before the connection is declared dead.
pub const DEFAULT_KEEPALIVE_MAX: usize = 3;

/// Transport-level settings for [`SshTransport`](super::SshTransport).
#[derive(Debug, Clone)]
pub struct SshTransportConfig {
    /// Bound on TCP connect plus key exchange.
    pub connect_timeout: Duration,

    /// Drop the connection after this much silence. `None` keeps idle
    /// shells open indefinitely.
    pub inactivity_timeout: Option<Duration>,

    /// Keepalive interval. `None` disables keepalives.
    pub keepalive_interval: Option<Duration>,

    /// Missed keepalives tolerated.
    pub keepalive_max: usize,
}

impl Default for SshTransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            inactivity_timeout: None,
            keepalive_interval: Some(DEFAULT_KEEPALIVE_INTERVAL),
            keepalive_max: DEFAULT_KEEPALIVE_MAX,
        }
    }
}

impl SshTransportConfig {
    /// Build the russh client configuration.
    pub(crate) fn russh_config(&self) -> Arc<client::Config> {
        Arc::new(client::Config {
            inactivity_timeout: self.inactivity_timeout,
            keepalive_interval: self.keepalive_interval,
            keepalive_max: self.keepalive_max,
            ..Default::default()
        })
    }
}
