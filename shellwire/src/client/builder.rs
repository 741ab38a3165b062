//! Builder for creating clients.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use russh::Pty;
use secrecy::SecretString;

use super::{Client, SessionConfig};
use crate::auth::{AuthMethod, ChallengeResponder};
use crate::error::Result;
use crate::host_key::{AcceptAny, HostKeyVerifier, KnownHosts, KnownHostsMode};
use crate::session::TerminalRequest;
use crate::transport::{DEFAULT_PORT, SshTransport, SshTransportConfig};

/// Builder for constructing SSH shell clients.
///
/// Authentication methods accumulate and are tried in the order they were
/// added. A host key policy must be chosen explicitly.
///
/// # Example
///
/// ```rust,no_run
/// use shellwire::ClientBuilder;
/// use shellwire::host_key::KnownHostsMode;
///
/// # fn example() -> Result<(), shellwire::Error> {
/// let client = ClientBuilder::new("192.168.1.1")
///     .username("admin")
///     .password("secret")
///     .known_hosts(KnownHostsMode::Strict)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    host: String,
    port: u16,
    username: Option<String>,
    auth_methods: Vec<AuthMethod>,
    terminal: TerminalRequest,
    host_key_verifier: Option<Arc<dyn HostKeyVerifier>>,
    transport: SshTransportConfig,
}

impl ClientBuilder {
    /// Create a new client builder for the specified host.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            username: None,
            auth_methods: Vec::new(),
            terminal: TerminalRequest::default(),
            host_key_verifier: None,
            transport: SshTransportConfig::default(),
        }
    }

    /// Set the SSH port (default: 22).
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the username for authentication.
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Add password authentication. An empty password is sent as-is.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.auth_methods.push(AuthMethod::password(password));
        self
    }

    /// Add keyboard-interactive authentication.
    pub fn keyboard_interactive(mut self, responder: impl ChallengeResponder + 'static) -> Self {
        self.auth_methods
            .push(AuthMethod::keyboard_interactive(responder));
        self
    }

    /// Add private key authentication.
    pub fn private_key(mut self, key_path: impl Into<PathBuf>) -> Self {
        self.auth_methods.push(AuthMethod::PrivateKey {
            path: key_path.into(),
            passphrase: None,
        });
        self
    }

    /// Add private key authentication with passphrase.
    pub fn private_key_with_passphrase(
        mut self,
        key_path: impl Into<PathBuf>,
        passphrase: impl Into<String>,
    ) -> Self {
        self.auth_methods.push(AuthMethod::PrivateKey {
            path: key_path.into(),
            passphrase: Some(SecretString::from(passphrase.into())),
        });
        self
    }

    /// Add an already constructed authentication method.
    pub fn auth_method(mut self, method: AuthMethod) -> Self {
        self.auth_methods.push(method);
        self
    }

    /// Set the terminal type (default: `xterm`).
    pub fn term(mut self, term: impl Into<String>) -> Self {
        self.terminal.term = term.into();
        self
    }

    /// Set terminal dimensions.
    pub fn terminal_size(mut self, cols: u32, rows: u32) -> Self {
        self.terminal.cols = cols;
        self.terminal.rows = rows;
        self
    }

    /// Set a terminal mode flag.
    pub fn terminal_mode(mut self, mode: Pty, value: u32) -> Self {
        self.terminal = self.terminal.with_mode(mode, value);
        self
    }

    /// Replace the whole pty request.
    pub fn terminal(mut self, terminal: TerminalRequest) -> Self {
        self.terminal = terminal;
        self
    }

    /// Set the host key policy.
    pub fn host_key_verifier(mut self, verifier: impl HostKeyVerifier + 'static) -> Self {
        self.host_key_verifier = Some(Arc::new(verifier));
        self
    }

    /// Check host keys against `~/.ssh/known_hosts`.
    pub fn known_hosts(self, mode: KnownHostsMode) -> Self {
        self.host_key_verifier(KnownHosts::new(mode))
    }

    /// Accept any host key.
    ///
    /// Disables man-in-the-middle protection. Diagnostics only.
    pub fn danger_accept_any_host_key(self) -> Self {
        self.host_key_verifier(AcceptAny)
    }

    /// Set the connection timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.transport.connect_timeout = timeout;
        self
    }

    /// Replace the transport settings.
    pub fn transport_config(mut self, config: SshTransportConfig) -> Self {
        self.transport = config;
        self
    }

    /// The configuration this builder would produce.
    pub fn into_config(self) -> (SessionConfig, SshTransportConfig) {
        let config = SessionConfig {
            host: self.host,
            port: self.port,
            username: self.username,
            auth_methods: self.auth_methods,
            terminal: self.terminal,
            host_key_verifier: self.host_key_verifier,
        };
        (config, self.transport)
    }

    /// Build the client.
    ///
    /// Validates the configuration but does not connect.
    pub fn build(self) -> Result<Client<SshTransport>> {
        let (config, transport) = self.into_config();
        config.validate()?;
        Ok(Client::new(SshTransport::new(transport), config))
    }
}
