//! SSH transport layer.
//!
//! The core drives sessions through three traits so the handshake engine can
//! be swapped out: [`Transport`] dials and authenticates, [`Connection`] opens
//! session channels, and [`RemoteSession`] negotiates a pty and shell and hands
//! its byte streams to the relay. [`SshTransport`] implements them over russh.

mod channel;
pub mod config;
#[cfg(test)]
pub(crate) mod mock;
mod ssh;
mod target;
#[cfg(test)]
pub(crate) mod test_server;

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::auth::AuthConfig;
use crate::error::{ChannelError, ConnectionError};
use crate::host_key::HostKeyVerifier;
use crate::session::TerminalRequest;

pub use channel::SshSession;
pub use config::SshTransportConfig;
pub use ssh::{SshConnection, SshTransport};
pub use target::{ConnectionTarget, DEFAULT_HOST, DEFAULT_PORT};

/// Dials a target and completes the handshake.
pub trait Transport: Send + Sync {
    /// Connection produced by a successful dial.
    type Connection: Connection;

    /// Connect, verify the host key once, and authenticate.
    fn dial(
        &self,
        target: &ConnectionTarget,
        auth: &AuthConfig<'_>,
        verifier: Arc<dyn HostKeyVerifier>,
    ) -> impl Future<Output = Result<Self::Connection, ConnectionError>> + Send;
}

/// An authenticated connection. May host several sessions.
pub trait Connection: Send + Sync {
    /// Session channel type.
    type Session: RemoteSession;

    /// Open a new session channel.
    fn open_session(&self) -> impl Future<Output = Result<Self::Session, ChannelError>> + Send;

    /// Disconnect. Call once no further sessions will be opened.
    fn close(self) -> impl Future<Output = Result<(), ConnectionError>> + Send;
}

/// One logical shell channel.
pub trait RemoteSession: Send {
    /// Request a pseudo-terminal and wait for the server's reply.
    fn request_pty(
        &mut self,
        request: &TerminalRequest,
    ) -> impl Future<Output = Result<(), ChannelError>> + Send;

    /// Request a shell and wait for the server's reply.
    fn request_shell(&mut self) -> impl Future<Output = Result<(), ChannelError>> + Send;

    /// Detach the byte streams for relaying. Succeeds at most once.
    fn take_streams(&mut self) -> Result<SessionStreams, ChannelError>;

    /// Release the channel.
    fn close(&mut self) -> impl Future<Output = Result<(), ChannelError>> + Send;
}

/// Byte streams of a running shell.
pub struct SessionStreams {
    /// Remote standard input.
    pub stdin: Box<dyn AsyncWrite + Send + Unpin>,

    /// Remote standard output.
    pub stdout: Box<dyn AsyncRead + Send + Unpin>,

    /// Remote standard error.
    pub stderr: Box<dyn AsyncRead + Send + Unpin>,
}

impl SessionStreams {
    /// Box the three stream ends of a running shell.
    pub fn new(
        stdin: impl AsyncWrite + Send + Unpin + 'static,
        stdout: impl AsyncRead + Send + Unpin + 'static,
        stderr: impl AsyncRead + Send + Unpin + 'static,
    ) -> Self {
        Self {
            stdin: Box::new(stdin),
            stdout: Box::new(stdout),
            stderr: Box::new(stderr),
        }
    }
}

impl fmt::Debug for SessionStreams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionStreams { .. }")
    }
}
