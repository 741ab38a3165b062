//! Interactive shell client.
//!
//! [`Client`] ties the pieces together: validate the configuration, dial and
//! authenticate through a [`Transport`], negotiate a pty and shell, relay bytes
//! until the remote side exits or the relay is cancelled, then release the
//! session and the connection.

mod builder;
mod config;

use log::{info, warn};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;

use crate::error::{ConnectionError, Result, SessionSetupError};
use crate::relay::{self, LocalStreams, RelayReport};
use crate::session::negotiate;
use crate::transport::{Connection, RemoteSession, SshTransport, Transport};

pub use builder::ClientBuilder;
pub use config::SessionConfig;

/// Opens interactive shells on a remote host.
pub struct Client<T: Transport = SshTransport> {
    transport: T,
    config: SessionConfig,
}

impl<T: Transport> Client<T> {
    /// Client that dials with `transport`. The configuration is validated
    /// when connecting, not here.
    pub fn new(transport: T, config: SessionConfig) -> Self {
        Self { transport, config }
    }

    /// Session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Transport used to dial.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Connect, open one shell, relay until it ends, then disconnect.
    ///
    /// Cancelling the token while dialing or authenticating abandons the
    /// attempt with [`ConnectionError::Cancelled`].
    pub async fn run<I, O, E>(
        &self,
        local: LocalStreams<I, O, E>,
        cancel: &CancellationToken,
    ) -> Result<RelayReport>
    where
        I: AsyncRead + Unpin,
        O: AsyncWrite + Unpin,
        E: AsyncWrite + Unpin,
    {
        let connection = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("cancelled before the session started");
                return Err(ConnectionError::Cancelled.into());
            }
            connection = self.connect() => connection?,
        };
        let result = self.open_shell(&connection, local, cancel).await;

        if let Err(e) = connection.close().await {
            warn!("failed to disconnect cleanly: {}", e);
        }
        result
    }

    /// Validate the configuration, then dial and authenticate.
    ///
    /// Configuration errors are reported before any network activity.
    pub async fn connect(&self) -> Result<T::Connection> {
        let auth = self.config.validate()?;
        let verifier = self.config.verifier()?;
        let target = self.config.target();

        info!("connecting to {} as '{}'", target, auth.username);
        let connection = self.transport.dial(&target, &auth, verifier).await?;
        Ok(connection)
    }

    /// Open a shell on an established connection and relay until it ends.
    ///
    /// The session is closed exactly once, whatever the outcome. A setup
    /// failure leaves the connection usable for another attempt.
    pub async fn open_shell<I, O, E>(
        &self,
        connection: &T::Connection,
        local: LocalStreams<I, O, E>,
        cancel: &CancellationToken,
    ) -> Result<RelayReport>
    where
        I: AsyncRead + Unpin,
        O: AsyncWrite + Unpin,
        E: AsyncWrite + Unpin,
    {
        let mut session = connection
            .open_session()
            .await
            .map_err(SessionSetupError::ChannelOpen)?;

        let result = self.drive(&mut session, local, cancel).await;

        if let Err(e) = session.close().await {
            warn!("failed to close session: {}", e);
        }
        result
    }

    async fn drive<S, I, O, E>(
        &self,
        session: &mut S,
        local: LocalStreams<I, O, E>,
        cancel: &CancellationToken,
    ) -> Result<RelayReport>
    where
        S: RemoteSession,
        I: AsyncRead + Unpin,
        O: AsyncWrite + Unpin,
        E: AsyncWrite + Unpin,
    {
        negotiate(session, &self.config.terminal).await?;
        let streams = session
            .take_streams()
            .map_err(SessionSetupError::Streams)?;

        // The streams are consumed here, so they are gone before the close.
        let report = relay::run(streams, local, cancel).await?;
        Ok(report)
    }
}
