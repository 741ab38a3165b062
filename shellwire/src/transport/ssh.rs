//! SSH transport implementation using russh.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use log::{debug, info, warn};
use russh::client::{self, Handle, KeyboardInteractiveAuthResponse};
use russh::keys::{PrivateKeyWithHashAlg, PublicKey, load_secret_key};
use secrecy::ExposeSecret;
use tokio::net::TcpStream;

use super::channel::SshSession;
use super::config::SshTransportConfig;
use super::target::ConnectionTarget;
use super::{Connection, Transport};
use crate::auth::{AuthConfig, AuthMethod, Challenge, ChallengeResponder, answer_challenge};
use crate::error::{AuthError, ChannelError, ConnectionError, HostKeyError};
use crate::host_key::{HostKeyRecord, HostKeyVerifier};

/// Dials SSH servers with russh.
#[derive(Debug, Clone, Default)]
pub struct SshTransport {
    config: SshTransportConfig,
}

impl SshTransport {
    /// Transport with the given connection settings.
    pub fn new(config: SshTransportConfig) -> Self {
        Self { config }
    }

    /// Transport settings.
    pub fn config(&self) -> &SshTransportConfig {
        &self.config
    }

    /// Try each resolved address in order, keeping the last error.
    async fn connect_tcp(
        target: &ConnectionTarget,
        addrs: &[SocketAddr],
    ) -> Result<(TcpStream, SocketAddr), ConnectionError> {
        let mut last_error = None;
        for addr in addrs {
            match TcpStream::connect(addr).await {
                Ok(stream) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        debug!("failed to set TCP_NODELAY on {}: {}", addr, e);
                    }
                    return Ok((stream, *addr));
                }
                Err(e) => {
                    debug!("connect to {} failed: {}", addr, e);
                    last_error = Some(e);
                }
            }
        }

        Err(ConnectionError::ConnectionFailed {
            target: target.to_string(),
            source: last_error.unwrap_or_else(|| std::io::ErrorKind::AddrNotAvailable.into()),
        })
    }

    async fn handshake(
        &self,
        target: &ConnectionTarget,
        verifier: Arc<dyn HostKeyVerifier>,
    ) -> Result<Handle<SshHandler>, ConnectionError> {
        let addrs = target.resolve().await?;
        let (stream, remote_address) = Self::connect_tcp(target, &addrs).await?;
        debug!("TCP connected to {} via {}", target, remote_address);

        let rejection: Arc<Mutex<Option<HostKeyError>>> = Arc::new(Mutex::new(None));
        let handler = SshHandler {
            hostname: target.host().to_string(),
            port: target.port(),
            remote_address,
            verifier,
            rejection: rejection.clone(),
        };

        client::connect_stream(self.config.russh_config(), stream, handler)
            .await
            .map_err(|e| {
                // Surface the verifier's reason rather than russh's generic UnknownKey.
                match rejection.lock().ok().and_then(|mut slot| slot.take()) {
                    Some(hk_err) => ConnectionError::HostKey(hk_err),
                    None => ConnectionError::Ssh(e),
                }
            })
    }
}

impl Transport for SshTransport {
    type Connection = SshConnection;

    async fn dial(
        &self,
        target: &ConnectionTarget,
        auth: &AuthConfig<'_>,
        verifier: Arc<dyn HostKeyVerifier>,
    ) -> Result<SshConnection, ConnectionError> {
        let timeout = self.config.connect_timeout;
        let mut session = tokio::time::timeout(timeout, self.handshake(target, verifier))
            .await
            .map_err(|_| ConnectionError::Timeout(timeout))??;

        if let Err(e) = authenticate(&mut session, auth).await {
            if let Err(disconnect) = session
                .disconnect(russh::Disconnect::ByApplication, "", "en")
                .await
            {
                debug!("disconnect after failed authentication: {}", disconnect);
            }
            return Err(e);
        }

        info!("authenticated to {} as '{}'", target, auth.username);
        Ok(SshConnection {
            session,
            target: target.clone(),
        })
    }
}

/// An authenticated russh connection.
pub struct SshConnection {
    /// The russh session handle.
    session: Handle<SshHandler>,

    target: ConnectionTarget,
}

impl SshConnection {
    /// Target this connection was dialed to.
    pub fn target(&self) -> &ConnectionTarget {
        &self.target
    }

    /// Whether the russh background task is still running.
    pub fn is_alive(&self) -> bool {
        !self.session.is_closed()
    }
}

impl Connection for SshConnection {
    type Session = SshSession;

    async fn open_session(&self) -> Result<SshSession, ChannelError> {
        let channel = self.session.channel_open_session().await?;
        debug!("opened session channel {:?} on {}", channel.id(), self.target);
        Ok(SshSession::new(channel))
    }

    async fn close(self) -> Result<(), ConnectionError> {
        self.session
            .disconnect(russh::Disconnect::ByApplication, "", "en")
            .await?;
        debug!("disconnected from {}", self.target);
        Ok(())
    }
}

/// Try each configured method in order until one succeeds.
async fn authenticate(
    session: &mut Handle<SshHandler>,
    auth: &AuthConfig<'_>,
) -> Result<(), ConnectionError> {
    let mut tried = Vec::with_capacity(auth.methods.len());

    for method in auth.methods {
        tried.push(method.name());
        let success = match method {
            AuthMethod::Password(password) => session
                .authenticate_password(auth.username, password.expose_secret())
                .await
                .map_err(AuthError::Ssh)?
                .success(),
            AuthMethod::KeyboardInteractive(responder) => {
                keyboard_interactive(session, auth.username, responder.clone()).await?
            }
            AuthMethod::PrivateKey { path, passphrase } => {
                match load_secret_key(path, passphrase.as_ref().map(|p| p.expose_secret())) {
                    Ok(key) => {
                        // Get the best RSA hash algorithm supported by the server
                        let hash_alg = session
                            .best_supported_rsa_hash()
                            .await
                            .map_err(AuthError::Ssh)?
                            .flatten();

                        session
                            .authenticate_publickey(
                                auth.username,
                                PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg),
                            )
                            .await
                            .map_err(AuthError::Ssh)?
                            .success()
                    }
                    Err(e) => {
                        // An unreadable key only rules out this method.
                        warn!("skipping private key {}: {}", path.display(), e);
                        false
                    }
                }
            }
        };

        if success {
            debug!("authenticated with {}", method.name());
            return Ok(());
        }
        debug!("{} authentication refused for '{}'", method.name(), auth.username);
    }

    Err(AuthError::Failed {
        user: auth.username.to_string(),
        tried,
    }
    .into())
}

/// Run keyboard-interactive rounds until the server decides.
async fn keyboard_interactive(
    session: &mut Handle<SshHandler>,
    username: &str,
    responder: Arc<dyn ChallengeResponder>,
) -> Result<bool, AuthError> {
    let mut response = session
        .authenticate_keyboard_interactive_start(username, None::<String>)
        .await?;

    loop {
        let (name, instructions, prompts) = match response {
            KeyboardInteractiveAuthResponse::Success => return Ok(true),
            KeyboardInteractiveAuthResponse::Failure { .. } => return Ok(false),
            KeyboardInteractiveAuthResponse::InfoRequest {
                name,
                instructions,
                prompts,
            } => (name, instructions, prompts),
        };

        let (questions, echoes): (Vec<String>, Vec<bool>) =
            prompts.into_iter().map(|p| (p.prompt, p.echo)).unzip();
        let challenge = Challenge {
            user: username.to_string(),
            name,
            instruction: instructions,
            questions,
            echoes,
        };

        let answers = answer_challenge(responder.clone(), challenge).await?;
        response = session
            .authenticate_keyboard_interactive_respond(answers)
            .await?;
    }
}

/// SSH client handler for russh.
pub(crate) struct SshHandler {
    hostname: String,
    port: u16,
    remote_address: SocketAddr,
    verifier: Arc<dyn HostKeyVerifier>,
    /// Stores a detailed host-key error so dial() can surface it
    /// instead of the generic russh::Error::UnknownKey.
    rejection: Arc<Mutex<Option<HostKeyError>>>,
}

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        let public_key = match server_public_key.to_bytes() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("failed to encode host key from {}: {}", self.remote_address, e);
                Vec::new()
            }
        };

        let record = HostKeyRecord {
            hostname: self.hostname.clone(),
            port: self.port,
            remote_address: self.remote_address,
            public_key,
        };

        match self.verifier.verify(&record) {
            Ok(()) => {
                debug!("host key accepted for {} ({})", record.hostname, record.remote_address);
                Ok(true)
            }
            Err(e) => {
                warn!("host key rejected for {}: {}", record.hostname, e);
                if let Ok(mut slot) = self.rejection.lock() {
                    *slot = Some(e);
                }
                Ok(false)
            }
        }
    }
}
