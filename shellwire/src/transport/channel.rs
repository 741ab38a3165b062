//! russh session channel adapter.
//!
//! Before the shell starts, the channel is driven directly for the pty and
//! shell round trips. Once the streams are taken, a single pump task owns the
//! channel and moves bytes between it and three in-process pipes, so the relay
//! never touches the channel and needs no locking.

use std::time::Duration;

use log::{debug, trace, warn};
use russh::client::Msg;
use russh::{Channel, ChannelMsg};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::{RemoteSession, SessionStreams};
use crate::error::ChannelError;
use crate::session::TerminalRequest;

/// Capacity of each pipe between the pump and the relay.
const PIPE_CAPACITY: usize = 64 * 1024;

/// Chunk size for local input forwarded to the channel.
const INPUT_CHUNK_SIZE: usize = 32 * 1024;

/// How long close() waits for the pump before aborting it.
const PUMP_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Extended data stream number for stderr.
const SSH_EXTENDED_DATA_STDERR: u32 = 1;

/// A russh session channel.
pub struct SshSession {
    channel: Option<Channel<Msg>>,
    pump: Option<Pump>,
    /// Output that arrived while waiting for a request reply.
    early_stdout: Vec<u8>,
    early_stderr: Vec<u8>,
    closed: bool,
}

struct Pump {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl SshSession {
    pub(crate) fn new(channel: Channel<Msg>) -> Self {
        Self {
            channel: Some(channel),
            pump: None,
            early_stdout: Vec::new(),
            early_stderr: Vec::new(),
            closed: false,
        }
    }

    fn channel_mut(&mut self) -> Result<&mut Channel<Msg>, ChannelError> {
        if self.closed {
            return Err(ChannelError::Closed);
        }
        self.channel.as_mut().ok_or(ChannelError::StreamsTaken)
    }

    /// Wait for the Success/Failure reply to a `want_reply` request.
    async fn await_reply(&mut self) -> Result<(), ChannelError> {
        loop {
            let channel = self.channel_mut()?;
            match channel.wait().await {
                Some(ChannelMsg::Success) => return Ok(()),
                Some(ChannelMsg::Failure) => return Err(ChannelError::Rejected),
                Some(ChannelMsg::Data { data }) => self.early_stdout.extend_from_slice(&data),
                Some(ChannelMsg::ExtendedData { data, ext }) if ext == SSH_EXTENDED_DATA_STDERR => {
                    self.early_stderr.extend_from_slice(&data)
                }
                Some(ChannelMsg::Close) | Some(ChannelMsg::Eof) | None => {
                    return Err(ChannelError::Closed);
                }
                Some(other) => trace!("ignoring {:?} while awaiting reply", other),
            }
        }
    }
}

impl RemoteSession for SshSession {
    async fn request_pty(&mut self, request: &TerminalRequest) -> Result<(), ChannelError> {
        self.channel_mut()?
            .request_pty(
                true,
                &request.term,
                request.cols,
                request.rows,
                0,
                0,
                &request.modes,
            )
            .await?;
        self.await_reply().await
    }

    async fn request_shell(&mut self) -> Result<(), ChannelError> {
        self.channel_mut()?.request_shell(true).await?;
        self.await_reply().await
    }

    fn take_streams(&mut self) -> Result<SessionStreams, ChannelError> {
        if self.closed {
            return Err(ChannelError::Closed);
        }
        let channel = self.channel.take().ok_or(ChannelError::StreamsTaken)?;

        let (stdin, pump_input) = tokio::io::duplex(PIPE_CAPACITY);
        let (pump_stdout, stdout) = tokio::io::duplex(PIPE_CAPACITY);
        let (pump_stderr, stderr) = tokio::io::duplex(PIPE_CAPACITY);
        let (shutdown, shutdown_rx) = oneshot::channel();

        let early = (
            std::mem::take(&mut self.early_stdout),
            std::mem::take(&mut self.early_stderr),
        );
        let task = tokio::spawn(pump(
            channel,
            pump_input,
            pump_stdout,
            pump_stderr,
            early,
            shutdown_rx,
        ));
        self.pump = Some(Pump { shutdown, task });

        Ok(SessionStreams::new(stdin, stdout, stderr))
    }

    async fn close(&mut self) -> Result<(), ChannelError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if let Some(channel) = self.channel.take() {
            channel.close().await?;
        }
        if let Some(Pump { shutdown, mut task }) = self.pump.take() {
            // The pump closes the channel itself on its way out.
            let _ = shutdown.send(());
            match tokio::time::timeout(PUMP_SHUTDOWN_TIMEOUT, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("session pump task failed: {}", e),
                Err(_) => {
                    warn!("session pump did not stop within {:?}, aborting", PUMP_SHUTDOWN_TIMEOUT);
                    task.abort();
                }
            }
        }
        debug!("session channel released");
        Ok(())
    }
}

impl Drop for SshSession {
    fn drop(&mut self) {
        if !self.closed {
            warn!("SshSession dropped without close()");
        }
    }
}

/// Write to an output pipe, dropping it once the reader is gone.
async fn forward(sink: &mut Option<DuplexStream>, data: &[u8]) {
    let failed = match sink.as_mut() {
        Some(pipe) => pipe.write_all(data).await.is_err(),
        None => false,
    };
    if failed {
        trace!("output pipe closed, discarding further output");
        *sink = None;
    }
}

/// Move bytes between the channel and the relay pipes until the channel
/// closes or shutdown is requested.
async fn pump(
    mut channel: Channel<Msg>,
    mut input: DuplexStream,
    stdout: DuplexStream,
    stderr: DuplexStream,
    early: (Vec<u8>, Vec<u8>),
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut stdout = Some(stdout);
    let mut stderr = Some(stderr);
    forward(&mut stdout, &early.0).await;
    forward(&mut stderr, &early.1).await;

    let mut buf = vec![0u8; INPUT_CHUNK_SIZE];
    let mut input_open = true;

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                trace!("pump shutdown requested");
                break;
            }

            read = input.read(&mut buf), if input_open => match read {
                Ok(0) => {
                    input_open = false;
                    // Sends wait for window space, which a stalled peer never grants.
                    tokio::select! {
                        _ = &mut shutdown => {
                            trace!("pump shutdown while sending EOF");
                            break;
                        }
                        sent = channel.eof() => if let Err(e) = sent {
                            debug!("failed to send EOF: {}", e);
                        },
                    }
                }
                Ok(n) => {
                    tokio::select! {
                        _ = &mut shutdown => {
                            trace!("pump shutdown while sending data");
                            break;
                        }
                        sent = channel.data(&buf[..n]) => if let Err(e) = sent {
                            warn!("failed to send data to channel: {}", e);
                            break;
                        },
                    }
                }
                Err(e) => {
                    debug!("input pipe error: {}", e);
                    input_open = false;
                }
            },

            msg = channel.wait() => match msg {
                Some(ChannelMsg::Data { data }) => forward(&mut stdout, &data).await,
                Some(ChannelMsg::ExtendedData { data, ext }) if ext == SSH_EXTENDED_DATA_STDERR => {
                    forward(&mut stderr, &data).await
                }
                Some(ChannelMsg::ExitStatus { exit_status }) => {
                    debug!("remote shell exited with status {}", exit_status);
                }
                Some(ChannelMsg::Eof) => {
                    // Dropping the pipes signals end-of-stream to the relay.
                    stdout = None;
                    stderr = None;
                }
                Some(ChannelMsg::Close) | None => break,
                Some(other) => trace!("ignoring {:?}", other),
            },
        }
    }

    if let Err(e) = channel.close().await {
        trace!("channel close: {}", e);
    }
}
