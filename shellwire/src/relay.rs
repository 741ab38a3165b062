//! Byte relay between the local terminal and a running remote shell.
//!
//! Three copy loops run concurrently and share nothing: local input to remote
//! stdin, remote stdout to local output, remote stderr to local error. Bytes are
//! passed through uninterpreted. The relay ends when both remote output
//! directions have ended or the cancellation token fires.

use std::io;

use futures_util::future::join;
use log::{debug, trace};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, Stderr, Stdin, Stdout};
use tokio_util::sync::CancellationToken;

use crate::error::RelayError;
use crate::transport::SessionStreams;

/// Read buffer size for each direction.
const CHUNK_SIZE: usize = 16 * 1024;

/// The local side of the relay.
#[derive(Debug)]
pub struct LocalStreams<I, O, E> {
    /// Bytes typed by the user.
    pub input: I,

    /// Destination for remote stdout.
    pub output: O,

    /// Destination for remote stderr.
    pub error: E,
}

impl LocalStreams<Stdin, Stdout, Stderr> {
    /// The process's standard streams.
    pub fn stdio() -> Self {
        Self {
            input: tokio::io::stdin(),
            output: tokio::io::stdout(),
            error: tokio::io::stderr(),
        }
    }
}

/// One of the three relayed byte streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Local input to remote stdin.
    LocalToRemote,
    /// Remote stdout to local output.
    RemoteOutput,
    /// Remote stderr to local error output.
    RemoteError,
}

/// How a direction ended.
#[derive(Debug)]
pub enum DirectionEnd {
    /// The source reached end-of-stream.
    Eof,
    /// Stopped by cancellation, or by the remote side exiting first.
    Cancelled,
    /// A read or write failed.
    Failed(io::Error),
}

/// Result of one copy loop.
#[derive(Debug)]
pub struct DirectionOutcome {
    /// Which way the bytes flowed.
    pub direction: Direction,
    /// Bytes fully written to the sink.
    pub bytes: u64,
    /// Why the loop stopped.
    pub end: DirectionEnd,
}

/// Per-direction results of a finished relay.
#[derive(Debug)]
pub struct RelayReport {
    /// Local input to remote stdin.
    pub input: DirectionOutcome,
    /// Remote stdout to local output.
    pub output: DirectionOutcome,
    /// Remote stderr to local error output.
    pub error: DirectionOutcome,
}

/// Relay until the remote output ends or `cancel` fires.
///
/// End-of-stream on local input is forwarded as end-of-stream on the remote
/// stdin. Once both remote output directions end, the input direction is
/// cancelled. A stream error only ends its own direction; the relay fails only
/// when all three directions failed.
pub async fn run<I, O, E>(
    remote: SessionStreams,
    local: LocalStreams<I, O, E>,
    cancel: &CancellationToken,
) -> Result<RelayReport, RelayError>
where
    I: AsyncRead + Unpin,
    O: AsyncWrite + Unpin,
    E: AsyncWrite + Unpin,
{
    let SessionStreams {
        stdin,
        stdout,
        stderr,
    } = remote;
    let LocalStreams {
        input,
        output,
        error,
    } = local;
    let input_cancel = cancel.child_token();

    let outputs = async {
        let outcomes = join(
            copy(Direction::RemoteOutput, stdout, output, cancel),
            copy(Direction::RemoteError, stderr, error, cancel),
        )
        .await;
        input_cancel.cancel();
        outcomes
    };
    let input = copy(Direction::LocalToRemote, input, stdin, &input_cancel);

    let (input, (output, error)) = join(input, outputs).await;
    debug!(
        "relay finished: {} bytes in, {} bytes out, {} bytes err",
        input.bytes, output.bytes, error.bytes
    );

    match (RelayReport {
        input,
        output,
        error,
    }) {
        RelayReport {
            input:
                DirectionOutcome {
                    end: DirectionEnd::Failed(source),
                    ..
                },
            output:
                DirectionOutcome {
                    end: DirectionEnd::Failed(_),
                    ..
                },
            error:
                DirectionOutcome {
                    end: DirectionEnd::Failed(_),
                    ..
                },
        } => Err(RelayError::AllDirectionsFailed(source)),
        report => Ok(report),
    }
}

async fn copy<R, W>(
    direction: Direction,
    mut reader: R,
    mut writer: W,
    cancel: &CancellationToken,
) -> DirectionOutcome
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut bytes = 0u64;

    let end = loop {
        let n = tokio::select! {
            biased;
            _ = cancel.cancelled() => break DirectionEnd::Cancelled,
            read = reader.read(&mut buf) => match read {
                Ok(0) => break DirectionEnd::Eof,
                Ok(n) => n,
                Err(e) => break DirectionEnd::Failed(e),
            },
        };

        let written = tokio::select! {
            biased;
            _ = cancel.cancelled() => break DirectionEnd::Cancelled,
            written = write_chunk(&mut writer, &buf[..n]) => written,
        };
        if let Err(e) = written {
            break DirectionEnd::Failed(e);
        }
        bytes += n as u64;
        trace!("{:?}: relayed {} bytes", direction, n);
    };

    if let DirectionEnd::Eof = end {
        if let Err(e) = writer.shutdown().await {
            debug!("{:?}: shutdown after EOF failed: {}", direction, e);
        }
    }
    debug!("{:?} ended after {} bytes: {:?}", direction, bytes, end);

    DirectionOutcome {
        direction,
        bytes,
        end,
    }
}

async fn write_chunk<W: AsyncWrite + Unpin>(writer: &mut W, chunk: &[u8]) -> io::Result<()> {
    writer.write_all(chunk).await?;
    writer.flush().await
}
