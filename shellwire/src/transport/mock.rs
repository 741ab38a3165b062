//! In-memory transport for exercising the core without a server.

use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use tokio::io::{AsyncWrite, DuplexStream};

use super::{Connection, ConnectionTarget, RemoteSession, SessionStreams, Transport};
use crate::auth::AuthConfig;
use crate::error::{ChannelError, ConnectionError};
use crate::host_key::{HostKeyRecord, HostKeyVerifier};
use crate::session::TerminalRequest;

/// Counters and captures shared by every mock object of one test.
#[derive(Default)]
pub(crate) struct Recorder {
    dials: AtomicUsize,
    sessions_opened: AtomicUsize,
    pty_requests: AtomicUsize,
    shell_requests: AtomicUsize,
    session_closes: AtomicUsize,
    connection_closes: AtomicUsize,
    events: Mutex<Vec<&'static str>>,
    terminal: Mutex<Option<TerminalRequest>>,
    remote_stdin: Arc<Mutex<Vec<u8>>>,
    usernames: Mutex<Vec<String>>,
}

impl Recorder {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn record(&self, event: &'static str) {
        self.events.lock().unwrap().push(event);
    }

    pub(crate) fn dials(&self) -> usize {
        self.dials.load(Ordering::SeqCst)
    }

    pub(crate) fn sessions_opened(&self) -> usize {
        self.sessions_opened.load(Ordering::SeqCst)
    }

    pub(crate) fn pty_requests(&self) -> usize {
        self.pty_requests.load(Ordering::SeqCst)
    }

    pub(crate) fn shell_requests(&self) -> usize {
        self.shell_requests.load(Ordering::SeqCst)
    }

    pub(crate) fn session_closes(&self) -> usize {
        self.session_closes.load(Ordering::SeqCst)
    }

    pub(crate) fn connection_closes(&self) -> usize {
        self.connection_closes.load(Ordering::SeqCst)
    }

    pub(crate) fn events(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().clone()
    }

    pub(crate) fn last_terminal(&self) -> Option<TerminalRequest> {
        self.terminal.lock().unwrap().clone()
    }

    pub(crate) fn remote_stdin(&self) -> Vec<u8> {
        self.remote_stdin.lock().unwrap().clone()
    }

    pub(crate) fn usernames(&self) -> Vec<String> {
        self.usernames.lock().unwrap().clone()
    }
}

/// What the mock server does with one session.
#[derive(Debug, Clone, Default)]
pub(crate) struct SessionPlan {
    pub fail_pty: bool,
    pub fail_shell: bool,
    /// Bytes the remote shell writes to stdout.
    pub stdout: Vec<u8>,
    /// Bytes the remote shell writes to stderr.
    pub stderr: Vec<u8>,
    /// Keep stdout open until the session is closed.
    pub hold_open: bool,
    /// Remote streams fail on first use.
    pub broken_streams: bool,
}

pub(crate) struct MockTransport {
    pub recorder: Arc<Recorder>,
    pub fail_dial: bool,
    /// Dial never completes.
    pub stall_dial: bool,
    /// Host key the mock server presents to the verifier.
    pub host_key: Vec<u8>,
    pub plan: SessionPlan,
}

impl MockTransport {
    pub(crate) fn new(recorder: Arc<Recorder>, plan: SessionPlan) -> Self {
        Self {
            recorder,
            fail_dial: false,
            stall_dial: false,
            host_key: vec![0x00, 0x00, 0x00, 0x0b],
            plan,
        }
    }
}

impl Transport for MockTransport {
    type Connection = MockConnection;

    async fn dial(
        &self,
        target: &ConnectionTarget,
        auth: &AuthConfig<'_>,
        verifier: Arc<dyn HostKeyVerifier>,
    ) -> Result<MockConnection, ConnectionError> {
        self.recorder.dials.fetch_add(1, Ordering::SeqCst);
        self.recorder.record("dial");
        self.recorder
            .usernames
            .lock()
            .unwrap()
            .push(auth.username.to_string());

        if self.stall_dial {
            std::future::pending::<()>().await;
        }
        if self.fail_dial {
            return Err(ConnectionError::ConnectionFailed {
                target: target.to_string(),
                source: io::ErrorKind::ConnectionRefused.into(),
            });
        }

        verifier.verify(&HostKeyRecord {
            hostname: target.host().to_string(),
            port: target.port(),
            remote_address: "127.0.0.1:22".parse().unwrap(),
            public_key: self.host_key.clone(),
        })?;

        Ok(MockConnection {
            recorder: self.recorder.clone(),
            plan: self.plan.clone(),
        })
    }
}

pub(crate) struct MockConnection {
    recorder: Arc<Recorder>,
    plan: SessionPlan,
}

impl Connection for MockConnection {
    type Session = MockSession;

    async fn open_session(&self) -> Result<MockSession, ChannelError> {
        self.recorder.sessions_opened.fetch_add(1, Ordering::SeqCst);
        self.recorder.record("open");
        Ok(MockSession::new(self.plan.clone(), self.recorder.clone()))
    }

    async fn close(self) -> Result<(), ConnectionError> {
        self.recorder.connection_closes.fetch_add(1, Ordering::SeqCst);
        self.recorder.record("disconnect");
        Ok(())
    }
}

pub(crate) struct MockSession {
    plan: SessionPlan,
    recorder: Arc<Recorder>,
    streams_taken: bool,
    /// Writer end of a held-open stdout; dropped on close.
    held: Option<DuplexStream>,
}

impl MockSession {
    pub(crate) fn new(plan: SessionPlan, recorder: Arc<Recorder>) -> Self {
        Self {
            plan,
            recorder,
            streams_taken: false,
            held: None,
        }
    }
}

impl RemoteSession for MockSession {
    async fn request_pty(&mut self, request: &TerminalRequest) -> Result<(), ChannelError> {
        self.recorder.pty_requests.fetch_add(1, Ordering::SeqCst);
        self.recorder.record("pty");
        *self.recorder.terminal.lock().unwrap() = Some(request.clone());
        if self.plan.fail_pty {
            return Err(ChannelError::Rejected);
        }
        Ok(())
    }

    async fn request_shell(&mut self) -> Result<(), ChannelError> {
        self.recorder.shell_requests.fetch_add(1, Ordering::SeqCst);
        self.recorder.record("shell");
        if self.plan.fail_shell {
            return Err(ChannelError::Rejected);
        }
        Ok(())
    }

    fn take_streams(&mut self) -> Result<SessionStreams, ChannelError> {
        if self.streams_taken {
            return Err(ChannelError::StreamsTaken);
        }
        self.streams_taken = true;
        self.recorder.record("streams");

        if self.plan.broken_streams {
            return Ok(SessionStreams::new(Broken, Broken, Broken));
        }

        let stdin = Capture(self.recorder.remote_stdin.clone());
        let stderr = io::Cursor::new(self.plan.stderr.clone());
        if self.plan.hold_open {
            let (writer, reader) = tokio::io::duplex(1024);
            self.held = Some(writer);
            Ok(SessionStreams::new(stdin, reader, stderr))
        } else {
            let stdout = io::Cursor::new(self.plan.stdout.clone());
            Ok(SessionStreams::new(stdin, stdout, stderr))
        }
    }

    async fn close(&mut self) -> Result<(), ChannelError> {
        self.recorder.session_closes.fetch_add(1, Ordering::SeqCst);
        self.recorder.record("close");
        self.held = None;
        Ok(())
    }
}

/// Appends everything written to a shared buffer.
struct Capture(Arc<Mutex<Vec<u8>>>);

impl AsyncWrite for Capture {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// A stream whose every operation fails.
pub(crate) struct Broken;

fn broken() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "stream broken")
}

impl tokio::io::AsyncRead for Broken {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut tokio::io::ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Poll::Ready(Err(broken()))
    }
}

impl AsyncWrite for Broken {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Poll::Ready(Err(broken()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Err(broken()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Err(broken()))
    }
}
