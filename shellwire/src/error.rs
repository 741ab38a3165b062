//! Error types for shellwire.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Main error type for shellwire operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Caller configuration is incomplete or invalid
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Dial, handshake, host-key or authentication failure
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// Pseudo-terminal or shell negotiation failure
    #[error("Session setup error: {0}")]
    SessionSetup(#[from] SessionSetupError),

    /// Every relay direction failed
    #[error("Relay error: {0}")]
    Relay(#[from] RelayError),
}

/// Configuration errors, always detected before any network activity.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No username configured
    #[error("Username is required")]
    MissingUsername,

    /// No authentication method configured
    #[error("At least one authentication method is required")]
    NoAuthMethods,

    /// No host key verification policy configured
    #[error("A host key verification policy is required")]
    MissingHostKeyPolicy,

    /// Terminal request is unusable
    #[error("Invalid terminal request: {message}")]
    InvalidTerminal { message: String },

    /// A configured host key could not be parsed
    #[error("Invalid host key: {message}")]
    InvalidHostKey { message: String },
}

/// Transport-level errors (resolution, TCP, SSH handshake, authentication).
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// Address resolution failed
    #[error("Failed to resolve {target}: {source}")]
    Resolve {
        target: String,
        #[source]
        source: io::Error,
    },

    /// Address resolution returned nothing
    #[error("No addresses found for {target}")]
    NoAddresses { target: String },

    /// Failed to connect to host
    #[error("Connection failed to {target}: {source}")]
    ConnectionFailed {
        target: String,
        #[source]
        source: io::Error,
    },

    /// Operation timed out
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// The host key verifier rejected the server
    #[error("Host key verification failed: {0}")]
    HostKey(#[from] HostKeyError),

    /// No authentication method succeeded
    #[error("{0}")]
    Authentication(#[from] AuthError),

    /// Cancelled before the session started
    #[error("Cancelled before the session started")]
    Cancelled,
}

/// Host key verification outcomes other than acceptance.
#[derive(Error, Debug)]
pub enum HostKeyError {
    /// Presented key differs from the expected one
    #[error("Host key mismatch for {host}: expected {expected}, got {presented}")]
    Mismatch {
        host: String,
        expected: String,
        presented: String,
    },

    /// A fixed-key verifier was used without an expected key
    #[error("No expected host key configured")]
    NoExpectedKey,

    /// Host is not in known_hosts and unknown hosts are rejected
    #[error("Unknown host {host}:{port} (not present in known_hosts)")]
    Unknown { host: String, port: u16 },

    /// Host is in known_hosts with a different key
    #[error("Host key for {host}:{port} changed (known_hosts line {line})")]
    Changed { host: String, port: u16, line: usize },

    /// known_hosts could not be read or written
    #[error("known_hosts error: {0}")]
    KnownHosts(String),

    /// Presented key bytes are not a valid SSH public key
    #[error("Undecodable host key: {0}")]
    Encoding(String),

    /// A custom verifier refused the key
    #[error("Host key for {host} rejected: {reason}")]
    Rejected { host: String, reason: String },
}

/// Authentication errors.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Every configured method was refused
    #[error("Authentication failed for user '{user}' (tried: {})", .tried.join(", "))]
    Failed {
        user: String,
        tried: Vec<&'static str>,
    },

    /// A challenge responder broke the one-answer-per-question contract
    #[error("Challenge responder returned {got} answers for {expected} questions")]
    AnswerCountMismatch { expected: usize, got: usize },

    /// The responder has no way to reach its respondent
    #[error("Challenge responder unavailable: {0}")]
    ResponderUnavailable(String),

    /// Protocol error during an authentication exchange
    #[error("SSH error during authentication: {0}")]
    Ssh(#[from] russh::Error),
}

/// Channel-level errors reported by a transport session.
#[derive(Error, Debug)]
pub enum ChannelError {
    /// The server replied with a failure
    #[error("request rejected by server")]
    Rejected,

    /// Channel closed before the operation finished
    #[error("channel closed")]
    Closed,

    /// Streams were already detached from this session
    #[error("session streams already taken")]
    StreamsTaken,

    /// SSH protocol error on the channel
    #[error("channel SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Session setup errors. The connection itself stays usable.
#[derive(Error, Debug)]
pub enum SessionSetupError {
    /// Failed to open a session channel
    #[error("failed to open session channel: {0}")]
    ChannelOpen(#[source] ChannelError),

    /// Pseudo-terminal request failed
    #[error("pseudo-terminal request failed: {0}")]
    Pty(#[source] ChannelError),

    /// Shell request failed
    #[error("shell request failed: {0}")]
    Shell(#[source] ChannelError),

    /// Could not attach the relay to the session
    #[error("failed to attach session streams: {0}")]
    Streams(#[source] ChannelError),
}

/// Relay errors. Single-direction failures are reported in the relay report.
#[derive(Error, Debug)]
pub enum RelayError {
    /// Every direction ended with a stream error
    #[error("all relay directions failed: {0}")]
    AllDirectionsFailed(#[source] io::Error),
}

/// Result type alias using shellwire's Error.
pub type Result<T> = std::result::Result<T, Error>;
