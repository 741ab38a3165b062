//! # Shellwire
//!
//! Async interactive SSH shell sessions.
//!
//! Shellwire connects to an SSH server, verifies its host key through a
//! pluggable policy, authenticates, requests a pseudo-terminal and a shell,
//! and relays raw bytes between local streams and the remote shell until the
//! remote side exits or the relay is cancelled.
//!
//! ## Features
//!
//! - Async SSH connections via russh
//! - Host key policies: pinned key, known_hosts, custom closure, or accept-any
//! - Password, keyboard-interactive and public key authentication
//! - Cancellable three-way byte relay with per-direction reporting
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use shellwire::{ClientBuilder, LocalStreams};
//! use shellwire::host_key::KnownHostsMode;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), shellwire::Error> {
//!     let client = ClientBuilder::new("192.168.1.1")
//!         .username("admin")
//!         .password("secret")
//!         .known_hosts(KnownHostsMode::Strict)
//!         .build()?;
//!
//!     let cancel = CancellationToken::new();
//!     let report = client.run(LocalStreams::stdio(), &cancel).await?;
//!     eprintln!("sent {} bytes", report.input.bytes);
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod error;
pub mod host_key;
pub mod relay;
pub mod session;
pub mod transport;

// Re-export main types for convenience
pub use auth::{AuthMethod, ChallengeResponder, StaticAnswers, TerminalPrompter};
pub use client::{Client, ClientBuilder, SessionConfig};
pub use error::{Error, Result};
pub use host_key::{AcceptAny, Custom, FixedKey, HostKeyRecord, HostKeyVerifier, KnownHosts};
pub use relay::{LocalStreams, RelayReport};
pub use session::TerminalRequest;
pub use transport::{SshTransport, SshTransportConfig};
