//! Pseudo-terminal and shell negotiation.
//!
//! A session is negotiated in two blocking round trips: the pty request, then
//! the shell request. The shell is never requested unless the pty request was
//! acknowledged.

mod modes;

use log::debug;
use russh::Pty;

use crate::error::{ConfigError, SessionSetupError};
use crate::transport::RemoteSession;

pub use modes::{DEFAULT_SPEED, default_modes, set_mode};

/// Default terminal type.
pub const DEFAULT_TERM: &str = "xterm";

/// Default terminal height in rows.
pub const DEFAULT_ROWS: u32 = 40;

/// Default terminal width in columns.
pub const DEFAULT_COLS: u32 = 80;

/// Parameters of the pty request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalRequest {
    /// Terminal type (`TERM`).
    pub term: String,

    /// Height in rows.
    pub rows: u32,

    /// Width in columns.
    pub cols: u32,

    /// Mode flags and their values.
    pub modes: Vec<(Pty, u32)>,
}

impl TerminalRequest {
    /// Request with the given type and size and the default mode table.
    pub fn new(term: impl Into<String>, rows: u32, cols: u32) -> Self {
        Self {
            term: term.into(),
            rows,
            cols,
            modes: default_modes(),
        }
    }

    /// Set a mode flag, replacing any previous value.
    pub fn with_mode(mut self, mode: Pty, value: u32) -> Self {
        set_mode(&mut self.modes, mode, value);
        self
    }

    /// Reject requests the server cannot act on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.term.trim().is_empty() {
            return Err(ConfigError::InvalidTerminal {
                message: "terminal type is empty".to_string(),
            });
        }
        if self.rows == 0 || self.cols == 0 {
            return Err(ConfigError::InvalidTerminal {
                message: format!("terminal size {}x{} is empty", self.cols, self.rows),
            });
        }
        Ok(())
    }
}

impl Default for TerminalRequest {
    fn default() -> Self {
        Self::new(DEFAULT_TERM, DEFAULT_ROWS, DEFAULT_COLS)
    }
}

/// Request a pty, then a shell.
///
/// Does not release the session; the caller owns that on every path.
pub async fn negotiate<S: RemoteSession>(
    session: &mut S,
    request: &TerminalRequest,
) -> Result<(), SessionSetupError> {
    session
        .request_pty(request)
        .await
        .map_err(SessionSetupError::Pty)?;
    debug!(
        "pty granted: {} {}x{} ({} modes)",
        request.term,
        request.cols,
        request.rows,
        request.modes.len()
    );

    session
        .request_shell()
        .await
        .map_err(SessionSetupError::Shell)?;
    debug!("shell started");

    Ok(())
}
