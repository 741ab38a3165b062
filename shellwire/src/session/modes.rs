//! Terminal mode tables sent with the pty request.

use russh::Pty;

/// Line speed advertised for both directions.
pub const DEFAULT_SPEED: u32 = 14_400;

/// Modes for a relayed shell: remote echo off, 14.4k baud both ways.
pub fn default_modes() -> Vec<(Pty, u32)> {
    vec![
        (Pty::ECHO, 0),
        (Pty::TTY_OP_ISPEED, DEFAULT_SPEED),
        (Pty::TTY_OP_OSPEED, DEFAULT_SPEED),
    ]
}

/// Set `mode` to `value`, replacing an existing entry for the same flag.
pub fn set_mode(modes: &mut Vec<(Pty, u32)>, mode: Pty, value: u32) {
    match modes.iter_mut().find(|(existing, _)| *existing == mode) {
        Some(entry) => entry.1 = value,
        None => modes.push((mode, value)),
    }
}
