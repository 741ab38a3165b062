//! Keyboard-interactive answers typed at the controlling terminal.

use std::io::{self, BufRead, IsTerminal, Write};

use super::{Challenge, ChallengeResponder};
use crate::error::AuthError;

/// Prompts a human on the local terminal.
///
/// Name and instruction text go to stderr. Questions flagged as no-echo are
/// read without echo (passwords, one-time codes).
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPrompter;

impl TerminalPrompter {
    /// Prompter bound to the process's controlling terminal.
    pub fn new() -> Self {
        Self
    }

    fn read_visible(question: &str) -> io::Result<String> {
        let mut stderr = io::stderr().lock();
        write!(stderr, "{question}")?;
        stderr.flush()?;

        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "stdin closed while waiting for an answer",
            ));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

impl ChallengeResponder for TerminalPrompter {
    fn respond(&self, challenge: &Challenge) -> Result<Vec<String>, AuthError> {
        if !challenge.is_empty() && !io::stdin().is_terminal() {
            return Err(AuthError::ResponderUnavailable(
                "stdin is not a terminal".to_string(),
            ));
        }

        let unavailable = |e: io::Error| AuthError::ResponderUnavailable(e.to_string());

        for text in [&challenge.name, &challenge.instruction] {
            if !text.is_empty() {
                eprintln!("{text}");
            }
        }

        let mut answers = Vec::with_capacity(challenge.len());
        for (i, question) in challenge.questions.iter().enumerate() {
            let echo = challenge.echoes.get(i).copied().unwrap_or(false);
            let answer = if echo {
                Self::read_visible(question).map_err(unavailable)?
            } else {
                rpassword::prompt_password(question).map_err(unavailable)?
            };
            answers.push(answer);
        }
        Ok(answers)
    }
}
