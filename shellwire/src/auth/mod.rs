//! Credentials supplied to the SSH handshake.
//!
//! Methods are tried in configured order until one succeeds. The russh side
//! of the exchange lives in the transport; this module defines the methods and
//! the keyboard-interactive responder contract.

mod prompt;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use log::debug;
use secrecy::{ExposeSecret, SecretString};

use crate::error::AuthError;

pub use prompt::TerminalPrompter;

/// Authentication method for SSH connections.
pub enum AuthMethod {
    /// Password authentication. An empty password is allowed.
    Password(SecretString),

    /// Keyboard-interactive authentication driven by a responder.
    KeyboardInteractive(Arc<dyn ChallengeResponder>),

    /// Private key authentication.
    PrivateKey {
        /// Path to the private key file.
        path: PathBuf,
        /// Optional passphrase for encrypted keys.
        passphrase: Option<SecretString>,
    },
}

impl AuthMethod {
    /// Password method from a plain string.
    pub fn password(password: impl Into<String>) -> Self {
        Self::Password(SecretString::from(password.into()))
    }

    /// Keyboard-interactive method from a responder.
    pub fn keyboard_interactive(responder: impl ChallengeResponder + 'static) -> Self {
        Self::KeyboardInteractive(Arc::new(responder))
    }

    /// SSH method name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Password(_) => "password",
            Self::KeyboardInteractive(_) => "keyboard-interactive",
            Self::PrivateKey { .. } => "publickey",
        }
    }
}

impl fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Password(_) => f.write_str("Password(..)"),
            Self::KeyboardInteractive(_) => f.write_str("KeyboardInteractive(..)"),
            Self::PrivateKey { path, passphrase } => f
                .debug_struct("PrivateKey")
                .field("path", path)
                .field("passphrase", &passphrase.as_ref().map(|_| ".."))
                .finish(),
        }
    }
}

/// Borrowed view of the credentials, held only for the handshake.
#[derive(Debug, Clone, Copy)]
pub struct AuthConfig<'a> {
    /// Username to authenticate as.
    pub username: &'a str,

    /// Methods, in the order they are tried.
    pub methods: &'a [AuthMethod],
}

/// One keyboard-interactive round sent by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    /// User being authenticated.
    pub user: String,

    /// Challenge name (often empty).
    pub name: String,

    /// Instruction text from the server (often empty).
    pub instruction: String,

    /// Questions, in order.
    pub questions: Vec<String>,

    /// Whether each answer may be echoed, parallel to `questions`.
    pub echoes: Vec<bool>,
}

impl Challenge {
    /// Number of answers the server expects.
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// True for rounds with no questions.
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

/// Answers keyboard-interactive challenges.
///
/// May be called several times in one handshake (e.g. password, then a
/// one-time code). Implementations may block until a respondent answers; the
/// transport runs them on the blocking thread pool. Answers must be returned in
/// question order, one per question.
pub trait ChallengeResponder: Send + Sync {
    /// Answer one challenge round.
    fn respond(&self, challenge: &Challenge) -> Result<Vec<String>, AuthError>;
}

/// Answers every question with the same secret.
///
/// Covers servers that implement password login over keyboard-interactive.
pub struct StaticAnswers {
    secret: SecretString,
}

impl StaticAnswers {
    /// Answer with `secret`, whatever the question.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: SecretString::from(secret.into()),
        }
    }
}

impl fmt::Debug for StaticAnswers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StaticAnswers(..)")
    }
}

impl ChallengeResponder for StaticAnswers {
    fn respond(&self, challenge: &Challenge) -> Result<Vec<String>, AuthError> {
        Ok(challenge
            .questions
            .iter()
            .map(|_| self.secret.expose_secret().to_string())
            .collect())
    }
}

/// Check the one-answer-per-question contract.
pub fn validate_answers(challenge: &Challenge, answers: &[String]) -> Result<(), AuthError> {
    if answers.len() != challenge.len() {
        return Err(AuthError::AnswerCountMismatch {
            expected: challenge.len(),
            got: answers.len(),
        });
    }
    Ok(())
}

/// Run a responder off the async runtime and validate its answers.
pub async fn answer_challenge(
    responder: Arc<dyn ChallengeResponder>,
    challenge: Challenge,
) -> Result<Vec<String>, AuthError> {
    debug!(
        "keyboard-interactive round for '{}' with {} question(s)",
        challenge.user,
        challenge.len()
    );

    let (challenge, answers) = tokio::task::spawn_blocking(move || {
        let answers = responder.respond(&challenge);
        (challenge, answers)
    })
    .await
    .map_err(|e| AuthError::ResponderUnavailable(e.to_string()))?;

    let answers = answers?;
    validate_answers(&challenge, &answers)?;
    Ok(answers)
}
