//! Session configuration.

use std::fmt;
use std::sync::Arc;

use crate::auth::{AuthConfig, AuthMethod};
use crate::error::ConfigError;
use crate::host_key::HostKeyVerifier;
use crate::session::TerminalRequest;
use crate::transport::{ConnectionTarget, DEFAULT_HOST, DEFAULT_PORT};

/// Everything needed to open one interactive shell.
///
/// Built once and passed by reference. There is no default host-key policy:
/// a verifier must be chosen explicitly.
pub struct SessionConfig {
    /// Hostname or IP address.
    pub host: String,

    /// SSH port.
    pub port: u16,

    /// Remote username. Required.
    pub username: Option<String>,

    /// Authentication methods, tried in order.
    pub auth_methods: Vec<AuthMethod>,

    /// Pseudo-terminal parameters.
    pub terminal: TerminalRequest,

    /// Host key policy. Required.
    pub host_key_verifier: Option<Arc<dyn HostKeyVerifier>>,
}

impl SessionConfig {
    /// Where to connect.
    pub fn target(&self) -> ConnectionTarget {
        ConnectionTarget::new(self.host.clone(), self.port)
    }

    /// Check the configuration and borrow the handshake credentials.
    pub fn validate(&self) -> Result<AuthConfig<'_>, ConfigError> {
        let username = match self.username.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => return Err(ConfigError::MissingUsername),
        };
        if self.auth_methods.is_empty() {
            return Err(ConfigError::NoAuthMethods);
        }
        self.verifier()?;
        self.terminal.validate()?;

        Ok(AuthConfig {
            username,
            methods: &self.auth_methods,
        })
    }

    /// The configured host key policy.
    pub fn verifier(&self) -> Result<Arc<dyn HostKeyVerifier>, ConfigError> {
        self.host_key_verifier
            .clone()
            .ok_or(ConfigError::MissingHostKeyPolicy)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            username: None,
            auth_methods: Vec::new(),
            terminal: TerminalRequest::default(),
            host_key_verifier: None,
        }
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("auth_methods", &self.auth_methods)
            .field("terminal", &self.terminal)
            .field(
                "host_key_verifier",
                &self.host_key_verifier.as_ref().map(|_| ".."),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host_key::AcceptAny;

    fn complete() -> SessionConfig {
        SessionConfig {
            username: Some("alice".into()),
            auth_methods: vec![AuthMethod::password("")],
            host_key_verifier: Some(Arc::new(AcceptAny)),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.target().to_string(), "127.0.0.1:22");
        assert!(config.username.is_none());
    }

    #[test]
    fn test_validate_complete_config() {
        let config = complete();
        let auth = config.validate().unwrap();
        assert_eq!(auth.username, "alice");
        assert_eq!(auth.methods.len(), 1);
    }

    #[test]
    fn test_validate_missing_username() {
        let mut config = complete();
        config.username = None;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingUsername)
        ));

        config.username = Some(String::new());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingUsername)
        ));
    }

    #[test]
    fn test_validate_missing_methods_and_policy() {
        let mut config = complete();
        config.auth_methods.clear();
        assert!(matches!(config.validate(), Err(ConfigError::NoAuthMethods)));

        let mut config = complete();
        config.host_key_verifier = None;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingHostKeyPolicy)
        ));
    }

    #[test]
    fn test_debug_hides_secrets() {
        let mut config = complete();
        config.auth_methods = vec![AuthMethod::password("hunter2")];
        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("alice"));
    }
}
