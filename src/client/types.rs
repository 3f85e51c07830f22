//! Session value types
//!
//! Credentials, server address, and the encryption mode selected for a
//! control channel.

use std::fmt;

/// Login credentials, immutable per session.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub(crate) fn password(&self) -> &str {
        &self.password
    }
}

// The password never appears in logs or debug output.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Server address, immutable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteAddress {
    pub hostname: String,
    pub port: u16,
}

impl SiteAddress {
    pub fn new(hostname: impl Into<String>, port: u16) -> Self {
        Self {
            hostname: hostname.into(),
            port,
        }
    }

    /// `host:port` form used for the TCP connect.
    pub fn host_string(&self) -> String {
        format!("{}:{}", self.hostname, self.port)
    }
}

impl fmt::Display for SiteAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.hostname, self.port)
    }
}

/// Encryption applied to the control connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionMode {
    /// No encryption.
    Plain,
    /// In-place upgrade via AUTH TLS after the greeting.
    ExplicitTls,
    /// Reserved. Selecting it fails with an unsupported-mode error
    /// instead of silently degrading to an unencrypted session.
    Ssl,
}
