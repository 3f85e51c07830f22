//! Error types
//!
//! Defines the error taxonomy for the FXP client: transport failures,
//! protocol-step mismatches, and parse failures.

use std::fmt;
use std::io;
use std::time::Duration;

use crate::client::types::EncryptionMode;

/// Errors surfaced by the protocol engine.
///
/// `Protocol` failures always carry the named step that was being gated
/// and the expected vs. actual reply codes, so a failed sequence can be
/// attributed without re-parsing messages.
#[derive(Debug)]
pub enum ClientError {
    /// Transport open/read/write failure.
    Connection(io::Error),
    /// The server closed the connection before a complete reply arrived.
    ConnectionClosed(String),
    /// A reply code did not match the one required at a protocol step.
    Protocol {
        step: &'static str,
        expected: u16,
        actual: u16,
    },
    /// A reply was malformed beyond recoverable defaults.
    Parse(String),
    /// TLS connector construction or handshake failure.
    Tls(native_tls::Error),
    /// The selected encryption mode is not implemented.
    UnsupportedEncryption(EncryptionMode),
    /// A bounded-wait deadline expired.
    Timeout {
        operation: &'static str,
        limit: Duration,
    },
    /// A channel method was called outside its legal session state.
    InvalidState(String),
}

pub type ClientResult<T> = Result<T, ClientError>;

impl ClientError {
    /// Re-label the step of a `Protocol` error; other variants pass through.
    ///
    /// The FXP orchestrator uses this to attribute a generic "cwd" failure
    /// to the sequence step that issued it.
    pub fn with_step(self, step: &'static str) -> Self {
        match self {
            ClientError::Protocol {
                expected, actual, ..
            } => ClientError::Protocol {
                step,
                expected,
                actual,
            },
            other => other,
        }
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Connection(e) => write!(f, "Connection error: {}", e),
            ClientError::ConnectionClosed(ctx) => write!(f, "Connection closed: {}", ctx),
            ClientError::Protocol {
                step,
                expected,
                actual,
            } => write!(
                f,
                "Protocol error at step '{}': expected {}, got {}",
                step, expected, actual
            ),
            ClientError::Parse(msg) => write!(f, "Parse error: {}", msg),
            ClientError::Tls(e) => write!(f, "TLS error: {}", e),
            ClientError::UnsupportedEncryption(mode) => {
                write!(f, "Encryption mode {:?} is not supported", mode)
            }
            ClientError::Timeout { operation, limit } => {
                write!(f, "Operation '{}' timed out after {:?}", operation, limit)
            }
            ClientError::InvalidState(msg) => write!(f, "Invalid session state: {}", msg),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<io::Error> for ClientError {
    fn from(error: io::Error) -> Self {
        ClientError::Connection(error)
    }
}

impl From<native_tls::Error> for ClientError {
    fn from(error: native_tls::Error) -> Self {
        ClientError::Tls(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_error_names_step_and_codes() {
        let err = ClientError::Protocol {
            step: "port-ack",
            expected: 200,
            actual: 500,
        };
        let rendered = err.to_string();
        assert!(rendered.contains("port-ack"));
        assert!(rendered.contains("200"));
        assert!(rendered.contains("500"));
    }

    #[test]
    fn with_step_relabels_protocol_errors_only() {
        let err = ClientError::Protocol {
            step: "cwd",
            expected: 250,
            actual: 550,
        };
        match err.with_step("source-cwd") {
            ClientError::Protocol { step, .. } => assert_eq!(step, "source-cwd"),
            other => panic!("unexpected variant: {}", other),
        }

        let err = ClientError::Parse("bad".to_string());
        assert!(matches!(err.with_step("source-cwd"), ClientError::Parse(_)));
    }
}
