//! Explicit TLS upgrade
//!
//! Performs the client-side handshake over the already-connected
//! transport after a successful AUTH TLS exchange and hands back the
//! TLS-wrapped stream as the channel's new owned connection.

use std::time::Duration;

use log::debug;
use tokio::time::timeout;
use tokio_native_tls::TlsConnector;

use crate::client::transport::Transport;
use crate::error::{ClientError, ClientResult};

/// Build a connector honoring the certificate policy.
///
/// Certificate validation is off by default throughout this crate
/// (`accept_invalid_certs = true`): FXP-capable servers overwhelmingly
/// run self-signed certificates. Pass false to enable full chain and
/// hostname validation.
pub fn build_tls_connector(accept_invalid_certs: bool) -> ClientResult<TlsConnector> {
    let mut builder = native_tls::TlsConnector::builder();
    if accept_invalid_certs {
        builder.danger_accept_invalid_certs(true);
        builder.danger_accept_invalid_hostnames(true);
    }
    let connector = builder.build()?;
    Ok(TlsConnector::from(connector))
}

/// Wrap the connected plain transport in TLS.
///
/// The handshake runs over the same TCP stream the greeting arrived on,
/// bounded by `deadline`; the returned value replaces the channel's
/// transport wholesale. Fails if the transport is already TLS.
pub async fn upgrade(
    transport: Transport,
    hostname: &str,
    accept_invalid_certs: bool,
    deadline: Duration,
) -> ClientResult<Transport> {
    let tcp = match transport {
        Transport::Plain(tcp) => tcp,
        Transport::Tls(_) => {
            return Err(ClientError::InvalidState(
                "connection is already TLS-wrapped".to_string(),
            ));
        }
    };

    let connector = build_tls_connector(accept_invalid_certs)?;

    debug!("starting TLS handshake with {}", hostname);
    let tls = timeout(deadline, connector.connect(hostname, tcp))
        .await
        .map_err(|_| ClientError::Timeout {
            operation: "TLS handshake",
            limit: deadline,
        })?
        .map_err(ClientError::Tls)?;

    Ok(Transport::Tls(tls))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connector_builds_under_both_certificate_policies() {
        assert!(build_tls_connector(true).is_ok());
        assert!(build_tls_connector(false).is_ok());
    }
}
