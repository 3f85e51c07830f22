//! Control channel
//!
//! One command/reply session to one server. The channel owns its
//! transport and the last negotiated passive token; commands are strict
//! request/response with no pipelining, serialized by `&mut self`.

use std::time::Duration;

use log::{debug, info, trace};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::client::state::SessionState;
use crate::client::tls;
use crate::client::transport::Transport;
use crate::client::types::{Credentials, EncryptionMode, SiteAddress};
use crate::error::{ClientError, ClientResult};
use crate::protocol::{Response, ResponseAssembler};

/// Chunk size for control-connection reads.
const READ_CHUNK: usize = 512;

/// Deadlines and certificate policy for one channel.
#[derive(Debug, Clone)]
pub struct ChannelOptions {
    /// Bound on the TCP connect.
    pub connect_timeout: Duration,
    /// Bound on each receive of one complete reply.
    pub read_timeout: Duration,
    /// Bound on the TLS handshake.
    pub tls_timeout: Duration,
    /// Accept self-signed/mismatched certificates. Defaults to true; see
    /// [`crate::client::tls::build_tls_connector`].
    pub accept_invalid_certs: bool,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(60),
            tls_timeout: Duration::from_secs(30),
            accept_invalid_certs: true,
        }
    }
}

/// One control session to one FTP server.
///
/// The session state only moves forward (disconnected, connected,
/// authenticated, closed); a closed or failed channel is not reusable.
#[derive(Debug)]
pub struct ControlChannel {
    site: SiteAddress,
    credentials: Credentials,
    encryption: EncryptionMode,
    options: ChannelOptions,
    transport: Option<Transport>,
    state: SessionState,
    passive_token: Option<String>,
}

impl ControlChannel {
    pub fn new(site: SiteAddress, credentials: Credentials, encryption: EncryptionMode) -> Self {
        Self::with_options(site, credentials, encryption, ChannelOptions::default())
    }

    pub fn with_options(
        site: SiteAddress,
        credentials: Credentials,
        encryption: EncryptionMode,
        options: ChannelOptions,
    ) -> Self {
        Self {
            site,
            credentials,
            encryption,
            options,
            transport: None,
            state: SessionState::Disconnected,
            passive_token: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn site(&self) -> &SiteAddress {
        &self.site
    }

    /// Whether the transport has been TLS-upgraded.
    pub fn is_secure(&self) -> bool {
        self.transport.as_ref().is_some_and(Transport::is_tls)
    }

    /// Last negotiated passive rendezvous token, if any.
    ///
    /// Opaque to the channel; overwritten on each negotiation.
    pub fn passive_token(&self) -> Option<&str> {
        self.passive_token.as_deref()
    }

    pub(crate) fn set_passive_token(&mut self, token: String) {
        self.passive_token = Some(token);
    }

    /// Connect, upgrade if requested, and authenticate.
    ///
    /// Opens the transport (bounded by the connect deadline), requires a
    /// 220 greeting, performs the in-place TLS upgrade for
    /// [`EncryptionMode::ExplicitTls`], then logs in with USER/PASS.
    /// Requires a fresh channel: the state machine only moves forward, so
    /// re-login means constructing a new channel.
    pub async fn connect(&mut self) -> ClientResult<()> {
        if self.state != SessionState::Disconnected {
            return Err(ClientError::InvalidState(format!(
                "connect() requires a disconnected channel, state is {}",
                self.state
            )));
        }
        // The reserved SSL mode must fail here rather than silently
        // degrade to an unencrypted session.
        if self.encryption == EncryptionMode::Ssl {
            return Err(ClientError::UnsupportedEncryption(self.encryption));
        }

        let addr = self.site.host_string();
        info!("connecting to {}", addr);
        let tcp = timeout(self.options.connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| ClientError::Timeout {
                operation: "connect",
                limit: self.options.connect_timeout,
            })?
            .map_err(ClientError::Connection)?;
        self.transport = Some(Transport::Plain(tcp));
        self.advance(SessionState::Connected);

        self.expect_code(None, 220, "greeting").await?;

        if self.encryption == EncryptionMode::ExplicitTls {
            self.upgrade_to_tls().await?;
        }

        let user = format!("USER {}", self.credentials.username());
        self.expect_code(Some(&user), 331, "username").await?;

        let pass = format!("PASS {}", self.credentials.password());
        self.expect_code(Some(&pass), 230, "password").await?;

        self.advance(SessionState::Authenticated);
        info!("authenticated with {} as {}", addr, self.credentials.username());
        Ok(())
    }

    /// Send one command line.
    ///
    /// A single '\n' terminates the line; the text is written as-is with
    /// no escaping.
    pub async fn send(&mut self, line: &str) -> ClientResult<()> {
        if line.starts_with("PASS ") {
            trace!(">>> PASS ***");
        } else {
            trace!(">>> {}", line);
        }
        let transport = self.require_transport()?;
        let mut wire = String::with_capacity(line.len() + 1);
        wire.push_str(line);
        wire.push('\n');
        transport
            .write_all(wire.as_bytes())
            .await
            .map_err(ClientError::Connection)
    }

    /// Block until one complete reply is framed.
    ///
    /// Reads chunk-by-chunk, feeding the assembler; a transport failure
    /// or unexpected close propagates immediately. Bounded by the read
    /// deadline.
    pub async fn receive(&mut self) -> ClientResult<Response> {
        let limit = self.options.read_timeout;
        let transport = self.require_transport()?;
        let framed = async {
            let mut assembler = ResponseAssembler::new();
            let mut chunk = [0u8; READ_CHUNK];
            loop {
                let n = transport
                    .read_chunk(&mut chunk)
                    .await
                    .map_err(ClientError::Connection)?;
                if n == 0 {
                    return Err(ClientError::ConnectionClosed(
                        "server closed the connection mid-reply".to_string(),
                    ));
                }
                if assembler.push(&chunk[..n]) {
                    return Ok(assembler.into_response());
                }
            }
        };
        let response = timeout(limit, framed)
            .await
            .map_err(|_| ClientError::Timeout {
                operation: "receive",
                limit,
            })??;
        trace!("<<< {}", response.text().trim_end());
        Ok(response)
    }

    /// Change the server-side working directory.
    pub async fn change_directory(&mut self, path: &str) -> ClientResult<()> {
        self.require_authenticated("change_directory")?;
        let command = format!("CWD {}", path);
        self.expect_code(Some(&command), 250, "cwd").await?;
        debug!("working directory on {} is now {}", self.site, path);
        Ok(())
    }

    /// Send QUIT, discard whatever comes back, release the transport.
    pub async fn close(&mut self) {
        if self.transport.is_some() {
            let _ = self.send("QUIT").await;
            let _ = self.receive().await;
        }
        self.transport = None;
        if self.state != SessionState::Closed {
            self.advance(SessionState::Closed);
        }
        info!("closed control channel to {}", self.site);
    }

    // The lifecycle never moves backward.
    fn advance(&mut self, next: SessionState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal session transition {} -> {}",
            self.state,
            next
        );
        self.state = next;
    }

    /// Send `command` (when given) and require `expected` on the reply.
    pub(crate) async fn expect_code(
        &mut self,
        command: Option<&str>,
        expected: u16,
        step: &'static str,
    ) -> ClientResult<Response> {
        if let Some(cmd) = command {
            self.send(cmd).await?;
        }
        let response = self.receive().await?;
        let actual = response.code()?;
        if actual != expected {
            return Err(ClientError::Protocol {
                step,
                expected,
                actual,
            });
        }
        Ok(response)
    }

    pub(crate) fn require_authenticated(&self, operation: &str) -> ClientResult<()> {
        if self.state != SessionState::Authenticated {
            return Err(ClientError::InvalidState(format!(
                "{} requires an authenticated session, state is {}",
                operation, self.state
            )));
        }
        Ok(())
    }

    // AUTH TLS must be acknowledged with 234 before the handshake; on
    // success the owned transport value is replaced wholesale with the
    // wrapped stream. A handshake failure consumes the connection.
    async fn upgrade_to_tls(&mut self) -> ClientResult<()> {
        self.expect_code(Some("AUTH TLS"), 234, "auth-tls").await?;
        let transport = self.require_transport_owned()?;
        let upgraded = tls::upgrade(
            transport,
            &self.site.hostname,
            self.options.accept_invalid_certs,
            self.options.tls_timeout,
        )
        .await?;
        self.transport = Some(upgraded);
        info!("control connection to {} upgraded to TLS", self.site);
        Ok(())
    }

    fn require_transport(&mut self) -> ClientResult<&mut Transport> {
        self.transport
            .as_mut()
            .ok_or_else(|| ClientError::InvalidState("channel has no open connection".to_string()))
    }

    fn require_transport_owned(&mut self) -> ClientResult<Transport> {
        self.transport
            .take()
            .ok_or_else(|| ClientError::InvalidState("channel has no open connection".to_string()))
    }
}
