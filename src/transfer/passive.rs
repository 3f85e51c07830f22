//! Passive-mode negotiation
//!
//! Requests a data-connection rendezvous from the server and caches the
//! opaque token on the channel for relay to the opposite session.

use log::debug;

use crate::client::ControlChannel;
use crate::error::{ClientError, ClientResult};

/// Enter passive mode on `channel`.
///
/// Sends CPSV when `secure` (the server must protect the data channel)
/// and PASV otherwise; requires 227. The token is whatever sits between
/// the first '(' and the last ')' of the reply — deliberately not a
/// matched-pair scan, because servers embed prose (and sometimes extra
/// parentheses) around the address tuple. The token's internal host/port
/// encoding is never interpreted here.
pub async fn enter_passive(channel: &mut ControlChannel, secure: bool) -> ClientResult<String> {
    channel.require_authenticated("enter_passive")?;
    let command = if secure { "CPSV" } else { "PASV" };
    let response = channel
        .expect_code(Some(command), 227, "passive-mode")
        .await?;
    let text = response.text();
    let token = extract_token(&text).ok_or_else(|| {
        ClientError::Parse(format!(
            "no rendezvous token in passive reply: {:?}",
            text.trim_end()
        ))
    })?;
    debug!("{}: passive token {}", channel.site(), token);
    channel.set_passive_token(token.to_string());
    Ok(token.to_string())
}

/// Substring between the first '(' and the last ')'.
fn extract_token(text: &str) -> Option<&str> {
    let start = text.find('(')? + 1;
    let end = text.rfind(')')?;
    if end < start {
        return None;
    }
    Some(&text[start..end])
}
