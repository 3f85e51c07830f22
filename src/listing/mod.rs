//! Directory listing
//!
//! Issues `stat -l` on the control connection and parses the reply into
//! entries. The listing travels on the control channel itself, so no
//! data connection is involved.

pub mod parser;

pub use parser::{DirectoryEntry, parse_listing};

use log::info;

use crate::client::ControlChannel;
use crate::error::ClientResult;

/// List the current directory of an authenticated channel.
///
/// Requires a 213 reply; entry-level noise is tolerated per
/// [`parse_listing`].
pub async fn list(channel: &mut ControlChannel) -> ClientResult<Vec<DirectoryEntry>> {
    channel.require_authenticated("list")?;
    let response = channel.expect_code(Some("stat -l"), 213, "dirlist").await?;
    let entries = parse_listing(&response.lines());
    info!("{}: listed {} entries", channel.site(), entries.len());
    Ok(entries)
}
