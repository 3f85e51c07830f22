//! Listing-line parsing
//!
//! Turns `stat -l` output lines into directory entries. Tolerant by
//! design: malformed lines are skipped, a bad size becomes 0, and only
//! the overall reply framing can fail the listing.

use log::debug;
use serde::Serialize;

/// One parsed listing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryEntry {
    pub permission: String,
    pub owner: String,
    pub group: String,
    pub size: u64,
    pub date: String,
    pub name: String,
}

/// Parse the CR-stripped lines of a 213 listing reply.
///
/// The first two lines are the server's header framing; fewer than three
/// lines total means an empty directory. A line opening with a digit is
/// the trailing status line, not an entry. Lines with fewer than nine
/// whitespace fields are skipped rather than failing the whole listing.
pub fn parse_listing(lines: &[String]) -> Vec<DirectoryEntry> {
    let mut entries = Vec::new();
    if lines.len() < 3 {
        return entries;
    }
    for line in &lines[2..] {
        if line.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            continue;
        }
        match parse_entry(line) {
            Some(entry) => entries.push(entry),
            None => debug!("skipping unparseable listing line: {:?}", line),
        }
    }
    entries
}

/// Parse one `ls -l`-shaped line.
///
/// Field layout: permission, link count, owner, group, size, then three
/// date fields. The name is everything after the eighth field, so names
/// containing spaces survive intact.
fn parse_entry(line: &str) -> Option<DirectoryEntry> {
    let (fields, name) = leading_fields(line)?;
    let size = fields[4].parse::<u64>().unwrap_or(0);
    Some(DirectoryEntry {
        permission: fields[0].to_string(),
        owner: fields[2].to_string(),
        group: fields[3].to_string(),
        size,
        date: format!("{} {} {}", fields[5], fields[6], fields[7]),
        name: name.to_string(),
    })
}

// Split off the first eight whitespace-delimited fields; the remainder
// of the line (trimmed) is returned whole. None when the line has fewer
// than nine fields.
fn leading_fields(line: &str) -> Option<([&str; 8], &str)> {
    let mut fields = [""; 8];
    let mut rest = line.trim_start();
    for slot in fields.iter_mut() {
        let end = rest.find(char::is_whitespace)?;
        *slot = &rest[..end];
        rest = rest[end..].trim_start();
    }
    let name = rest.trim_end();
    if name.is_empty() {
        return None;
    }
    Some((fields, name))
}
