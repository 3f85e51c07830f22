//! Reply framing
//!
//! Accumulates raw bytes from the control connection into one logical
//! reply. A reply ends at the first line whose first three characters
//! are ASCII digits and whose fourth character is not '-'; a '-' in that
//! position marks a continuation line of a multi-line reply.

use crate::error::{ClientError, ClientResult};

/// One logical server reply, possibly multi-line.
///
/// Holds the raw bytes exactly as received. The status code comes from
/// the first line; [`Response::lines`] yields CR-stripped lines for
/// consumers.
#[derive(Debug, Clone)]
pub struct Response {
    raw: Vec<u8>,
}

impl Response {
    /// The 3-digit status code of the reply.
    ///
    /// Defined only when at least 3 bytes were received; anything shorter
    /// (or a non-digit prefix) is a parse error.
    pub fn code(&self) -> ClientResult<u16> {
        if self.raw.len() < 3 {
            return Err(ClientError::Parse(format!(
                "reply too short to contain a status code ({} bytes)",
                self.raw.len()
            )));
        }
        let mut code = 0u16;
        for &b in &self.raw[..3] {
            if !b.is_ascii_digit() {
                return Err(ClientError::Parse(format!(
                    "reply does not start with a 3-digit code: {:?}",
                    String::from_utf8_lossy(&self.raw[..3])
                )));
            }
            code = code * 10 + u16::from(b - b'0');
        }
        Ok(code)
    }

    /// CR-stripped lines of the reply, split on newline.
    ///
    /// Only newline-terminated segments are returned; a trailing partial
    /// line is dropped. This is independent of the raw-buffer scan used
    /// for end-of-reply detection, which sees unstripped bytes.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        let mut current = String::new();
        for &b in &self.raw {
            match b {
                b'\n' => lines.push(std::mem::take(&mut current)),
                b'\r' => {}
                other => current.push(char::from(other)),
            }
        }
        lines
    }

    /// The whole reply as text, lossily decoded.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.raw).into_owned()
    }
}

/// Incrementally frames raw chunks into one complete [`Response`].
///
/// Feed each chunk read from the transport to [`ResponseAssembler::push`];
/// once it returns true the accumulated buffer is the reply. The
/// logical-line offset survives chunk boundaries, so a line may begin in
/// one read and finish in a later one.
#[derive(Debug, Default)]
pub struct ResponseAssembler {
    buf: Vec<u8>,
    line_start: usize,
    scan_pos: usize,
    complete: bool,
}

impl ResponseAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one chunk and scan for the end-of-reply line.
    ///
    /// Returns true once the reply is complete. The entire chunk is
    /// retained either way; reads are chunk-granular, not line-granular.
    pub fn push(&mut self, chunk: &[u8]) -> bool {
        self.buf.extend_from_slice(chunk);
        while self.scan_pos < self.buf.len() {
            if self.buf[self.scan_pos] == b'\n' {
                if self.is_final_line(self.line_start, self.scan_pos) {
                    self.complete = true;
                }
                self.line_start = self.scan_pos + 1;
            }
            self.scan_pos += 1;
        }
        self.complete
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Take the accumulated buffer as one reply.
    pub fn into_response(self) -> Response {
        Response { raw: self.buf }
    }

    // End-of-reply rule: first three characters ASCII digits, fourth not
    // '-'. Lines shorter than three bytes cannot carry a code and are
    // continuations; for a bare "NNN\n" line the newline itself sits in
    // the fourth position and terminates the reply.
    fn is_final_line(&self, start: usize, newline: usize) -> bool {
        if newline < start + 3 {
            return false;
        }
        self.buf[start].is_ascii_digit()
            && self.buf[start + 1].is_ascii_digit()
            && self.buf[start + 2].is_ascii_digit()
            && self.buf[start + 3] != b'-'
    }
}
