//! Splits the inbound byte stream into protocol lines.
//!
//! A line ends at `\n` (an optional preceding `\r` is dropped), but only while
//! an even number of CTCP escape markers (`\x01`) has been seen since the
//! start of the line. A terminator between an opening and a closing marker
//! belongs to the escaped payload.

use tracing::warn;

/// Maximum length of one protocol line, terminator included.
pub const MAX_LINE: usize = 512;

/// In-band delimiter bracketing CTCP payloads.
pub const ESCAPE_MARKER: u8 = 0x01;

/// Where a complete line sits inside the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Boundary {
    /// End of the line content, terminator excluded.
    pub line_end: usize,
    /// Start of the next line.
    pub next_start: usize,
}

/// Scan `buf` once for the first terminator outside escaped payload.
pub fn find_boundary(buf: &[u8]) -> Option<Boundary> {
    let mut escaped = false;
    for (i, &b) in buf.iter().enumerate() {
        match b {
            ESCAPE_MARKER => escaped = !escaped,
            b'\n' if !escaped => {
                let line_end = if i > 0 && buf[i - 1] == b'\r' { i - 1 } else { i };
                return Some(Boundary {
                    line_end,
                    next_start: i + 1,
                });
            }
            _ => {}
        }
    }
    None
}

/// Incremental line splitter over a fixed-size accumulation buffer.
///
/// When the buffer fills up without a boundary the buffered bytes are
/// dropped and the reader skips ahead to the next `\n`, so the tail of an
/// oversized line is never parsed as a line of its own.
pub struct FrameReader {
    buf: Box<[u8]>,
    len: usize,
    skipping: bool,
}

impl FrameReader {
    pub fn new() -> Self {
        Self::with_capacity(MAX_LINE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: vec![0u8; capacity].into_boxed_slice(),
            len: 0,
            skipping: false,
        }
    }

    /// Free space the next receive may fill.
    pub fn spare_mut(&mut self) -> &mut [u8] {
        &mut self.buf[self.len..]
    }

    /// Mark `n` bytes written into [`spare_mut`](Self::spare_mut) as received.
    pub fn commit(&mut self, n: usize) {
        self.len = (self.len + n).min(self.buf.len());
    }

    /// Copy `bytes` in, as far as they fit. Returns how many were taken.
    #[cfg(test)]
    pub fn extend(&mut self, bytes: &[u8]) -> usize {
        let spare = self.spare_mut();
        let n = bytes.len().min(spare.len());
        spare[..n].copy_from_slice(&bytes[..n]);
        self.commit(n);
        n
    }

    #[cfg(test)]
    pub fn buffered(&self) -> usize {
        self.len
    }

    /// Pop the next complete line, without its terminator.
    ///
    /// Returns `None` when more bytes are needed. Empty lines are skipped.
    pub fn next_frame(&mut self) -> Option<Vec<u8>> {
        loop {
            if self.skipping {
                match self.buf[..self.len].iter().position(|&b| b == b'\n') {
                    Some(i) => {
                        self.consume(i + 1);
                        self.skipping = false;
                    }
                    None => {
                        self.len = 0;
                        return None;
                    }
                }
            }

            if let Some(boundary) = find_boundary(&self.buf[..self.len]) {
                let line = self.buf[..boundary.line_end].to_vec();
                self.consume(boundary.next_start);
                if line.is_empty() {
                    continue;
                }
                return Some(line);
            }

            if self.len == self.buf.len() {
                warn!(bytes = self.len, "line exceeds maximum length, discarding");
                self.len = 0;
                self.skipping = true;
            }
            return None;
        }
    }

    fn consume(&mut self, n: usize) {
        self.buf.copy_within(n..self.len, 0);
        self.len -= n;
    }
}

impl Default for FrameReader {
    fn default() -> Self {
        Self::new()
    }
}
