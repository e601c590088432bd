//! Pattern buffer with tail-only prompt search.
//!
//! A shell prompt is always the last, unterminated line of the output, so only
//! that line (bounded by `search_depth` bytes) is handed to the matcher. For
//! commands with large outputs this keeps each check O(search_depth).

use std::fmt;

use bytes::BytesMut;

use super::patterns::PromptMatcher;

/// Buffer for accumulating output and searching its tail for a prompt.
///
/// Incoming bytes go through a streaming `vte` parser, so colour codes and
/// title-setting sequences around the prompt are dropped even when they are
/// split across reads.
pub struct PatternBuffer {
    /// The accumulated, escape-free output.
    buffer: BytesMut,

    /// How many bytes from the end to search for patterns.
    search_depth: usize,

    parser: vte::Parser,
}

impl PatternBuffer {
    /// Create a new pattern buffer with the specified search depth.
    pub fn new(search_depth: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
            search_depth,
            parser: vte::Parser::new(),
        }
    }

    /// Extend the buffer with new data, stripping ANSI escape sequences.
    pub fn extend(&mut self, data: &[u8]) {
        let mut sink = Printable(&mut self.buffer);
        self.parser.advance(&mut sink, data);
    }

    /// The last line of the buffer, limited to `search_depth` bytes.
    pub fn tail_line(&self) -> &[u8] {
        let start = self.buffer.len().saturating_sub(self.search_depth);
        let tail = &self.buffer[start..];
        match memchr::memrchr(b'\n', tail) {
            Some(pos) => &tail[pos + 1..],
            None => tail,
        }
    }

    /// Check whether the last line of the buffer is a prompt.
    pub fn tail_matches<M: PromptMatcher + ?Sized>(&self, matcher: &M) -> bool {
        matcher.is_match(self.tail_line())
    }

    /// Take ownership of the buffer contents and reset.
    pub fn take(&mut self) -> Vec<u8> {
        self.buffer.split().to_vec()
    }

    /// Get a reference to the buffer contents.
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Get the current buffer length.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clear the buffer and any half-parsed escape sequence.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.parser = vte::Parser::new();
    }
}

impl Default for PatternBuffer {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl fmt::Debug for PatternBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatternBuffer")
            .field("len", &self.buffer.len())
            .field("search_depth", &self.search_depth)
            .finish()
    }
}

/// `vte` performer that keeps printable text and line structure only.
struct Printable<'a>(&'a mut BytesMut);

impl vte::Perform for Printable<'_> {
    fn print(&mut self, c: char) {
        let mut utf8 = [0u8; 4];
        self.0.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
    }

    fn execute(&mut self, byte: u8) {
        if matches!(byte, b'\n' | b'\r' | b'\t') {
            self.0.extend_from_slice(&[byte]);
        }
    }
}
