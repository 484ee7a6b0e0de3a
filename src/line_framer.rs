//! Turns an arbitrary byte stream into newline-terminated text lines.
//!
//! Partial input is buffered across `feed` calls. Empty lines are dropped.
//! The buffer is bounded: a line that grows past the limit is thrown away and
//! the framer resyncs on the next `\n`.

use crate::types::MAX_LINE_LEN;
use log::warn;

pub struct LineFramer {
    buf: Vec<u8>,
    max_line_len: usize,
    /// Set after an overflow; bytes up to the next terminator are garbage.
    resyncing: bool,
    overflow_count: u64,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::with_max_line_len(MAX_LINE_LEN)
    }

    pub fn with_max_line_len(max_line_len: usize) -> Self {
        Self {
            buf: Vec::with_capacity(max_line_len.min(4096)),
            max_line_len: max_line_len.max(1),
            resyncing: false,
            overflow_count: 0,
        }
    }

    /// Append `bytes` and return the complete lines now available.
    ///
    /// The iterator is lazy: lines it does not yield stay buffered and come
    /// out of the next `feed`.
    pub fn feed(&mut self, bytes: &[u8]) -> Lines<'_> {
        self.buf.extend_from_slice(bytes);
        Lines { framer: self }
    }

    /// Bytes held back waiting for a terminator.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Number of lines discarded for exceeding the length limit.
    pub fn overflow_count(&self) -> u64 {
        self.overflow_count
    }

    fn next_line(&mut self) -> Option<String> {
        loop {
            let Some(pos) = self.buf.iter().position(|&b| b == b'\n') else {
                // A trailing '\r' may be the first half of a CRLF terminator.
                let slack = usize::from(self.buf.last() == Some(&b'\r'));
                if self.buf.len() > self.max_line_len + slack {
                    self.overflow(self.buf.len());
                    self.buf.clear();
                }
                return None;
            };

            let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
            line.pop();

            if self.resyncing {
                self.resyncing = false;
                continue;
            }
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            if line.is_empty() {
                continue;
            }
            if line.len() > self.max_line_len {
                self.overflow(line.len());
                self.resyncing = false;
                continue;
            }
            return Some(String::from_utf8_lossy(&line).into_owned());
        }
    }

    fn overflow(&mut self, len: usize) {
        if !self.resyncing {
            self.overflow_count += 1;
            warn!(
                "Line exceeds {} bytes ({} buffered), dropping until next newline",
                self.max_line_len, len
            );
        }
        self.resyncing = true;
    }
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new()
    }
}

/// Complete lines extracted by one `feed` call.
pub struct Lines<'a> {
    framer: &'a mut LineFramer,
}

impl Iterator for Lines<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        self.framer.next_line()
    }
}
