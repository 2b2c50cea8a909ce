//! Line-buffered input with one line of pushback
//!
//! Dump streams are line-framed everywhere except property values and
//! node content, which are length-prefixed and may hold arbitrary bytes.
//! `LineSource` serves both: lines (terminator included) for headers and
//! exact raw reads for payloads.

use crate::error::{CutterError, Result};
use std::io::{BufRead, ErrorKind, Seek, SeekFrom};
use tracing::trace;

/// Byte-oriented reader with a single-line lookahead buffer.
pub struct LineSource<R> {
    reader: R,
    pushback: Option<Vec<u8>>,
    line_number: u64,
}

impl<R: BufRead> LineSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            pushback: None,
            line_number: 0,
        }
    }

    /// Number of lines pulled from the underlying reader so far.
    pub fn line_number(&self) -> u64 {
        self.line_number
    }

    /// Next line including its terminator. Empty at end of input.
    pub fn read_line(&mut self) -> Result<Vec<u8>> {
        if let Some(line) = self.pushback.take() {
            trace!(line = self.line_number, "popping pushed-back line");
            return Ok(line);
        }
        self.next_line()
    }

    fn next_line(&mut self) -> Result<Vec<u8>> {
        let mut line = Vec::new();
        if self.reader.read_until(b'\n', &mut line)? > 0 {
            self.line_number += 1;
        }
        Ok(line)
    }

    /// Look at the next line without consuming it.
    pub fn peek(&mut self) -> Result<&[u8]> {
        if self.pushback.is_none() {
            let line = self.next_line()?;
            if !line.is_empty() {
                self.pushback = Some(line);
            }
        }
        Ok(self.pushback.as_deref().unwrap_or(&[]))
    }

    /// Return a line to the buffer. The buffer must be empty.
    pub fn push(&mut self, line: Vec<u8>) -> Result<()> {
        if self.pushback.is_some() {
            return Err(CutterError::grammar(
                self.line_number,
                "line buffer unexpectedly nonempty on push",
            ));
        }
        if !line.is_empty() {
            self.pushback = Some(line);
        }
        Ok(())
    }

    /// Take the buffered line, leaving the buffer empty.
    pub fn flush(&mut self) -> Vec<u8> {
        self.pushback.take().unwrap_or_default()
    }

    pub fn has_buffered(&self) -> bool {
        self.pushback.is_some()
    }

    /// The buffered line, if any, without taking it.
    pub fn buffered(&self) -> Option<&[u8]> {
        self.pushback.as_deref()
    }

    /// Read a line that must start with `prefix`.
    pub fn require(&mut self, prefix: &str) -> Result<Vec<u8>> {
        let line = self.read_line()?;
        if !line.starts_with(prefix.as_bytes()) {
            return Err(CutterError::MissingPrefix {
                prefix: prefix.escape_debug().to_string(),
                line: self.line_number,
            });
        }
        Ok(line)
    }

    /// Read exactly `len` raw bytes, ignoring line framing.
    pub fn read_exact(&mut self, len: usize) -> Result<Vec<u8>> {
        if self.pushback.is_some() {
            return Err(CutterError::grammar(
                self.line_number,
                "line buffer unexpectedly nonempty before raw read",
            ));
        }
        let mut buf = vec![0u8; len];
        self.reader.read_exact(&mut buf).map_err(|e| {
            if e.kind() == ErrorKind::UnexpectedEof {
                CutterError::UnexpectedEof {
                    line: self.line_number,
                    context: "length-prefixed content",
                }
            } else {
                CutterError::Io(e)
            }
        })?;
        self.line_number += buf.iter().filter(|&&b| b == b'\n').count() as u64;
        Ok(buf)
    }
}

impl<R: BufRead + Seek> LineSource<R> {
    /// Fail unless the underlying handle can actually seek (pipes cannot).
    pub fn ensure_seekable(&mut self, operation: &'static str) -> Result<()> {
        self.reader
            .stream_position()
            .map(|_| ())
            .map_err(|_| CutterError::NotSeekable(operation))
    }

    /// Go back to the start of the input.
    pub fn rewind(&mut self) -> Result<()> {
        self.reader.seek(SeekFrom::Start(0))?;
        self.pushback = None;
        self.line_number = 0;
        Ok(())
    }
}
