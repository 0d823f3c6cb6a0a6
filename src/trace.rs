//! Memory access trace parsing
//!
//! The instrumentation tool writes one access per line:
//!
//! ```text
//! # Memory Access Trace
//! 0x401136 W 7ffd5c2e1a40 8 1 0x0
//! 0x40113d R 7ffd5c2e1a48 4 2 0x2a
//! #eof
//! ```
//!
//! Fields are `programCounter readOrWrite destAddrHex accessSize threadId valueHex`.
//! Lines starting with `#` are comments.

use crate::error::{parse_hex, TraceParseError};
use std::io::{self, BufRead};
use std::str::FromStr;

/// Direction of a memory access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessKind {
    Read,
    Write,
}

impl AccessKind {
    pub fn is_write(self) -> bool {
        self == AccessKind::Write
    }
}

impl FromStr for AccessKind {
    type Err = TraceParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "R" | "r" => Ok(AccessKind::Read),
            "W" | "w" => Ok(AccessKind::Write),
            other => Err(TraceParseError::InvalidAccessKind(other.to_string())),
        }
    }
}

/// One observed memory access, borrowing its opaque fields from the line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceRecord<'a> {
    /// Instruction address as logged; never interpreted
    pub program_counter: &'a str,
    pub kind: AccessKind,
    pub address: u64,
    /// Bytes accessed
    pub size: u64,
    pub thread_id: u64,
    /// Value as logged; never interpreted
    pub value: &'a str,
}

impl<'a> TraceRecord<'a> {
    /// Parse a non-comment trace line. Fields past the sixth are ignored.
    pub fn parse(line: &'a str) -> Result<Self, TraceParseError> {
        let mut fields = line.split_whitespace();
        let mut next = |found: usize| {
            fields
                .next()
                .ok_or(TraceParseError::MissingFields { found })
        };
        let pc = next(0)?;
        let rw = next(1)?;
        let addr = next(2)?;
        let size = next(3)?;
        let tid = next(4)?;
        let value = next(5)?;

        let kind = rw.parse::<AccessKind>()?;
        let address = parse_hex(addr).ok_or_else(|| TraceParseError::InvalidHex {
            field: "address",
            value: addr.to_string(),
        })?;
        let size = size
            .parse::<u64>()
            .map_err(|_| TraceParseError::InvalidDecimal {
                field: "access size",
                value: size.to_string(),
            })?;
        let thread_id = tid
            .parse::<u64>()
            .map_err(|_| TraceParseError::InvalidDecimal {
                field: "thread id",
                value: tid.to_string(),
            })?;

        Ok(Self {
            program_counter: pc,
            kind,
            address,
            size,
            thread_id,
            value,
        })
    }

    pub fn is_write(&self) -> bool {
        self.kind.is_write()
    }
}

/// A data line from the trace, with its 1-based line number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceLine<'a> {
    pub line_number: u64,
    pub parsed: Result<TraceRecord<'a>, TraceParseError>,
}

fn is_skippable(line: &[u8]) -> bool {
    let line = line.trim_ascii();
    line.is_empty() || line.first() == Some(&b'#')
}

/// Streams data lines out of a trace, skipping comments and blank lines
///
/// Lines are read as raw bytes. Invalid UTF-8 is replaced rather than
/// rejected, so a stray byte in an opaque field never costs the record.
/// I/O errors end the stream; parse errors are handed to the caller per line.
pub struct TraceReader<R> {
    inner: R,
    buf: Vec<u8>,
    decoded: String,
    line_number: u64,
    comments: u64,
}

impl<R: BufRead> TraceReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: Vec::new(),
            decoded: String::new(),
            line_number: 0,
            comments: 0,
        }
    }

    /// Lines consumed so far, including comments
    pub fn lines_read(&self) -> u64 {
        self.line_number
    }

    /// Comment and blank lines skipped so far
    pub fn comments(&self) -> u64 {
        self.comments
    }

    /// Next data line, borrowing from the reader's line buffer
    pub fn next_line(&mut self) -> Option<io::Result<TraceLine<'_>>> {
        loop {
            self.buf.clear();
            match self.inner.read_until(b'\n', &mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => return Some(Err(e)),
            }
            self.line_number += 1;

            if !is_skippable(&self.buf) {
                break;
            }
            self.comments += 1;
        }

        let text = match std::str::from_utf8(&self.buf) {
            Ok(text) => text,
            Err(_) => {
                tracing::debug!("Line #{} is not valid UTF-8", self.line_number);
                self.decoded = String::from_utf8_lossy(&self.buf).into_owned();
                &self.decoded
            }
        };

        Some(Ok(TraceLine {
            line_number: self.line_number,
            parsed: TraceRecord::parse(text.trim()),
        }))
    }
}

/// Feed every non-blank, non-comment line of `reader` to `sink` with its
/// 1-based line number, decoding invalid UTF-8 lossily
///
/// Returns the number of lines read.
pub(crate) fn for_each_text_line<R, F>(mut reader: R, mut sink: F) -> io::Result<u64>
where
    R: BufRead,
    F: FnMut(u64, &str),
{
    let mut buf = Vec::new();
    let mut line_number = 0;

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(line_number);
        }
        line_number += 1;

        if is_skippable(&buf) {
            continue;
        }
        sink(line_number, String::from_utf8_lossy(&buf).trim());
    }
}
