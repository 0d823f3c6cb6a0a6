//! Address-pair conflict files
//!
//! Two files share this format, one pair per line:
//!
//! ```text
//! addr1Hex addr2Hex [priority]
//! ```
//!
//! - interferences written by `falseshare detect` (no priority column)
//! - candidate conflicts predicted by static analysis, with a declared weight

use crate::error::{parse_hex, PairParseError};
use crate::ledger::ConflictKey;
use crate::trace::for_each_text_line;
use anyhow::{Context, Result};
use serde::Serialize;
use std::io::{BufRead, Write};
use std::str::FromStr;

/// Two addresses reported as conflicting, with an optional declared weight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConflictPair {
    pub first: u64,
    pub second: u64,
    pub priority: Option<u64>,
}

impl ConflictPair {
    pub fn new(first: u64, second: u64) -> Self {
        Self {
            first,
            second,
            priority: None,
        }
    }

    pub fn with_priority(mut self, priority: u64) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn key(&self) -> ConflictKey {
        ConflictKey::new(self.first, self.second)
    }
}

impl From<ConflictKey> for ConflictPair {
    fn from(key: ConflictKey) -> Self {
        Self::new(key.low(), key.high())
    }
}

impl FromStr for ConflictPair {
    type Err = PairParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut fields = line.split_whitespace();
        let (Some(first), Some(second)) = (fields.next(), fields.next()) else {
            return Err(PairParseError::MissingFields {
                found: line.split_whitespace().count(),
            });
        };

        let first =
            parse_hex(first).ok_or_else(|| PairParseError::InvalidAddress(first.to_string()))?;
        let second =
            parse_hex(second).ok_or_else(|| PairParseError::InvalidAddress(second.to_string()))?;
        let priority = fields
            .next()
            .map(|p| {
                p.parse::<u64>()
                    .map_err(|_| PairParseError::InvalidPriority(p.to_string()))
            })
            .transpose()?;

        Ok(Self {
            first,
            second,
            priority,
        })
    }
}

/// Counters from reading a pair file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PairStats {
    pub lines: u64,
    pub pairs: u64,
    pub skipped_lines: u64,
}

/// Stream every well-formed pair in `reader` into `sink`
///
/// Malformed lines are logged with their 1-based line number and skipped.
pub fn for_each_pair<R, F>(reader: R, mut sink: F) -> Result<PairStats>
where
    R: BufRead,
    F: FnMut(ConflictPair),
{
    let mut stats = PairStats::default();

    let lines = for_each_text_line(reader, |line_number, line| {
        match line.parse::<ConflictPair>() {
            Ok(pair) => {
                stats.pairs += 1;
                sink(pair);
            }
            Err(e) => {
                stats.skipped_lines += 1;
                tracing::warn!("Conflict line #{} skipped: {}", line_number, e);
            }
        }
    })
    .context("Failed to read conflict pairs")?;
    stats.lines = lines;

    Ok(stats)
}

/// Write raw conflicts as an interferences file
pub fn write_interferences<W: Write>(out: &mut W, conflicts: &[ConflictKey]) -> Result<()> {
    for key in conflicts {
        writeln!(out, "{}", key).context("Failed to write interferences")?;
    }
    out.flush().context("Failed to write interferences")?;
    Ok(())
}
