//! Conflict report output
//!
//! The text format is what the layout mitigation pass reads, one conflict
//! per line:
//!
//! ```text
//! name1 offset1 size1 name2 offset2 size2 priority
//! ```
//!
//! JSON is offered for humans and scripts and is never consumed by the pass.

use crate::aggregate::{AggregateStats, ConflictRecord};
use crate::pipeline::TraceStats;
use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Write;

/// Format one record as a report line (without the newline)
pub fn format_record(record: &ConflictRecord) -> String {
    format!(
        "{} {} {} {} {} {} {}",
        record.first.name,
        record.first.offset,
        record.first.size,
        record.second.name,
        record.second.offset,
        record.second.size,
        record.priority
    )
}

/// Write records in the text format, in the order given
pub fn write_text<'r, W, I>(out: &mut W, records: I) -> Result<()>
where
    W: Write,
    I: IntoIterator<Item = &'r ConflictRecord>,
{
    for record in records {
        writeln!(out, "{}", format_record(record)).context("Failed to write report")?;
    }
    out.flush().context("Failed to write report")?;
    Ok(())
}

/// JSON report document
#[derive(Debug, Serialize)]
pub struct JsonReport<'r> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_line_size: Option<u64>,
    pub conflicts: Vec<&'r ConflictRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<TraceStats>,
    pub aggregate: AggregateStats,
}

/// Write the JSON report, pretty-printed
pub fn write_json<W: Write>(out: &mut W, report: &JsonReport<'_>) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, report).context("Failed to serialize report")?;
    writeln!(out).context("Failed to write report")?;
    out.flush().context("Failed to write report")?;
    Ok(())
}

/// Highest-priority records first, ties kept in insertion order
///
/// `limit` of `None` keeps every record.
pub fn ranked(records: &[ConflictRecord], limit: Option<usize>) -> Vec<&ConflictRecord> {
    let mut view: Vec<&ConflictRecord> = records.iter().collect();
    view.sort_by(|a, b| b.priority.cmp(&a.priority));
    if let Some(limit) = limit {
        view.truncate(limit);
    }
    view
}
