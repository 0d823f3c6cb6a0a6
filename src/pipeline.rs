//! Analysis passes
//!
//! - detect: trace -> raw address conflicts
//! - map: realized + potential address conflicts -> named conflict table
//! - analyze: both, without an intermediate file
//!
//! Each pass owns its ledger and aggregator; nothing is shared between runs.

use crate::aggregate::{AggregateStats, ConflictAggregator, ConflictRecord};
use crate::candidates::{self, ConflictPair, PairStats};
use crate::config::AnalysisConfig;
use crate::ledger::{CacheLineLedger, ConflictKey};
use crate::symbols::SymbolTable;
use crate::trace::TraceReader;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Counters from one detection pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TraceStats {
    pub lines: u64,
    pub comments: u64,
    pub records: u64,
    pub malformed_lines: u64,
    pub raw_conflicts: u64,
    pub cache_lines: u64,
}

/// Where global variable addresses come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolSource {
    /// Text table of `name addrHex size` lines
    Table(PathBuf),
    /// Data symbols of a non-PIE ELF binary
    Binary(PathBuf),
}

impl SymbolSource {
    pub fn load(&self) -> Result<SymbolTable> {
        let (table, stats) = match self {
            SymbolSource::Table(path) => SymbolTable::from_file(path)?,
            SymbolSource::Binary(path) => SymbolTable::from_elf(path)?,
        };
        tracing::info!(
            "Loaded {} global variables ({} lines skipped)",
            stats.loaded,
            stats.skipped_lines
        );
        Ok(table)
    }
}

/// Result of aggregating conflicts against a symbol table
#[derive(Debug)]
pub struct Analysis {
    pub records: Vec<ConflictRecord>,
    pub trace: Option<TraceStats>,
    pub aggregate: AggregateStats,
}

fn open(path: &Path, what: &str) -> Result<BufReader<File>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open {}: {}", what, path.display()))?;
    Ok(BufReader::new(file))
}

/// Replay a trace through a fresh ledger, handing every raw conflict to `sink`
///
/// Malformed lines are logged and skipped, undecodable bytes included. Only
/// an I/O error ends the pass with an error.
pub fn detect<R, F>(reader: R, config: &AnalysisConfig, mut sink: F) -> Result<TraceStats>
where
    R: BufRead,
    F: FnMut(ConflictKey),
{
    let mut ledger = CacheLineLedger::new(config.cache_line_size);
    let mut lines = TraceReader::new(reader);
    let mut stats = TraceStats::default();
    let mut next_progress = config.progress_interval;

    while let Some(line) = lines.next_line() {
        let line = line.context("Failed to read trace")?;

        match line.parsed {
            Ok(record) => {
                stats.records += 1;
                for key in ledger.record(&record) {
                    stats.raw_conflicts += 1;
                    sink(key);
                }
            }
            Err(e) => {
                stats.malformed_lines += 1;
                tracing::warn!("Line #{} formatted incorrectly: {}", line.line_number, e);
            }
        }

        if lines.lines_read() >= next_progress {
            tracing::info!("Processed {} lines", lines.lines_read());
            next_progress = lines.lines_read() + config.progress_interval;
        }
    }

    stats.lines = lines.lines_read();
    stats.comments = lines.comments();
    stats.cache_lines = ledger.cache_lines() as u64;

    tracing::info!(
        "Trace done: {} records, {} malformed lines, {} raw conflicts across {} cache lines",
        stats.records,
        stats.malformed_lines,
        stats.raw_conflicts,
        stats.cache_lines
    );

    Ok(stats)
}

/// Run detection over a trace file and collect the raw conflicts
pub fn detect_file(trace: &Path, config: &AnalysisConfig) -> Result<(Vec<ConflictKey>, TraceStats)> {
    tracing::info!(
        "Reading trace file: {}, with cache line size: {}",
        trace.display(),
        config.cache_line_size
    );
    let mut conflicts = Vec::new();
    let stats = detect(open(trace, "trace")?, config, |key| conflicts.push(key))?;
    Ok((conflicts, stats))
}

fn log_pairs(kind: &str, stats: &PairStats) {
    tracing::info!(
        "Read {} {} conflict pairs ({} lines skipped)",
        stats.pairs,
        kind,
        stats.skipped_lines
    );
}

/// Fold realized then potential pair files into a named conflict table
pub fn map_files(
    realized: &Path,
    potential: Option<&Path>,
    symbols: &SymbolTable,
) -> Result<Analysis> {
    let mut aggregator = ConflictAggregator::new(symbols);

    let stats = candidates::for_each_pair(open(realized, "realized conflicts")?, |pair| {
        aggregator.add_realized(pair)
    })
    .with_context(|| format!("Failed to read {}", realized.display()))?;
    log_pairs("realized", &stats);

    fold_potential(&mut aggregator, potential)?;

    Ok(finish(aggregator, None))
}

/// Detect conflicts in a trace and fold them, then any potential pairs
pub fn analyze<R: BufRead>(
    trace: R,
    potential: Option<&Path>,
    symbols: &SymbolTable,
    config: &AnalysisConfig,
) -> Result<Analysis> {
    let mut aggregator = ConflictAggregator::new(symbols);

    let trace_stats = detect(trace, config, |key| {
        aggregator.add_realized(ConflictPair::from(key))
    })?;

    fold_potential(&mut aggregator, potential)?;

    Ok(finish(aggregator, Some(trace_stats)))
}

/// `analyze` over a trace file
pub fn analyze_file(
    trace: &Path,
    potential: Option<&Path>,
    symbols: &SymbolTable,
    config: &AnalysisConfig,
) -> Result<Analysis> {
    tracing::info!(
        "Reading trace file: {}, with cache line size: {}",
        trace.display(),
        config.cache_line_size
    );
    analyze(open(trace, "trace")?, potential, symbols, config)
}

fn fold_potential(aggregator: &mut ConflictAggregator<'_>, potential: Option<&Path>) -> Result<()> {
    if let Some(path) = potential {
        let stats = candidates::for_each_pair(open(path, "potential conflicts")?, |pair| {
            aggregator.add_potential(pair)
        })
        .with_context(|| format!("Failed to read {}", path.display()))?;
        log_pairs("potential", &stats);
    }
    Ok(())
}

fn finish(aggregator: ConflictAggregator<'_>, trace: Option<TraceStats>) -> Analysis {
    let aggregate = aggregator.stats();
    tracing::info!(
        "Mapped {} named conflicts ({} unresolved pairs dropped)",
        aggregator.len(),
        aggregate.unresolved_pairs
    );

    Analysis {
        records: aggregator.into_records(),
        trace,
        aggregate,
    }
}
