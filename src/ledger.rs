//! Cache line ledger and false-sharing detection
//!
//! The ledger replays accesses in trace order and remembers, per cache line,
//! which bytes each thread has touched. A new access conflicts with a prior
//! access from another thread when both land on the same line, their byte
//! ranges are disjoint, and at least one of them is a write.
//!
//! Overlapping ranges are true sharing and are not reported. Two reads never
//! invalidate each other's copy of the line, so read/read pairs are skipped.

use crate::trace::TraceRecord;
use fnv::FnvHashMap;
use std::collections::BTreeMap;
use std::fmt;

/// Unordered pair of addresses: `{a, b}` and `{b, a}` are the same key
///
/// The pair is stored low address first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConflictKey {
    low: u64,
    high: u64,
}

impl ConflictKey {
    pub fn new(a: u64, b: u64) -> Self {
        Self {
            low: a.min(b),
            high: a.max(b),
        }
    }

    pub fn low(&self) -> u64 {
        self.low
    }

    pub fn high(&self) -> u64 {
        self.high
    }
}

impl fmt::Display for ConflictKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}\t{:x}", self.low, self.high)
    }
}

/// Merged footprint of one thread at one address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LineAccess {
    is_write: bool,
    /// Largest access size seen at this address
    size: u64,
}

/// thread id -> address -> footprint
#[derive(Debug, Default)]
struct CacheLine {
    threads: BTreeMap<u64, BTreeMap<u64, LineAccess>>,
}

/// True if `[a, a + a_size)` and `[b, b + b_size)` share a byte
fn ranges_overlap(a: u64, a_size: u64, b: u64, b_size: u64) -> bool {
    (b >= a && b < a.saturating_add(a_size)) || (a >= b && a < b.saturating_add(b_size))
}

/// Per-trace detector state
///
/// Construct one per trace; state only grows for the lifetime of the pass.
#[derive(Debug)]
pub struct CacheLineLedger {
    cache_line_size: u64,
    lines: FnvHashMap<u64, CacheLine>,
}

impl CacheLineLedger {
    /// `cache_line_size` must be non-zero; see `AnalysisConfig::validate`
    pub fn new(cache_line_size: u64) -> Self {
        debug_assert!(cache_line_size > 0);
        Self {
            cache_line_size,
            lines: FnvHashMap::default(),
        }
    }

    pub fn cache_line_size(&self) -> u64 {
        self.cache_line_size
    }

    /// Number of distinct cache lines touched so far
    pub fn cache_lines(&self) -> usize {
        self.lines.len()
    }

    /// Fold a parsed trace record into the ledger
    pub fn record(&mut self, record: &TraceRecord<'_>) -> Vec<ConflictKey> {
        self.record_access(
            record.is_write(),
            record.address,
            record.size,
            record.thread_id,
        )
    }

    /// Record one access and return the conflicts it creates
    ///
    /// Conflicts are compared against the merged footprint of other threads.
    /// The same pair may be returned by many calls; deduplication happens
    /// during aggregation.
    pub fn record_access(
        &mut self,
        is_write: bool,
        address: u64,
        size: u64,
        thread_id: u64,
    ) -> Vec<ConflictKey> {
        let line = self
            .lines
            .entry(address / self.cache_line_size)
            .or_default();

        let mut conflicts = Vec::new();
        for (_, accesses) in line.threads.iter().filter(|(tid, _)| **tid != thread_id) {
            for (&other_address, other) in accesses {
                if ranges_overlap(address, size, other_address, other.size) {
                    continue;
                }
                if !is_write && !other.is_write {
                    continue;
                }
                conflicts.push(ConflictKey::new(other_address, address));
            }
        }

        line.threads
            .entry(thread_id)
            .or_default()
            .entry(address)
            .and_modify(|access| {
                access.is_write |= is_write;
                access.size = access.size.max(size);
            })
            .or_insert(LineAccess { is_write, size });

        if !conflicts.is_empty() {
            tracing::trace!(
                "thread {} {:#x}+{}: {} conflicts",
                thread_id,
                address,
                size,
                conflicts.len()
            );
        }

        conflicts
    }
}
