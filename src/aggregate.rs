//! Conflict aggregation
//!
//! Symbolizes raw address pairs and folds them into one table of named
//! conflicts keyed by the unordered address pair. Observed (realized)
//! conflicts must be folded before predicted (potential) ones so that ties
//! favor pairs seen during execution.
//!
//! Priority starts at the pair's declared weight (1 when absent) and then
//! grows by 1 per repeated realized pair and by the declared weight per
//! repeated potential pair. It never decreases.

use crate::candidates::ConflictPair;
use crate::ledger::ConflictKey;
use crate::symbols::{NamedAccess, SymbolTable};
use indexmap::map::Entry;
use indexmap::IndexMap;
use serde::Serialize;

/// A conflict between two named variable locations
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictRecord {
    pub first: NamedAccess,
    pub second: NamedAccess,
    pub priority: u64,
}

/// Counters from one aggregation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AggregateStats {
    pub realized_pairs: u64,
    pub potential_pairs: u64,
    /// Pairs dropped because an address is not inside a known global
    pub unresolved_pairs: u64,
    /// Pairs folded into an existing record
    pub merged_pairs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Realized,
    Potential,
}

/// Insertion-ordered table of named conflicts
#[derive(Debug)]
pub struct ConflictAggregator<'a> {
    symbols: &'a SymbolTable,
    records: IndexMap<ConflictKey, ConflictRecord>,
    stats: AggregateStats,
}

impl<'a> ConflictAggregator<'a> {
    pub fn new(symbols: &'a SymbolTable) -> Self {
        Self {
            symbols,
            records: IndexMap::new(),
            stats: AggregateStats::default(),
        }
    }

    /// Fold a conflict observed in the trace
    pub fn add_realized(&mut self, pair: ConflictPair) {
        self.stats.realized_pairs += 1;
        self.add(pair, Source::Realized);
    }

    /// Fold a predicted conflict carrying its declared weight
    pub fn add_potential(&mut self, pair: ConflictPair) {
        self.stats.potential_pairs += 1;
        self.add(pair, Source::Potential);
    }

    fn add(&mut self, pair: ConflictPair, source: Source) {
        let declared = pair.priority.unwrap_or(1);

        match self.records.entry(pair.key()) {
            Entry::Occupied(mut entry) => {
                let increment = match source {
                    Source::Realized => 1,
                    Source::Potential => declared,
                };
                let record = entry.get_mut();
                record.priority = record.priority.saturating_add(increment);
                self.stats.merged_pairs += 1;
            }
            Entry::Vacant(entry) => {
                let (Some(first), Some(second)) = (
                    self.symbols.resolve(pair.first),
                    self.symbols.resolve(pair.second),
                ) else {
                    self.stats.unresolved_pairs += 1;
                    tracing::debug!(
                        "Unresolved conflict {:#x} <-> {:#x} dropped",
                        pair.first,
                        pair.second
                    );
                    return;
                };

                entry.insert(ConflictRecord {
                    first,
                    second,
                    priority: declared,
                });
            }
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn stats(&self) -> AggregateStats {
        self.stats
    }

    /// Records in insertion order
    pub fn records(&self) -> impl Iterator<Item = &ConflictRecord> {
        self.records.values()
    }

    /// Consume the aggregator, keeping insertion order
    pub fn into_records(self) -> Vec<ConflictRecord> {
        self.records.into_values().collect()
    }
}
