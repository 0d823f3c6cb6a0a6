//! Typed errors for line-oriented inputs and configuration
//!
//! Line-level errors are recoverable: callers log them with the line number
//! and keep going. File-level failures are carried as `anyhow::Error` by the
//! pipeline instead.

use thiserror::Error;

/// Why a single trace line could not be turned into a `TraceRecord`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TraceParseError {
    #[error("expected 6 fields, found {found}")]
    MissingFields { found: usize },

    #[error("invalid read/write marker: {0}")]
    InvalidAccessKind(String),

    #[error("invalid hexadecimal {field}: {value}")]
    InvalidHex { field: &'static str, value: String },

    #[error("invalid decimal {field}: {value}")]
    InvalidDecimal { field: &'static str, value: String },
}

/// Why a conflict pair line (`addr1 addr2 [priority]`) was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PairParseError {
    #[error("expected at least 2 fields, found {found}")]
    MissingFields { found: usize },

    #[error("invalid hexadecimal address: {0}")]
    InvalidAddress(String),

    #[error("invalid priority: {0}")]
    InvalidPriority(String),
}

/// Why a symbol table line (`name addr size`) was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SymbolParseError {
    #[error("expected 3 fields, found {found}")]
    MissingFields { found: usize },

    #[error("invalid hexadecimal address for {name}: {value}")]
    InvalidAddress { name: String, value: String },

    #[error("invalid size for {name}: {value}")]
    InvalidSize { name: String, value: String },
}

/// Configuration values that cannot drive an analysis
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("cache line size must be a positive power of two, got {0}")]
    InvalidCacheLineSize(u64),

    #[error("progress interval must be greater than zero")]
    ZeroProgressInterval,
}

/// Parse a hexadecimal number, accepting an optional `0x`/`0X` prefix
pub(crate) fn parse_hex(text: &str) -> Option<u64> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    u64::from_str_radix(digits, 16).ok()
}
