//! Global variable symbol table and address resolution
//!
//! Maps raw data addresses back to `(variable, offset)` so conflicts can be
//! reported against names the layout pass is able to change.
//!
//! Two sources are supported:
//! - a text table written by the build-time globals pass (`name addrHex size`)
//! - the symbol table of a non-PIE ELF binary, read with the `object` crate

use crate::error::{parse_hex, SymbolParseError};
use crate::trace::for_each_text_line;
use anyhow::{Context, Result};
use object::{Object, ObjectSymbol, SymbolKind};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

/// A named region of the traced program's address space
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalVariable {
    pub name: String,
    pub start_address: u64,
    /// Bytes occupied by the variable
    pub size: u64,
}

impl GlobalVariable {
    pub fn new(name: impl Into<String>, start_address: u64, size: u64) -> Self {
        Self {
            name: name.into(),
            start_address,
            size,
        }
    }

    /// True if `address` falls inside `[start_address, start_address + size)`
    pub fn contains(&self, address: u64) -> bool {
        address >= self.start_address && address - self.start_address < self.size
    }
}

impl FromStr for GlobalVariable {
    type Err = SymbolParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = line.split_whitespace().take(3).collect();
        let [name, addr, size] = fields[..] else {
            return Err(SymbolParseError::MissingFields {
                found: fields.len(),
            });
        };

        let start_address = parse_hex(addr).ok_or_else(|| SymbolParseError::InvalidAddress {
            name: name.to_string(),
            value: addr.to_string(),
        })?;
        let size = size
            .parse::<u64>()
            .map_err(|_| SymbolParseError::InvalidSize {
                name: name.to_string(),
                value: size.to_string(),
            })?;

        Ok(Self::new(name, start_address, size))
    }
}

/// One side of a named conflict: which variable, which byte, how wide
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NamedAccess {
    pub name: String,
    /// Offset of the access from the start of the variable, in bytes
    pub offset: u64,
    /// Width of the access, in bytes
    pub size: u64,
}

/// Counters from loading a symbol table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadStats {
    pub lines: u64,
    pub loaded: u64,
    pub skipped_lines: u64,
}

/// Global variables sorted by start address
///
/// Sorting happens once at construction; every lookup afterwards is read-only.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    variables: Vec<GlobalVariable>,
}

impl SymbolTable {
    pub fn new(mut variables: Vec<GlobalVariable>) -> Self {
        variables.sort_by_key(|v| v.start_address);
        Self { variables }
    }

    /// Load a text symbol table, skipping (and logging) malformed lines
    pub fn from_reader<R: BufRead>(reader: R) -> Result<(Self, LoadStats)> {
        let mut stats = LoadStats::default();
        let mut variables = Vec::new();

        let lines = for_each_text_line(reader, |line_number, line| {
            match line.parse::<GlobalVariable>() {
                Ok(var) => {
                    stats.loaded += 1;
                    variables.push(var);
                }
                Err(e) => {
                    stats.skipped_lines += 1;
                    tracing::warn!("Symbol table line #{} skipped: {}", line_number, e);
                }
            }
        })
        .context("Failed to read symbol table")?;
        stats.lines = lines;

        Ok((Self::new(variables), stats))
    }

    /// Load a text symbol table from disk
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<(Self, LoadStats)> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open symbol table: {}", path.display()))?;
        Self::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to load symbol table: {}", path.display()))
    }

    /// Load data symbols from an ELF binary
    ///
    /// Only correct for binaries whose link addresses equal their runtime
    /// addresses (non-PIE), since the trace logs runtime addresses.
    pub fn from_elf<P: AsRef<Path>>(path: P) -> Result<(Self, LoadStats)> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open binary: {}", path.display()))?;

        let mmap = unsafe { memmap2::Mmap::map(&file) }.context("Failed to memory-map binary")?;

        let object = object::File::parse(&*mmap)
            .with_context(|| format!("Failed to parse binary: {}", path.display()))?;

        let mut stats = LoadStats::default();
        let mut variables = Vec::new();
        for symbol in object.symbols() {
            stats.lines += 1;
            if symbol.kind() != SymbolKind::Data || !symbol.is_definition() || symbol.size() == 0
            {
                continue;
            }
            let Ok(name) = symbol.name() else {
                stats.skipped_lines += 1;
                continue;
            };
            if name.is_empty() || name.starts_with("llvm.") {
                continue;
            }
            stats.loaded += 1;
            variables.push(GlobalVariable::new(name, symbol.address(), symbol.size()));
        }

        Ok((Self::new(variables), stats))
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn variables(&self) -> &[GlobalVariable] {
        &self.variables
    }

    /// Find the variable whose region would contain `address`, if any does
    fn candidate(&self, address: u64) -> Option<&GlobalVariable> {
        let last = self.variables.len().checked_sub(1)?;

        // First entry whose start is not less than the address
        let idx = self.variables.partition_point(|v| v.start_address < address);
        let idx = if idx > last {
            last
        } else if self.variables[idx].start_address == address || idx == 0 {
            idx
        } else {
            idx - 1
        };

        self.variables.get(idx)
    }

    /// Resolve an address to `(name, offset, 1)`
    ///
    /// The reported access size is always 1 byte; the layout pass consumes
    /// offsets, not widths. Addresses outside every known global (stack,
    /// heap, unmapped) resolve to `None`.
    pub fn resolve(&self, address: u64) -> Option<NamedAccess> {
        let var = self.candidate(address)?;
        if !var.contains(address) {
            return None;
        }

        Some(NamedAccess {
            name: var.name.clone(),
            offset: address - var.start_address,
            size: 1,
        })
    }
}
