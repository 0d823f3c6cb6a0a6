//! CLI argument parsing for falseshare

use crate::pipeline::SymbolSource;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Output format for the conflict report
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// `name1 offset1 size1 name2 offset2 size2 priority` lines (default)
    Text,
    /// JSON document including run statistics
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "falseshare")]
#[command(version)]
#[command(about = "Detect false sharing between global variables from a memory access trace", long_about = None)]
pub struct Cli {
    /// Enable debug tracing output (to stderr)
    #[arg(long, global = true)]
    pub debug: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "debug")]
    pub quiet: bool,

    /// TOML configuration file
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Cache line size in bytes (power of two, default: 64)
    #[arg(short = 'l', long = "cache-line-size", global = true, value_name = "BYTES")]
    pub cache_line_size: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Find raw conflicting address pairs in a trace
    Detect {
        /// Memory access trace (pinatrace format)
        trace: PathBuf,

        /// Interferences output file (default: TRACE.interferences)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Symbolize and rank conflicts from interferences and candidate files
    Map {
        /// Interferences file produced by `detect`
        #[arg(long, value_name = "FILE")]
        realized: PathBuf,

        #[command(flatten)]
        aggregate: AggregateArgs,
    },

    /// Detect and map in one pass
    Analyze {
        /// Memory access trace (pinatrace format)
        trace: PathBuf,

        #[command(flatten)]
        aggregate: AggregateArgs,
    },
}

/// Options shared by the commands that produce a conflict report
#[derive(Args, Debug)]
pub struct AggregateArgs {
    /// Global variable table (`name addrHex size` per line)
    #[arg(
        short,
        long,
        value_name = "FILE",
        required_unless_present = "binary",
        conflicts_with = "binary"
    )]
    pub symbols: Option<PathBuf>,

    /// Read global variables from a non-PIE ELF binary instead
    #[arg(short, long, value_name = "FILE")]
    pub binary: Option<PathBuf>,

    /// Statically predicted conflicts (`addr1 addr2 [priority]` per line)
    #[arg(short, long, value_name = "FILE")]
    pub potential: Option<PathBuf>,

    /// Report output file (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Report format
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Only report the N highest-priority conflicts
    #[arg(long, value_name = "N")]
    pub top: Option<usize>,
}

impl AggregateArgs {
    pub fn symbol_source(&self) -> Option<SymbolSource> {
        match (&self.symbols, &self.binary) {
            (Some(path), _) => Some(SymbolSource::Table(path.clone())),
            (None, Some(path)) => Some(SymbolSource::Binary(path.clone())),
            (None, None) => None,
        }
    }
}
