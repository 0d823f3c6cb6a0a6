//! falseshare - false-sharing detection from memory access traces
//!
//! This library replays a per-instruction memory access trace of a
//! multi-threaded program, finds accesses from different threads that land on
//! the same cache line without touching the same bytes, resolves both sides
//! to global variables, and ranks the resulting conflicts for a layout pass.

pub mod aggregate;
pub mod candidates;
pub mod cli;
pub mod config;
pub mod error;
pub mod ledger;
pub mod pipeline;
pub mod report;
pub mod symbols;
pub mod trace;
