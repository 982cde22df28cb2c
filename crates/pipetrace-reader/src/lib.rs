//! Trace ingestion for pipetrace.
//!
//! This crate provides:
//!
//! - `TraceReader`: reads committed-instruction rows from a SQLite trace
//!   database, converts stage timestamps to cycles and derives gap vectors
//! - `Disassembler` / `DisasmCache`: decodes raw instruction words through an
//!   external tool, once per distinct word
//!
//! ```ignore
//! use pipetrace_reader::{SpikeDasm, TraceReader};
//!
//! let mut reader = TraceReader::open("trace.db", config, SpikeDasm::new())?;
//! let trace = reader.read()?;
//! println!("{} instructions", trace.records.len());
//! ```

mod disasm;
mod reader;

pub use disasm::{DisasmCache, Disassembler, SpikeDasm};
pub use reader::{TraceData, TraceReader, COMMIT_COLUMN, TRACE_TABLE};
