//! Core types for pipetrace.
//!
//! This crate defines the data structures shared by the trace reader, the
//! basic block analysis and the reporters: pipeline stages, instruction
//! records, timing vectors, reader configuration and the averaged timing
//! profile. It contains no I/O beyond the error conversions.

pub mod config;
pub mod error;
pub mod profile;
pub mod progress;
pub mod record;
pub mod stage;

pub use config::{DecodeMode, GapMode, Period, ReaderConfig, TickRange};
pub use error::{Error, Result};
pub use profile::TimingProfile;
pub use record::{parse_pc, InstRecord, TimingVector};
pub use stage::{Stage, STAGE_COUNT};
