//! Instruction records and timing vectors.

use crate::{Error, Result};
use std::fmt;

/// Per-instruction timing values in clock cycles, one per stage (raw and
/// inter-gap modes) or one per adjacent stage pair (inner-gap mode).
pub type TimingVector = Vec<i64>;

/// The identity of a committed instruction: where it was and what it was.
///
/// Two occurrences with the same pc and mnemonic are treated as the same
/// instruction when timings are averaged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstRecord {
    pub pc: u64,
    pub asm: String,
}

impl InstRecord {
    pub fn new(pc: u64, asm: impl Into<String>) -> Self {
        Self {
            pc,
            asm: asm.into(),
        }
    }

    /// Reinterpret a pc stored in a signed 64-bit column.
    ///
    /// SQLite integers are signed, so addresses at or above 2^63 come back
    /// negative (`pc - 2^64`). The two's complement cast restores them.
    pub fn pc_from_stored(stored: i64) -> u64 {
        stored as u64
    }

    /// The pc formatted as lowercase hex with a `0x` prefix.
    pub fn pc_hex(&self) -> String {
        format!("{:#x}", self.pc)
    }

    /// The opcode token of the mnemonic, or an empty string.
    pub fn opcode(&self) -> &str {
        self.asm.split_whitespace().next().unwrap_or("")
    }
}

impl fmt::Display for InstRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}: {}", self.pc, self.asm)
    }
}

/// Parse a hex address as given on the command line, with or without `0x`.
pub fn parse_pc(text: &str) -> Result<u64> {
    let trimmed = text.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    u64::from_str_radix(digits, 16)
        .map_err(|e| Error::Config(format!("invalid pc '{}': {}", text, e)))
}
