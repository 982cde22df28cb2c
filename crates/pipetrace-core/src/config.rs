//! Trace reader configuration.
//!
//! Every value here is validated on construction so that configuration
//! mistakes surface before the trace database is touched.

use crate::stage::STAGE_COUNT;
use crate::{Error, Result};
use serde::Serialize;

/// How per-stage cycle counts are turned into the reported timing vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum GapMode {
    /// Absolute cycle counts per stage.
    #[default]
    Raw,
    /// Difference of each stage between consecutive instructions.
    Inter,
    /// Difference between consecutive stages of the same instruction.
    Inner,
}

impl GapMode {
    /// Build the mode from the two mutually exclusive command line flags.
    pub fn from_flags(inter_gap: bool, inner_gap: bool) -> Result<Self> {
        match (inter_gap, inner_gap) {
            (true, true) => Err(Error::Config(
                "cannot enable both inter-gap and inner-gap analysis".into(),
            )),
            (true, false) => Ok(GapMode::Inter),
            (false, true) => Ok(GapMode::Inner),
            (false, false) => Ok(GapMode::Raw),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            GapMode::Raw => "normal",
            GapMode::Inter => "inter-gap",
            GapMode::Inner => "inner-gap",
        }
    }

    /// Check if timings are differences rather than absolute cycles.
    pub fn is_gap(&self) -> bool {
        !matches!(self, GapMode::Raw)
    }

    /// Number of values in each timing vector produced under this mode.
    pub fn width(&self) -> usize {
        match self {
            GapMode::Inner => STAGE_COUNT - 1,
            GapMode::Raw | GapMode::Inter => STAGE_COUNT,
        }
    }
}

/// Whether the instruction column holds text or raw encoded words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodeMode {
    /// The trace already carries disassembled text.
    #[default]
    Text,
    /// The trace carries raw instruction words that must go through the
    /// external disassembler.
    RawOpcode,
}

impl DecodeMode {
    pub fn requires_decode(&self) -> bool {
        matches!(self, DecodeMode::RawOpcode)
    }
}

/// Number of simulator ticks per clock cycle. Never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period(i64);

impl Period {
    pub fn new(ticks: i64) -> Result<Self> {
        if ticks < 1 {
            return Err(Error::Config(format!(
                "period must be at least 1 tick per cycle, got {}",
                ticks
            )));
        }
        Ok(Self(ticks))
    }

    pub fn ticks(&self) -> i64 {
        self.0
    }

    /// Convert an absolute tick into whole cycles, rounding toward negative
    /// infinity.
    pub fn to_cycles(&self, tick: i64) -> i64 {
        tick.div_euclid(self.0)
    }
}

impl Default for Period {
    fn default() -> Self {
        Self(1)
    }
}

/// Inclusive commit-tick window. An absent end means no upper bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickRange {
    pub start: i64,
    pub end: Option<i64>,
}

impl TickRange {
    /// Build the window from command line values, where an end below the
    /// start disables the upper bound.
    pub fn from_bounds(start: i64, end: i64) -> Self {
        Self {
            start,
            end: (end >= start).then_some(end),
        }
    }

    pub fn contains(&self, tick: i64) -> bool {
        tick >= self.start && self.end.map_or(true, |end| tick <= end)
    }
}

/// Everything the trace reader needs to know about a run.
#[derive(Debug, Clone, Default)]
pub struct ReaderConfig {
    pub ticks: TickRange,
    pub period: Period,
    pub gap: GapMode,
    pub decode: DecodeMode,
    /// Maximum number of rows to read after tick filtering.
    pub limit: Option<u64>,
}

impl ReaderConfig {
    pub fn new(ticks: TickRange, period: Period, gap: GapMode) -> Self {
        Self {
            ticks,
            period,
            gap,
            decode: DecodeMode::Text,
            limit: None,
        }
    }

    pub fn with_decode(mut self, decode: DecodeMode) -> Self {
        self.decode = decode;
        self
    }

    pub fn with_limit(mut self, limit: Option<u64>) -> Self {
        self.limit = limit;
        self
    }
}
