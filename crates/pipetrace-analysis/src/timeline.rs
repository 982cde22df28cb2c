//! Per-instruction stage timeline restricted to a pc range.

use pipetrace_core::{Error, InstRecord, Result, Stage};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

/// Marker appended to attention addresses.
const ATTENTION_MARK: &str = "<<====";

/// Inclusive address range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcRange {
    pub start: u64,
    pub end: u64,
}

impl PcRange {
    pub fn new(start: u64, end: u64) -> Result<Self> {
        if start > end {
            return Err(Error::Config(format!(
                "start pc {:#x} is above end pc {:#x}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, pc: u64) -> bool {
        (self.start..=self.end).contains(&pc)
    }
}

#[derive(Debug, Serialize)]
pub struct TimelineEntry<'a> {
    #[serde(skip)]
    pub record: &'a InstRecord,
    pub pc: String,
    pub asm: &'a str,
    pub cycles: &'a [i64],
    pub attention: bool,
}

/// Chronological listing of the instructions that fall inside a pc range.
pub struct TimelineReport<'a> {
    entries: Vec<TimelineEntry<'a>>,
    range: PcRange,
}

impl<'a> TimelineReport<'a> {
    pub fn new(
        records: &'a [InstRecord],
        timings: &'a [Vec<i64>],
        range: PcRange,
        attention: &HashSet<u64>,
    ) -> Result<Self> {
        if records.len() != timings.len() {
            return Err(Error::Alignment {
                records: records.len(),
                vectors: timings.len(),
            });
        }

        let entries = records
            .iter()
            .zip(timings)
            .filter(|(record, _)| range.contains(record.pc))
            .map(|(record, cycles)| TimelineEntry {
                record,
                pc: record.pc_hex(),
                asm: &record.asm,
                cycles,
                attention: attention.contains(&record.pc),
            })
            .collect();

        Ok(Self { entries, range })
    }

    pub fn entries(&self) -> &[TimelineEntry<'a>] {
        &self.entries
    }

    pub fn to_text(&self) -> String {
        self.to_string()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.entries)?)
    }
}

impl fmt::Display for TimelineReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            write!(f, "{:8}:{:25}:", entry.pc, entry.asm)?;
            for (stage, cycles) in Stage::ALL.iter().zip(entry.cycles) {
                write!(f, " {}{}", stage.short_code(), cycles)?;
            }
            if entry.attention {
                write!(f, " {}", ATTENTION_MARK)?;
            }
            writeln!(f)?;
            // Blank line closes one pass over the range.
            if entry.record.pc == self.range.end {
                writeln!(f)?;
            }
        }
        Ok(())
    }
}
