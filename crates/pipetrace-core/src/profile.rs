//! Averaged timing profile keyed by instruction identity.

use crate::record::{InstRecord, TimingVector};
use crate::{Error, Result};
use std::collections::HashMap;

/// Element-wise mean timing for one (pc, mnemonic) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileEntry {
    pub occurrences: usize,
    pub mean: Vec<f64>,
}

/// Mean timing vectors pooled across every occurrence of an instruction.
///
/// A static instruction visited many times (a loop body, say) contributes
/// all of its visits to a single entry.
#[derive(Debug, Clone, Default)]
pub struct TimingProfile {
    entries: HashMap<InstRecord, ProfileEntry>,
}

impl TimingProfile {
    /// Build the profile from parallel record and timing slices.
    pub fn build(records: &[InstRecord], timings: &[TimingVector]) -> Result<Self> {
        if records.len() != timings.len() {
            return Err(Error::Alignment {
                records: records.len(),
                vectors: timings.len(),
            });
        }

        let mut sums: HashMap<&InstRecord, (usize, Vec<f64>)> = HashMap::new();
        for (record, timing) in records.iter().zip(timings) {
            let (count, sum) = sums
                .entry(record)
                .or_insert_with(|| (0, vec![0.0; timing.len()]));
            *count += 1;
            for (acc, value) in sum.iter_mut().zip(timing) {
                *acc += *value as f64;
            }
        }

        let entries = sums
            .into_iter()
            .map(|(record, (count, sum))| {
                let mean = sum.into_iter().map(|s| s / count as f64).collect();
                (
                    record.clone(),
                    ProfileEntry {
                        occurrences: count,
                        mean,
                    },
                )
            })
            .collect();

        Ok(Self { entries })
    }

    pub fn get(&self, record: &InstRecord) -> Option<&ProfileEntry> {
        self.entries.get(record)
    }

    /// Mean timing vector for a record, if it occurred in the trace.
    pub fn mean(&self, record: &InstRecord) -> Option<&[f64]> {
        self.entries.get(record).map(|e| e.mean.as_slice())
    }

    /// Number of distinct (pc, mnemonic) pairs.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&InstRecord, &ProfileEntry)> {
        self.entries.iter()
    }
}
