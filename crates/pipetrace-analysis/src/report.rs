use crate::blocks::{BasicBlock, BlockCounter};
use pipetrace_core::{GapMode, Result, Stage, TimingProfile};
use serde::Serialize;
use std::fmt;

/// The most frequent basic blocks with their averaged stage timings.
pub struct BlockReport<'a> {
    blocks: Vec<(&'a BasicBlock, usize)>,
    profile: &'a TimingProfile,
    mode: GapMode,
    top: usize,
}

#[derive(Serialize)]
struct BlockReportJson<'a> {
    mode: GapMode,
    top: usize,
    blocks: Vec<BlockJson<'a>>,
}

#[derive(Serialize)]
struct BlockJson<'a> {
    count: usize,
    instructions: Vec<InstJson<'a>>,
}

#[derive(Serialize)]
struct InstJson<'a> {
    pc: String,
    asm: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    avg_cycles: Option<&'a [f64]>,
}

impl<'a> BlockReport<'a> {
    pub fn new(
        counter: &'a BlockCounter,
        profile: &'a TimingProfile,
        mode: GapMode,
        top: usize,
    ) -> Self {
        Self {
            blocks: counter.most_common(top),
            profile,
            mode,
            top,
        }
    }

    /// Blocks in report order with their counts.
    pub fn blocks(&self) -> &[(&'a BasicBlock, usize)] {
        &self.blocks
    }

    /// Generate a human-readable text report.
    pub fn to_text(&self) -> String {
        self.to_string()
    }

    /// Generate a JSON report.
    pub fn to_json(&self) -> Result<String> {
        let shows_timing = self.mode.is_gap();
        let blocks = self
            .blocks
            .iter()
            .map(|(block, count)| BlockJson {
                count: *count,
                instructions: block
                    .insts()
                    .iter()
                    .map(|inst| InstJson {
                        pc: inst.pc_hex(),
                        asm: &inst.asm,
                        avg_cycles: shows_timing.then(|| self.profile.mean(inst)).flatten(),
                    })
                    .collect(),
            })
            .collect();

        Ok(serde_json::to_string_pretty(&BlockReportJson {
            mode: self.mode,
            top: self.top,
            blocks,
        })?)
    }
}

impl fmt::Display for BlockReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shows_timing = self.mode.is_gap();
        writeln!(
            f,
            "Top {} most common basic blocks (mode:{}):",
            self.top,
            self.mode.name()
        )?;

        for (block, count) in &self.blocks {
            writeln!(f)?;
            writeln!(f, "Count: {}", count)?;
            writeln!(f, "Instructions:")?;
            write!(f, "  PC        : Instruction")?;
            if shows_timing {
                write!(f, "               : ")?;
                let names: Vec<String> = Stage::ALL
                    .iter()
                    .map(|stage| format!("{:>9}", stage.long_name()))
                    .collect();
                write!(f, "{}", names.join(" "))?;
            }
            writeln!(f)?;

            for inst in block.insts() {
                write!(f, "  {:10}: {:25}", inst.pc_hex(), inst.asm)?;
                if shows_timing {
                    match self.profile.mean(inst) {
                        Some(mean) => {
                            let cells: Vec<String> =
                                mean.iter().map(|c| format!("{:9.2}", c)).collect();
                            write!(f, " : {}", cells.join(" "))?;
                        }
                        None => write!(f, " : n/a")?,
                    }
                }
                writeln!(f)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::BlockExtractor;
    use pipetrace_core::InstRecord;

    fn trace() -> (Vec<InstRecord>, Vec<Vec<i64>>) {
        let body = [
            InstRecord::new(0x8000_0000, "addi a0, a0, 1"),
            InstRecord::new(0x8000_0004, "bnez a0, 0x80000000"),
        ];
        let tail = InstRecord::new(0x8000_0008, "ret");

        let mut records = Vec::new();
        let mut timings = Vec::new();
        for i in 0..3 {
            for inst in &body {
                records.push(inst.clone());
                timings.push(vec![i * 2; 10]);
            }
        }
        records.push(tail);
        timings.push(vec![1; 10]);
        (records, timings)
    }

    #[test]
    fn test_text_report_without_timings() {
        let (records, timings) = trace();
        let profile = TimingProfile::build(&records, &timings).unwrap();
        let counter = BlockExtractor::new().extract(&records);
        let text = BlockReport::new(&counter, &profile, GapMode::Raw, 10).to_text();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Top 10 most common basic blocks (mode:normal):");
        assert_eq!(lines[1], "");
        assert_eq!(lines[2], "Count: 3");
        assert_eq!(lines[3], "Instructions:");
        assert_eq!(lines[4], "  PC        : Instruction");
        assert_eq!(lines[5], format!("  {:10}: {:25}", "0x80000000", "addi a0, a0, 1"));
        assert!(text.contains("Count: 1"));
        assert!(!text.contains("fetch"));
    }

    #[test]
    fn test_text_report_with_gap_timings() {
        let (records, timings) = trace();
        let profile = TimingProfile::build(&records, &timings).unwrap();
        let counter = BlockExtractor::new().extract(&records);
        let report = BlockReport::new(&counter, &profile, GapMode::Inner, 1);
        let text = report.to_text();

        assert_eq!(report.blocks().len(), 1);
        assert!(text.starts_with("Top 1 most common basic blocks (mode:inner-gap):"));
        assert!(text.contains("    fetch    decode"));
        assert!(text.contains("writeback    commit"));
        // Mean of 0, 2, 4.
        assert!(text.contains(&format!(" : {}", vec!["     2.00"; 10].join(" "))));
        assert!(!text.contains("Count: 1"));
    }

    #[test]
    fn test_json_report() {
        let (records, timings) = trace();
        let profile = TimingProfile::build(&records, &timings).unwrap();
        let counter = BlockExtractor::new().extract(&records);
        let json = BlockReport::new(&counter, &profile, GapMode::Inter, 10)
            .to_json()
            .unwrap();

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["mode"], "inter");
        assert_eq!(value["blocks"][0]["count"], 3);
        assert_eq!(value["blocks"][0]["instructions"][0]["pc"], "0x80000000");
        assert_eq!(value["blocks"][0]["instructions"][1]["avg_cycles"][0], 2.0);
        assert_eq!(value["blocks"][1]["instructions"][0]["asm"], "ret");
    }

    #[test]
    fn test_json_report_omits_raw_timings() {
        let (records, timings) = trace();
        let profile = TimingProfile::build(&records, &timings).unwrap();
        let counter = BlockExtractor::new().extract(&records);
        let json = BlockReport::new(&counter, &profile, GapMode::Raw, 10)
            .to_json()
            .unwrap();
        assert!(!json.contains("avg_cycles"));
    }
}
