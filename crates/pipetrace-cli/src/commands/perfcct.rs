//! Pc-range timeline report.

use super::Settings;
use crate::Format;
use anyhow::Result;
use log::{info, warn};
use pipetrace_analysis::{PcRange, TimelineReport};
use pipetrace_reader::TraceData;
use std::collections::HashSet;
use std::io::Write;

/// Print the stage timings of every instruction inside `range`.
pub fn report(
    trace: &TraceData,
    range: PcRange,
    attention: &HashSet<u64>,
    settings: &Settings,
    out: &mut impl Write,
) -> Result<()> {
    let report = TimelineReport::new(&trace.records, &trace.timings, range, attention)?;
    if report.entries().is_empty() {
        warn!(
            "No committed instruction between {:#x} and {:#x}",
            range.start, range.end
        );
    } else {
        info!(
            "{} of {} instructions in range",
            report.entries().len(),
            trace.len()
        );
    }

    match settings.format {
        Format::Text => write!(out, "{}", report)?,
        Format::Json => writeln!(out, "{}", report.to_json()?)?,
    }
    Ok(())
}
