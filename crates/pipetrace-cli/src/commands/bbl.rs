//! Block frequency report.

use super::Settings;
use crate::Format;
use anyhow::Result;
use log::info;
use pipetrace_analysis::{BlockExtractor, BlockReport};
use pipetrace_reader::TraceData;
use std::io::Write;

/// Count basic blocks and print the `top` most frequent ones.
pub fn report(
    trace: &TraceData,
    top: usize,
    settings: &Settings,
    out: &mut impl Write,
) -> Result<()> {
    let counter = BlockExtractor::new()
        .with_progress(settings.progress)
        .extract(&trace.records);
    info!(
        "{} instructions form {} basic blocks ({} distinct)",
        trace.len(),
        counter.total(),
        counter.distinct()
    );

    let report = BlockReport::new(&counter, &trace.profile, trace.gap, top);
    match settings.format {
        Format::Text => write!(out, "{}", report)?,
        Format::Json => writeln!(out, "{}", report.to_json()?)?,
    }
    Ok(())
}
