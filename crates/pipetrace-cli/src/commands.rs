//! Command implementations for the pipetrace CLI.

mod bbl;
mod perfcct;

use crate::{Cli, Format, Tool};
use anyhow::{Context, Result};
use pipetrace_analysis::PcRange;
use pipetrace_core::{parse_pc, GapMode, Period, ReaderConfig, TickRange};
use pipetrace_reader::{SpikeDasm, TraceReader};
use std::collections::HashSet;
use std::io::Write;
use std::path::PathBuf;

/// The report selected on the command line, with its parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    Blocks { top: usize },
    Timeline { range: PcRange, attention: HashSet<u64> },
}

/// Fully validated run configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    pub db: PathBuf,
    pub reader: ReaderConfig,
    pub report: Report,
    pub format: Format,
    pub disasm_cmd: String,
    pub progress: bool,
}

impl Settings {
    /// Validate the command line. Nothing here touches the database.
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let gap = GapMode::from_flags(cli.inter_gap, cli.inner_gap)?;
        let period = Period::new(cli.platform.forced_period().unwrap_or(cli.period))?;
        let ticks = TickRange::from_bounds(cli.start_tick, cli.end_tick);

        let reader = ReaderConfig::new(ticks, period, gap)
            .with_decode(cli.platform.decode_mode())
            .with_limit(u64::try_from(cli.num_insts).ok());

        let report = match cli.tool {
            Tool::Bbl => Report::Blocks { top: cli.top },
            Tool::Perfcct => {
                let range = PcRange::new(parse_pc(&cli.start_pc)?, parse_pc(&cli.end_pc)?)?;
                let attention = cli
                    .attention_pc
                    .iter()
                    .map(|pc| parse_pc(pc))
                    .collect::<pipetrace_core::Result<HashSet<_>>>()?;
                Report::Timeline { range, attention }
            }
        };

        Ok(Self {
            db: cli.sqldb.clone(),
            reader,
            report,
            format: cli.format,
            disasm_cmd: cli.disasm_cmd.clone(),
            progress: !cli.quiet,
        })
    }
}

/// Read the trace and write the selected report to `out`.
pub fn run(settings: &Settings, out: &mut impl Write) -> Result<()> {
    let disasm = SpikeDasm::with_program(settings.disasm_cmd.as_str());
    let mut reader = TraceReader::open(&settings.db, settings.reader.clone(), disasm)
        .with_context(|| format!("Failed to open trace {}", settings.db.display()))?
        .with_progress(settings.progress);
    let trace = reader
        .read()
        .with_context(|| format!("Failed to read trace {}", settings.db.display()))?;

    match &settings.report {
        Report::Blocks { top } => bbl::report(&trace, *top, settings, out),
        Report::Timeline { range, attention } => {
            perfcct::report(&trace, *range, attention, settings, out)
        }
    }
}
