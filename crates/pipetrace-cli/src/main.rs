//! CLI tool for pipetrace.
//!
//! Reads an instruction commit trace captured from gem5 or an RTL simulation
//! and prints either the most frequent basic blocks or a pc-range timeline.

mod commands;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use pipetrace_core::DecodeMode;
use std::io;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pipetrace")]
#[command(about = "Pipeline stage timing analysis for commit traces", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to the SQLite trace database
    pub sqldb: PathBuf,

    /// Number of ticks per clock cycle
    #[arg(short, long, default_value_t = 333, allow_negative_numbers = true)]
    pub period: i64,

    /// Platform that produced the trace
    #[arg(long, value_enum, default_value = "gem5")]
    pub platform: Platform,

    /// Start tick to analyze
    #[arg(short, long, default_value_t = 0, allow_negative_numbers = true)]
    pub start_tick: i64,

    /// End tick to analyze (below the start tick means no upper bound)
    #[arg(short, long, default_value_t = -1, allow_negative_numbers = true)]
    pub end_tick: i64,

    /// Maximum number of instructions to analyze (negative means all)
    #[arg(short, long, default_value_t = -1, allow_negative_numbers = true)]
    pub num_insts: i64,

    /// Analyze the gap between consecutive instructions
    #[arg(long)]
    pub inter_gap: bool,

    /// Analyze the gap between consecutive stages of each instruction
    #[arg(long)]
    pub inner_gap: bool,

    /// Report to produce
    #[arg(long, value_enum, default_value = "bbl")]
    pub tool: Tool,

    /// Addresses to flag in the timeline
    #[arg(long, num_args = 1..)]
    pub attention_pc: Vec<String>,

    /// Start pc of the timeline, a hex value
    #[arg(long, default_value = "0")]
    pub start_pc: String,

    /// End pc of the timeline, a hex value
    #[arg(long, default_value = "0")]
    pub end_pc: String,

    /// Number of basic blocks to report
    #[arg(long, default_value_t = 10)]
    pub top: usize,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub format: Format,

    /// Disassembler used for raw instruction words
    #[arg(long, default_value = "spike-dasm")]
    pub disasm_cmd: String,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Hide progress bars
    #[arg(short, long)]
    pub quiet: bool,
}

/// Simulators that produce commit traces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Platform {
    /// gem5: tick timestamps, disassembled text
    Gem5,
    /// RTL simulation: cycle timestamps, raw instruction words
    Rtl,
}

impl Platform {
    /// Period imposed by the platform regardless of `--period`.
    pub fn forced_period(self) -> Option<i64> {
        match self {
            Platform::Gem5 => None,
            Platform::Rtl => Some(1),
        }
    }

    pub fn decode_mode(self) -> DecodeMode {
        match self {
            Platform::Gem5 => DecodeMode::Text,
            Platform::Rtl => DecodeMode::RawOpcode,
        }
    }
}

/// Available reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Tool {
    /// Per-instruction stage timeline over a pc range
    Perfcct,
    /// Most frequent basic blocks
    Bbl,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Text,
    Json,
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let settings = commands::Settings::from_cli(&cli)?;
    let stdout = io::stdout();
    commands::run(&settings, &mut stdout.lock())
}
