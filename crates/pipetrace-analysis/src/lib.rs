//! Analysis and reporting for pipetrace.
//!
//! This crate provides:
//! - Control-flow classification of mnemonics
//! - Basic block segmentation and frequency counting
//! - The block frequency and pc-range timeline reports

pub mod blocks;
pub mod branch;
pub mod report;
pub mod timeline;

pub use blocks::{BasicBlock, BlockCounter, BlockExtractor};
pub use branch::is_branch;
pub use report::BlockReport;
pub use timeline::{PcRange, TimelineReport};
