//! Basic block segmentation and frequency counting.

use crate::branch::is_branch;
use log::debug;
use pipetrace_core::progress::progress_bar;
use pipetrace_core::InstRecord;
use std::collections::HashMap;

/// A straight-line run of instructions ending at a control-flow transfer,
/// or at the end of the trace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BasicBlock(Box<[InstRecord]>);

impl BasicBlock {
    pub fn new(insts: Vec<InstRecord>) -> Self {
        Self(insts.into_boxed_slice())
    }

    pub fn insts(&self) -> &[InstRecord] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Start address of the block.
    pub fn entry_pc(&self) -> Option<u64> {
        self.0.first().map(|inst| inst.pc)
    }

    /// Whether the block ends in a control-flow instruction rather than at
    /// the end of the trace.
    pub fn is_terminated(&self) -> bool {
        self.0.last().is_some_and(|inst| is_branch(&inst.asm))
    }
}

#[derive(Debug, Clone, Copy)]
struct BlockStat {
    count: usize,
    first_seen: usize,
}

/// Occurrence counts of distinct basic blocks.
#[derive(Debug, Clone, Default)]
pub struct BlockCounter {
    blocks: HashMap<BasicBlock, BlockStat>,
    total: usize,
}

impl BlockCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one occurrence of `block`.
    pub fn add(&mut self, block: BasicBlock) {
        let first_seen = self.blocks.len();
        self.blocks
            .entry(block)
            .or_insert(BlockStat {
                count: 0,
                first_seen,
            })
            .count += 1;
        self.total += 1;
    }

    pub fn count(&self, block: &BasicBlock) -> usize {
        self.blocks.get(block).map_or(0, |stat| stat.count)
    }

    /// Number of distinct blocks.
    pub fn distinct(&self) -> usize {
        self.blocks.len()
    }

    /// Number of block occurrences across the whole trace.
    pub fn total(&self) -> usize {
        self.total
    }

    /// The `k` most frequent blocks, by descending count. Equal counts keep
    /// the order in which the blocks were first seen.
    pub fn most_common(&self, k: usize) -> Vec<(&BasicBlock, usize)> {
        let mut ranked: Vec<_> = self.blocks.iter().collect();
        ranked.sort_by_key(|(_, stat)| (std::cmp::Reverse(stat.count), stat.first_seen));
        ranked
            .into_iter()
            .take(k)
            .map(|(block, stat)| (block, stat.count))
            .collect()
    }
}

/// Splits a commit stream into basic blocks and counts them.
pub struct BlockExtractor {
    progress: bool,
}

impl BlockExtractor {
    pub fn new() -> Self {
        Self { progress: false }
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Partition `records` into blocks in order. A trailing run without a
    /// terminating branch becomes a block of its own.
    pub fn split(&self, records: &[InstRecord]) -> Vec<BasicBlock> {
        let bar = progress_bar(records.len() as u64, "Analyzing Traces", self.progress);
        let mut blocks = Vec::new();
        let mut current = Vec::new();

        for record in records {
            current.push(record.clone());
            if is_branch(&record.asm) {
                blocks.push(BasicBlock::new(std::mem::take(&mut current)));
            }
            bar.inc(1);
        }
        if !current.is_empty() {
            blocks.push(BasicBlock::new(current));
        }
        bar.finish_and_clear();

        blocks
    }

    /// Count every distinct block in `records`.
    pub fn extract(&self, records: &[InstRecord]) -> BlockCounter {
        let mut counter = BlockCounter::new();
        for block in self.split(records) {
            counter.add(block);
        }
        debug!(
            "{} blocks, {} distinct",
            counter.total(),
            counter.distinct()
        );
        counter
    }
}

impl Default for BlockExtractor {
    fn default() -> Self {
        Self::new()
    }
}
