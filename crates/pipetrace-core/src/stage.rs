//! Pipeline stages recorded for every committed instruction.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of stage timestamps carried by each trace row.
pub const STAGE_COUNT: usize = 11;

/// A stage of the simulated out-of-order pipeline.
///
/// The declaration order is the order in which the trace records the stage
/// timestamps, and therefore the order in which they are differenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Stage {
    Fetch,
    Decode,
    Rename,
    Dispatch,
    Issue,
    Arbitrate,
    RegRead,
    Execute,
    Bypass,
    Writeback,
    Commit,
}

impl Stage {
    /// All stages in trace order.
    pub const ALL: [Stage; STAGE_COUNT] = [
        Stage::Fetch,
        Stage::Decode,
        Stage::Rename,
        Stage::Dispatch,
        Stage::Issue,
        Stage::Arbitrate,
        Stage::RegRead,
        Stage::Execute,
        Stage::Bypass,
        Stage::Writeback,
        Stage::Commit,
    ];

    /// Single character code used in the timeline listing.
    pub fn short_code(self) -> char {
        match self {
            Stage::Fetch => 'f',
            Stage::Decode => 'd',
            Stage::Rename => 'r',
            Stage::Dispatch => 'D',
            Stage::Issue => 'i',
            Stage::Arbitrate => 'a',
            Stage::RegRead => 'g',
            Stage::Execute => 'e',
            Stage::Bypass => 'b',
            Stage::Writeback => 'w',
            Stage::Commit => 'c',
        }
    }

    /// Column header name.
    pub fn long_name(self) -> &'static str {
        match self {
            Stage::Fetch => "fetch",
            Stage::Decode => "decode",
            Stage::Rename => "rename",
            Stage::Dispatch => "dispatch",
            Stage::Issue => "issue",
            Stage::Arbitrate => "arb",
            Stage::RegRead => "read",
            Stage::Execute => "execute",
            Stage::Bypass => "bypass",
            Stage::Writeback => "writeback",
            Stage::Commit => "commit",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Stage> {
        Self::ALL.get(index).copied()
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.long_name())
    }
}
