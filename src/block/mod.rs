pub mod merge;
pub mod partition;
pub mod scheduler;
pub mod worker;

use std::path::PathBuf;

/// Width of the zero-padded ordinal in block file names.
pub const ORDINAL_WIDTH: usize = 6;

/// One record-aligned partition of the input, owned by a single worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub ordinal: u64,
    pub mate1: PathBuf,
    pub mate2: Option<PathBuf>,
}

impl Block {
    /// Zero-padded ordinal; sorts the same way as the ordinal itself.
    pub fn label(&self) -> String {
        block_label(self.ordinal)
    }
}

pub fn block_label(ordinal: u64) -> String {
    format!("{ordinal:0width$}", width = ORDINAL_WIDTH)
}
