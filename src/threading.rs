use std::time::Duration;

use crate::block::worker::BlockOutput;
use crate::block::Block;
use crate::error::Result;

/// Work item handed to the pool: one block to process end to end.
pub struct BlockTask {
    pub block: Block,
}

/// What a pool thread sends back once its block is done, success or not.
pub struct BlockOutcome {
    pub ordinal: u64,
    pub label: String,
    pub elapsed: Duration,
    pub result: Result<BlockOutput>,
}

// Outcomes arrive in completion order; the scheduler sorts them by ordinal
// before merging so finishing order never shows in the output.
