//! Error types shared by the reader, workers and scheduler.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::block::scheduler::BlockSummary;

pub type Result<T> = std::result::Result<T, PrepError>;

#[derive(Error, Debug)]
pub enum PrepError {
    /// Invalid or conflicting options, reported before any work starts.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A 4-line FASTQ unit was truncated or inconsistent.
    #[error("Malformed record in '{path}' at line {line}: {reason}")]
    MalformedRecord { path: PathBuf, line: u64, reason: String },

    /// Mate files do not hold the same number of records.
    #[error("Paired files out of sync in block {block}: {reason}")]
    PairDesync { block: String, reason: String },

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A pool thread died before reporting on its block.
    #[error("Worker for block {0} exited without a result")]
    WorkerLost(String),

    /// One or more blocks failed; the merged output would be incomplete.
    /// `blocks` keeps the timing and status of every block in the run.
    #[error("{} block(s) failed: {}", .failed.len(), describe_failures(.failed))]
    BlocksFailed { failed: Vec<(String, String)>, blocks: Vec<BlockSummary> },
}

impl PrepError {
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        PrepError::Io { path: path.as_ref().to_path_buf(), source }
    }

    /// Short name of the error kind, used in logs and the run report.
    pub fn kind(&self) -> &'static str {
        match self {
            PrepError::Config(_) => "ConfigError",
            PrepError::MalformedRecord { .. } => "MalformedRecordError",
            PrepError::PairDesync { .. } => "PairDesyncError",
            PrepError::Io { .. } => "IOError",
            PrepError::WorkerLost(_) => "WorkerLost",
            PrepError::BlocksFailed { .. } => "BlocksFailed",
        }
    }
}

fn describe_failures(failed: &[(String, String)]) -> String {
    failed.iter().map(|(block, msg)| format!("[{block}] {msg}")).collect::<Vec<_>>().join("; ")
}
