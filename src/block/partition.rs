//! Splitting raw inputs into record-aligned block files, and finding them again.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::debug;

use super::{block_label, Block};
use crate::error::{PrepError, Result};
use crate::fastq::open_input;

pub const LINES_PER_RECORD: usize = 4;
pub const MATE1_TAG: &str = "r1";
pub const MATE2_TAG: &str = "r2";

/// Produces `<tag>.<ordinal>` block files in `dir`, each holding the same
/// number of records, and returns how many were written.
pub trait Partitioner {
    fn partition(&self, input: &Path, dir: &Path, tag: &str) -> Result<u64>;
}

/// Streams the input line by line; a trailing short block holds the rest.
pub struct LinePartitioner {
    records_per_block: usize,
}

impl LinePartitioner {
    pub fn new(records_per_block: usize) -> Self {
        Self { records_per_block }
    }
}

impl Partitioner for LinePartitioner {
    fn partition(&self, input: &Path, dir: &Path, tag: &str) -> Result<u64> {
        let lines_per_block = self.records_per_block.checked_mul(LINES_PER_RECORD).ok_or_else(|| {
            PrepError::Config(format!("block size {} records overflows the line count", self.records_per_block))
        })?;
        let mut reader = open_input(input)?;
        let mut line = Vec::with_capacity(256);
        let mut out: Option<(PathBuf, BufWriter<File>)> = None;
        let mut lines_in_block = 0usize;
        let mut blocks = 0u64;

        loop {
            line.clear();
            let n = reader.read_until(b'\n', &mut line).map_err(|e| PrepError::io(input, e))?;
            if n == 0 {
                break;
            }
            if out.is_none() {
                let path = dir.join(format!("{tag}.{}", block_label(blocks)));
                let f = File::create(&path).map_err(|e| PrepError::io(&path, e))?;
                out = Some((path, BufWriter::new(f)));
                blocks += 1;
            }
            if let Some((path, w)) = out.as_mut() {
                w.write_all(&line).map_err(|e| PrepError::io(path.as_path(), e))?;
            }
            lines_in_block += 1;
            if lines_in_block == lines_per_block {
                if let Some((path, mut w)) = out.take() {
                    w.flush().map_err(|e| PrepError::io(&path, e))?;
                }
                lines_in_block = 0;
            }
        }
        if let Some((path, mut w)) = out.take() {
            w.flush().map_err(|e| PrepError::io(&path, e))?;
        }
        debug!("Partitioned {} into {} block(s) of {} records", input.display(), blocks, self.records_per_block);
        Ok(blocks)
    }
}

fn blocks_with_tag(dir: &Path, tag: &str) -> Result<BTreeMap<u64, PathBuf>> {
    let mut found = BTreeMap::new();
    let prefix = format!("{tag}.");
    for entry in fs::read_dir(dir).map_err(|e| PrepError::io(dir, e))? {
        let entry = entry.map_err(|e| PrepError::io(dir, e))?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let Some(suffix) = name.strip_prefix(&prefix) else { continue };
        if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
            continue;
        }
        if let Ok(ordinal) = suffix.parse::<u64>() {
            found.insert(ordinal, entry.path());
        }
    }
    Ok(found)
}

/// Lists the blocks in `dir` by ordinal. In paired mode every mate-1 block
/// needs a mate-2 block with the same ordinal and vice versa.
pub fn discover_blocks(dir: &Path, paired: bool) -> Result<Vec<Block>> {
    let mate1 = blocks_with_tag(dir, MATE1_TAG)?;
    if !paired {
        return Ok(mate1.into_iter().map(|(ordinal, path)| Block { ordinal, mate1: path, mate2: None }).collect());
    }

    let mut mate2 = blocks_with_tag(dir, MATE2_TAG)?;
    if let Some(&extra) = mate2.keys().find(|k| !mate1.contains_key(k)) {
        return Err(PrepError::PairDesync {
            block: block_label(extra),
            reason: "mate 2 has a block with no mate 1 counterpart".to_string(),
        });
    }
    let mut blocks = Vec::with_capacity(mate1.len());
    for (ordinal, path) in mate1 {
        let Some(mate2_path) = mate2.remove(&ordinal) else {
            return Err(PrepError::PairDesync {
                block: block_label(ordinal),
                reason: "mate 1 has a block with no mate 2 counterpart".to_string(),
            });
        };
        blocks.push(Block { ordinal, mate1: path, mate2: Some(mate2_path) });
    }
    Ok(blocks)
}
