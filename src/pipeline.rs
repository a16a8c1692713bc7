//! Whole-run orchestration: partition the inputs, schedule the blocks,
//! merge, and tidy the work dir.

use std::fs;
use std::sync::Arc;

use log::{debug, info, warn};

use crate::block::merge::{ConcatMerger, Merger};
use crate::block::partition::{discover_blocks, LinePartitioner, Partitioner, MATE1_TAG, MATE2_TAG};
use crate::block::scheduler::{RunSummary, Scheduler};
use crate::config::Config;
use crate::error::{PrepError, Result};

pub fn run(config: Arc<Config>) -> Result<RunSummary> {
    let partitioner = LinePartitioner::new(config.block_size);
    let merger = ConcatMerger::new(config.compression);
    run_with(config, &partitioner, merger)
}

pub fn run_with<P: Partitioner, M: Merger>(config: Arc<Config>, partitioner: &P, merger: M) -> Result<RunSummary> {
    let work_dir = &config.work_dir;
    fs::create_dir_all(work_dir).map_err(|e| PrepError::io(work_dir, e))?;
    if let Some(stale) = discover_blocks(work_dir, false)?.first() {
        return Err(PrepError::Config(format!(
            "work dir {} already holds blocks from another run (e.g. {}); clear it or pass a new --work-dir",
            work_dir.display(),
            stale.mate1.display()
        )));
    }

    let n1 = partitioner.partition(&config.in1, work_dir, MATE1_TAG)?;
    info!("Split {} into {} block(s)", config.in1.display(), n1);
    if let Some(in2) = &config.in2 {
        let n2 = partitioner.partition(in2, work_dir, MATE2_TAG)?;
        info!("Split {} into {} block(s)", in2.display(), n2);
    }

    let mut scheduler = Scheduler::new(config.clone(), merger);
    let summary = scheduler.run()?;
    debug!("Scheduler finished in state {:?}", scheduler.state());

    if !config.keep_work_dir {
        if let Err(e) = fs::remove_dir(work_dir) {
            warn!("Could not remove work dir {}: {}", work_dir.display(), e);
        }
    }
    Ok(summary)
}
