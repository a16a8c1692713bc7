use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use crossbeam::channel::{bounded, unbounded, Receiver, Sender};
use log::{debug, error, info, warn};
use serde::Serialize;

use super::merge::Merger;
use super::partition::discover_blocks;
use super::worker::{BlockOutput, BlockWorker};
use super::Block;
use crate::config::Config;
use crate::error::{PrepError, Result};
use crate::filter::Report;
use crate::pair::Sink;
use crate::threading::{BlockOutcome, BlockTask};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SchedulerState {
    Idle,
    Launching,
    AwaitingCompletion,
    Merging,
    Done,
    Failed,
}

/// How a block ended, as recorded in the run summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum BlockStatus {
    Ok,
    Failed { kind: String, message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct BlockSummary {
    pub block: String,
    pub elapsed_secs: f64,
    pub reads: u64,
    #[serde(flatten)]
    pub status: BlockStatus,
}

/// Everything a finished run reports: per-block timings, merged counters,
/// and the final files.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub blocks: Vec<BlockSummary>,
    pub report: Report,
    pub outputs: Vec<PathBuf>,
    pub elapsed_secs: f64,
}

/// Fans blocks out to a bounded pool of workers, waits for all of them,
/// then merges their outputs in ordinal order.
pub struct Scheduler<M: Merger> {
    config: Arc<Config>,
    merger: M,
    state: SchedulerState,
}

impl<M: Merger> Scheduler<M> {
    pub fn new(config: Arc<Config>, merger: M) -> Self {
        Self { config, merger, state: SchedulerState::Idle }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    fn transition(&mut self, next: SchedulerState) {
        debug!("Scheduler {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Final file for one output category, named from the run prefix.
    pub fn final_path(&self, sink: Sink) -> PathBuf {
        let category = match sink {
            Sink::Se => "se",
            Sink::Pe => "pe",
            Sink::Pe2 => "pe2",
        };
        let mut name = format!("{}.{}.{}", self.config.out_prefix, category, self.config.output_format.extension());
        if self.config.compression > 0 {
            name.push_str(".gz");
        }
        PathBuf::from(name)
    }

    /// Processes every block found in the work dir and merges the results.
    pub fn run(&mut self) -> Result<RunSummary> {
        let start = Instant::now();
        let blocks = discover_blocks(&self.config.work_dir, self.config.is_paired())?;
        info!("Found {} block(s) in {}", blocks.len(), self.config.work_dir.display());

        let outcomes = self.run_blocks(blocks);

        let mut outputs = Vec::with_capacity(outcomes.len());
        let mut summaries = Vec::with_capacity(outcomes.len());
        let mut failed = Vec::new();
        for outcome in outcomes {
            let elapsed_secs = outcome.elapsed.as_secs_f64();
            match outcome.result {
                Ok(output) => {
                    summaries.push(BlockSummary {
                        block: outcome.label,
                        elapsed_secs,
                        reads: output.report.total_reads,
                        status: BlockStatus::Ok,
                    });
                    outputs.push(output);
                }
                Err(e) => {
                    failed.push((outcome.label.clone(), format!("{}: {}", e.kind(), e)));
                    summaries.push(BlockSummary {
                        block: outcome.label,
                        elapsed_secs,
                        reads: 0,
                        status: BlockStatus::Failed { kind: e.kind().to_string(), message: e.to_string() },
                    });
                }
            }
        }
        if !failed.is_empty() {
            self.transition(SchedulerState::Failed);
            return Err(PrepError::BlocksFailed { failed, blocks: summaries });
        }

        self.transition(SchedulerState::Merging);
        let mut report = Report::default();
        for output in &outputs {
            report.merge(&output.report);
        }
        let finals = match self.merge_outputs(&outputs) {
            Ok(finals) => finals,
            Err(e) => {
                self.transition(SchedulerState::Failed);
                return Err(e);
            }
        };
        self.transition(SchedulerState::Done);

        Ok(RunSummary { blocks: summaries, report, outputs: finals, elapsed_secs: start.elapsed().as_secs_f64() })
    }

    /// Runs the blocks on `config.threads` pool threads. Returns one outcome
    /// per block, sorted by ordinal, whatever order they finished in.
    pub fn run_blocks(&mut self, blocks: Vec<Block>) -> Vec<BlockOutcome> {
        self.transition(SchedulerState::Launching);
        let thread_num = self.config.threads.max(1).min(blocks.len().max(1));
        let (tx_task, rx_task): (Sender<BlockTask>, Receiver<BlockTask>) = bounded(thread_num * 2);
        let (tx_out, rx_out): (Sender<BlockOutcome>, Receiver<BlockOutcome>) = unbounded();

        let mut workers = Vec::with_capacity(thread_num);
        for _ in 0..thread_num {
            let rx = rx_task.clone();
            let tx = tx_out.clone();
            let worker = BlockWorker::new(self.config.clone());
            workers.push(thread::spawn(move || {
                while let Ok(task) = rx.recv() {
                    let start = Instant::now();
                    let result = worker.run(&task.block);
                    let outcome = BlockOutcome {
                        ordinal: task.block.ordinal,
                        label: task.block.label(),
                        elapsed: start.elapsed(),
                        result,
                    };
                    if tx.send(outcome).is_err() {
                        break;
                    }
                }
            }));
        }
        drop(rx_task);
        drop(tx_out);

        let launched: Vec<(u64, String)> = blocks.iter().map(|b| (b.ordinal, b.label())).collect();
        for block in blocks {
            if tx_task.send(BlockTask { block }).is_err() {
                break;
            }
        }
        drop(tx_task);
        self.transition(SchedulerState::AwaitingCompletion);

        let mut outcomes = Vec::with_capacity(launched.len());
        for outcome in rx_out {
            match &outcome.result {
                Ok(output) => info!(
                    "Block {} done: {} reads in, {} passed, {:.2}s",
                    outcome.label,
                    output.report.total_reads,
                    output.report.passed_reads,
                    outcome.elapsed.as_secs_f64()
                ),
                Err(e) => error!(
                    "Block {} failed after {:.2}s ({}): {}",
                    outcome.label,
                    outcome.elapsed.as_secs_f64(),
                    e.kind(),
                    e
                ),
            }
            outcomes.push(outcome);
        }
        for w in workers {
            if w.join().is_err() {
                error!("A worker thread panicked");
            }
        }

        // Blocks whose worker died without reporting still count as failed.
        let seen: HashSet<u64> = outcomes.iter().map(|o| o.ordinal).collect();
        for (ordinal, label) in launched {
            if !seen.contains(&ordinal) {
                outcomes.push(BlockOutcome {
                    ordinal,
                    label: label.clone(),
                    elapsed: Default::default(),
                    result: Err(PrepError::WorkerLost(label)),
                });
            }
        }
        outcomes.sort_by_key(|o| o.ordinal);
        outcomes
    }

    /// Merges every category before removing any block part, so a failed
    /// merge leaves all parts in the work dir.
    fn merge_outputs(&self, outputs: &[BlockOutput]) -> Result<Vec<PathBuf>> {
        let mut categories = vec![(Sink::Se, outputs.iter().map(|o| o.se.clone()).collect::<Vec<_>>())];
        if self.config.is_paired() {
            categories.push((Sink::Pe, outputs.iter().filter_map(|o| o.pe.clone()).collect()));
            if self.config.separate_pe_output {
                categories.push((Sink::Pe2, outputs.iter().filter_map(|o| o.pe2.clone()).collect()));
            }
        }

        let mut finals = Vec::with_capacity(categories.len());
        for (sink, parts) in &categories {
            let dest = self.final_path(*sink);
            self.merger.merge(parts, &dest)?;
            info!("Wrote {} ({} block(s))", dest.display(), parts.len());
            finals.push(dest);
        }
        for part in categories.iter().flat_map(|(_, parts)| parts) {
            remove_part(part);
        }
        Ok(finals)
    }
}

fn remove_part(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        warn!("Could not remove {}: {}", path.display(), e);
    }
}
