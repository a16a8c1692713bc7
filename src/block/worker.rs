use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, warn};

use super::Block;
use crate::config::{Config, OutputFormat};
use crate::error::{PrepError, Result};
use crate::fastq::{Reader, Record, Writer};
use crate::filter::{Filter, Report};
use crate::pair::{route_single, PairOutcome, PairedReader, Sink};

/// Files a finished block left in the work dir, plus its tallies.
#[derive(Debug)]
pub struct BlockOutput {
    pub ordinal: u64,
    pub se: PathBuf,
    pub pe: Option<PathBuf>,
    pub pe2: Option<PathBuf>,
    pub report: Report,
}

pub fn output_path(dir: &Path, label: &str, sink: Sink) -> PathBuf {
    let ext = match sink {
        Sink::Se => "se",
        Sink::Pe => "pe",
        Sink::Pe2 => "pe2",
    };
    dir.join(format!("{label}.{ext}"))
}

/// The 1 to 3 output streams of one block. PE2 falls back to PE when
/// mates are not written separately.
struct BlockWriters {
    se: (PathBuf, Writer),
    pe: Option<(PathBuf, Writer)>,
    pe2: Option<(PathBuf, Writer)>,
}

impl BlockWriters {
    fn create(dir: &Path, label: &str, format: OutputFormat, paired: bool, separate: bool) -> Result<Self> {
        let open = |sink: Sink| -> Result<(PathBuf, Writer)> {
            let path = output_path(dir, label, sink);
            let w = Writer::create(&path, format)?;
            Ok((path, w))
        };
        let se = open(Sink::Se)?;
        let pe = if paired { Some(open(Sink::Pe)?) } else { None };
        let pe2 = if paired && separate { Some(open(Sink::Pe2)?) } else { None };
        Ok(Self { se, pe, pe2 })
    }

    fn write(&mut self, sink: Sink, rec: &Record) -> Result<()> {
        let target = match sink {
            Sink::Se => Some(&mut self.se),
            Sink::Pe => self.pe.as_mut(),
            Sink::Pe2 => match self.pe2.as_mut() {
                Some(pe2) => Some(pe2),
                None => self.pe.as_mut(),
            },
        };
        let (path, w) = target.ok_or_else(|| PrepError::Config(format!("no {sink:?} stream in single-end mode")))?;
        w.write_record(rec).map_err(|e| PrepError::io(path.as_path(), e))
    }

    fn finish(self, ordinal: u64, report: Report) -> Result<BlockOutput> {
        let BlockWriters { se, pe, pe2 } = self;
        let se = flush_stream(se)?;
        let pe = pe.map(flush_stream).transpose()?;
        let pe2 = pe2.map(flush_stream).transpose()?;
        Ok(BlockOutput { ordinal, se, pe, pe2, report })
    }
}

fn flush_stream((path, mut w): (PathBuf, Writer)) -> Result<PathBuf> {
    w.flush().map_err(|e| PrepError::io(&path, e))?;
    Ok(path)
}

/// Runs one block through read, filter, route and write.
pub struct BlockWorker {
    config: Arc<Config>,
    filter: Filter,
}

impl BlockWorker {
    pub fn new(config: Arc<Config>) -> Self {
        let filter = Filter::new(config.clone());
        Self { config, filter }
    }

    /// On success the block's input files are removed. On failure its partial
    /// outputs are removed and the inputs are left for a rerun.
    pub fn run(&self, block: &Block) -> Result<BlockOutput> {
        let label = block.label();
        let mut writers = BlockWriters::create(
            &self.config.work_dir,
            &label,
            self.config.output_format,
            block.mate2.is_some(),
            self.config.separate_pe_output,
        )?;

        let streamed = match &block.mate2 {
            None => self.run_single(block, &mut writers),
            Some(mate2) => self.run_paired(block, mate2, &label, &mut writers),
        };
        let finished = match streamed {
            Ok(report) => writers.finish(block.ordinal, report),
            Err(e) => {
                drop(writers);
                Err(e)
            }
        };

        match finished {
            Ok(output) => {
                remove_file(&block.mate1);
                if let Some(mate2) = &block.mate2 {
                    remove_file(mate2);
                }
                Ok(output)
            }
            Err(e) => {
                for path in partial_outputs(&self.config.work_dir, &label) {
                    remove_file(&path);
                }
                Err(e)
            }
        }
    }

    fn run_single(&self, block: &Block, writers: &mut BlockWriters) -> Result<Report> {
        let mut reader = Reader::open(&block.mate1, self.config.quality_offset)?;
        let mut report = Report::default();
        while let Some(rec) = reader.next_record()? {
            let verdict = self.filter.process(rec);
            report.count(&verdict);
            if let Some((sink, rec)) = route_single(verdict.ok()) {
                writers.write(sink, &rec)?;
                report.se_reads += 1;
            }
        }
        Ok(report)
    }

    fn run_paired(&self, block: &Block, mate2: &Path, label: &str, writers: &mut BlockWriters) -> Result<Report> {
        let offset = self.config.quality_offset;
        let mut pairs = PairedReader::new(Reader::open(&block.mate1, offset)?, Reader::open(mate2, offset)?, label);
        let mut report = Report::default();
        while let Some((r1, r2)) = pairs.next_pair()? {
            let outcome = self.judge_pair(r1, r2, &mut report);
            for (sink, rec) in outcome.into_routes(self.config.separate_pe_output) {
                writers.write(sink, &rec)?;
            }
        }
        Ok(report)
    }

    fn judge_pair(&self, r1: Record, r2: Record, report: &mut Report) -> PairOutcome {
        let v1 = self.filter.process(r1);
        let v2 = self.filter.process(r2);
        report.count(&v1);
        report.count(&v2);
        let outcome = PairOutcome::from_mates(v1.ok(), v2.ok());
        match &outcome {
            PairOutcome::BothAccepted(..) => report.pe_pairs += 1,
            PairOutcome::OnlyFirst(_) | PairOutcome::OnlySecond(_) => report.se_reads += 1,
            PairOutcome::NeitherAccepted => report.dropped_pairs += 1,
        }
        outcome
    }
}

fn partial_outputs(dir: &Path, label: &str) -> Vec<PathBuf> {
    [Sink::Se, Sink::Pe, Sink::Pe2].iter().map(|&s| output_path(dir, label, s)).filter(|p| p.exists()).collect()
}

fn remove_file(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!("Removed {}", path.display()),
        Err(e) => warn!("Could not remove {}: {}", path.display(), e),
    }
}
