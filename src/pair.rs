//! Routing of filter verdicts to the SE / PE / PE2 streams.

use std::io::BufRead;

use crate::error::{PrepError, Result};
use crate::fastq::{Reader, Record};

/// Output stream a surviving read is written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sink {
    Se,
    Pe,
    Pe2,
}

#[derive(Debug, PartialEq)]
pub enum PairOutcome {
    BothAccepted(Record, Record),
    OnlyFirst(Record),
    OnlySecond(Record),
    NeitherAccepted,
}

impl PairOutcome {
    pub fn from_mates(r1: Option<Record>, r2: Option<Record>) -> Self {
        match (r1, r2) {
            (Some(r1), Some(r2)) => PairOutcome::BothAccepted(r1, r2),
            (Some(r1), None) => PairOutcome::OnlyFirst(r1),
            (None, Some(r2)) => PairOutcome::OnlySecond(r2),
            (None, None) => PairOutcome::NeitherAccepted,
        }
    }

    /// Where each surviving mate goes. Without `separate`, mate 2 of an
    /// accepted pair shares the PE stream with mate 1.
    pub fn into_routes(self, separate: bool) -> Vec<(Sink, Record)> {
        match self {
            PairOutcome::BothAccepted(r1, r2) => {
                let second = if separate { Sink::Pe2 } else { Sink::Pe };
                vec![(Sink::Pe, r1), (second, r2)]
            }
            PairOutcome::OnlyFirst(r) | PairOutcome::OnlySecond(r) => vec![(Sink::Se, r)],
            PairOutcome::NeitherAccepted => Vec::new(),
        }
    }
}

/// Single-end reads that pass go to SE; the rest are dropped.
pub fn route_single(rec: Option<Record>) -> Option<(Sink, Record)> {
    rec.map(|r| (Sink::Se, r))
}

/// Reads mate files in lockstep and fails if either runs out first.
pub struct PairedReader<R1: BufRead, R2: BufRead> {
    mate1: Reader<R1>,
    mate2: Reader<R2>,
    block: String,
}

impl<R1: BufRead, R2: BufRead> PairedReader<R1, R2> {
    pub fn new(mate1: Reader<R1>, mate2: Reader<R2>, block: impl Into<String>) -> Self {
        Self { mate1, mate2, block: block.into() }
    }

    pub fn next_pair(&mut self) -> Result<Option<(Record, Record)>> {
        let r1 = self.mate1.next_record()?;
        let r2 = self.mate2.next_record()?;
        match (r1, r2) {
            (Some(r1), Some(r2)) => Ok(Some((r1, r2))),
            (None, None) => Ok(None),
            (Some(_), None) => Err(self.desync(self.mate2.path().display().to_string())),
            (None, Some(_)) => Err(self.desync(self.mate1.path().display().to_string())),
        }
    }

    fn desync(&self, short: String) -> PrepError {
        PrepError::PairDesync { block: self.block.clone(), reason: format!("'{short}' ran out of records first") }
    }
}
