mod adapter;
mod quality;
mod trim;

use std::sync::Arc;

use serde::Serialize;
use crate::fastq::Record;
use crate::config::{Config, QualityMode};
use self::adapter::AdapterFilter;
use self::quality::{NewMethodQuality, StandardQuality};
use self::trim::FixedTrimmer;

/// Why a read was dropped, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Rejection {
    TrimmedAway,
    Adapter,
    ContainsN,
    LowQuality,
}

#[derive(Debug, Default, Serialize, Clone, PartialEq)]
pub struct Report {
    pub total_reads: u64,
    pub passed_reads: u64,
    pub failed_trimmed_away: u64,
    pub failed_adapter: u64,
    pub failed_n: u64,
    pub failed_low_quality: u64,
    pub passed_bases: u64,
    pub se_reads: u64,
    pub pe_pairs: u64,
    pub dropped_pairs: u64,
}

impl Report {
    pub fn merge(&mut self, other: &Report) {
        self.total_reads += other.total_reads;
        self.passed_reads += other.passed_reads;
        self.failed_trimmed_away += other.failed_trimmed_away;
        self.failed_adapter += other.failed_adapter;
        self.failed_n += other.failed_n;
        self.failed_low_quality += other.failed_low_quality;
        self.passed_bases += other.passed_bases;
        self.se_reads += other.se_reads;
        self.pe_pairs += other.pe_pairs;
        self.dropped_pairs += other.dropped_pairs;
    }

    /// Tallies one pipeline verdict.
    pub fn count(&mut self, verdict: &Result<Record, Rejection>) {
        self.total_reads += 1;
        match verdict {
            Ok(rec) => {
                self.passed_reads += 1;
                self.passed_bases += rec.len() as u64;
            }
            Err(Rejection::TrimmedAway) => self.failed_trimmed_away += 1,
            Err(Rejection::Adapter) => self.failed_adapter += 1,
            Err(Rejection::ContainsN) => self.failed_n += 1,
            Err(Rejection::LowQuality) => self.failed_low_quality += 1,
        }
    }
}

/// The per-read decision function: fixed trim, adapter, N, then quality.
#[derive(Clone)]
pub struct Filter {
    config: Arc<Config>,
}

impl Filter {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    /// `Ok` carries the trimmed read; `Err` names the stage that dropped it.
    pub fn process(&self, mut rec: Record) -> Result<Record, Rejection> {
        if !FixedTrimmer::trim(&mut rec, self.config.trim5, self.config.trim3) {
            return Err(Rejection::TrimmedAway);
        }

        if self.config.strip_adapters && AdapterFilter::has_adapter(&rec) {
            return Err(Rejection::Adapter);
        }

        if self.config.no_n && rec.seq().iter().any(|&b| b == b'N' || b == b'n') {
            return Err(Rejection::ContainsN);
        }

        let passed = match self.config.quality {
            None => true,
            Some(QualityMode::Standard { threshold }) => StandardQuality::apply(&mut rec, threshold),
            Some(QualityMode::NewMethod { threshold }) => NewMethodQuality::apply(&mut rec, threshold),
        };
        if !passed {
            return Err(Rejection::LowQuality);
        }
        Ok(rec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::adapter::{reverse_complement, ADAPTERS};

    fn rec(seq: &[u8], score: u8) -> Record {
        Record::new("r", seq.to_vec(), vec![score + 33; seq.len()], 33).unwrap()
    }

    fn filter(edit: impl FnOnce(&mut Config)) -> Filter {
        let mut config = Config::for_tests("work");
        edit(&mut config);
        Filter::new(Arc::new(config))
    }

    #[test]
    fn test_no_filters_passes_unchanged() {
        let f = filter(|_| {});
        let out = f.process(rec(b"ACGTN", 2)).unwrap();
        assert_eq!(out.seq(), b"ACGTN");
    }

    #[test]
    fn test_fixed_trim_runs_first() {
        let f = filter(|c| {
            c.trim5 = 2;
            c.trim3 = 1;
            c.no_n = true;
        });
        // the only N sits in the trimmed tail
        let out = f.process(rec(b"GGACGTN", 30)).unwrap();
        assert_eq!(out.seq(), b"ACGT");
        assert_eq!(out.qual().len(), 4);

        assert_eq!(f.process(rec(b"ACG", 30)).unwrap_err(), Rejection::TrimmedAway);
    }

    #[test]
    fn test_n_filter_ignores_quality() {
        let f = filter(|c| {
            c.no_n = true;
            c.quality = Some(QualityMode::Standard { threshold: 0 });
        });
        let mut seq = vec![b'A'; 60];
        seq[30] = b'N';
        assert_eq!(f.process(rec(&seq, 40)).unwrap_err(), Rejection::ContainsN);
    }

    #[test]
    fn test_adapter_filter_only_when_enabled() {
        let adapter = ADAPTERS[0];
        assert!(filter(|_| {}).process(rec(adapter, 40)).is_ok());
        let f = filter(|c| c.strip_adapters = true);
        assert_eq!(f.process(rec(adapter, 40)).unwrap_err(), Rejection::Adapter);
        assert_eq!(f.process(rec(&reverse_complement(adapter), 40)).unwrap_err(), Rejection::Adapter);
    }

    #[test]
    fn test_quality_algorithm_dispatch() {
        let standard = filter(|c| c.quality = Some(QualityMode::Standard { threshold: 20 }));
        let new = filter(|c| c.quality = Some(QualityMode::NewMethod { threshold: 20 }));

        let out = standard.process(rec(&[b'A'; 40], 40)).unwrap();
        assert_eq!(out.len(), 40);
        let out = new.process(rec(&[b'A'; 40], 40)).unwrap();
        assert_eq!(out.len(), 39);

        assert_eq!(standard.process(rec(&[b'A'; 40], 10)).unwrap_err(), Rejection::LowQuality);
    }

    #[test]
    fn test_lengths_stay_in_lockstep() {
        let f = filter(|c| {
            c.trim5 = 3;
            c.trim3 = 4;
            c.quality = Some(QualityMode::Standard { threshold: 20 });
        });
        let mut qual = vec![b'I'; 60];
        qual[55] = b'#';
        let input = Record::new("r", vec![b'C'; 60], qual, 33).unwrap();
        let out = f.process(input).unwrap();
        assert_eq!(out.seq().len(), out.qual().len());
        assert_eq!(out.qual().len(), out.nqual().len());
        // the low base now ends the read and is cut by the 3' scan
        assert_eq!(out.len(), 52);
    }

    #[test]
    fn test_report_counts_verdicts() {
        let f = filter(|c| c.no_n = true);
        let mut report = Report::default();
        report.count(&f.process(rec(b"ACGT", 30)));
        report.count(&f.process(rec(b"ANGT", 30)));

        let mut total = Report::default();
        total.merge(&report);
        total.merge(&report);
        assert_eq!(total.total_reads, 4);
        assert_eq!(total.passed_reads, 2);
        assert_eq!(total.failed_n, 2);
        assert_eq!(total.passed_bases, 8);
    }
}
