use bstr::ByteSlice;

use crate::fastq::Record;

/// Illumina paired-end adapter fragments checked in both orientations.
pub const ADAPTERS: [&[u8]; 3] = [
    b"GATCGGAAGAGCTCGTATGCCGTCTTCTGCTTG",
    b"ACACTCTTTCCCTACACGACGCTCTTCCGATCT",
    b"GATCGGAAGAGCGGTTCAGCAGGAATGCCGAG",
];

pub struct AdapterFilter;

impl AdapterFilter {
    /// True when the read, or its reverse complement, contains an adapter.
    pub fn has_adapter(rec: &Record) -> bool {
        let seq = rec.seq();
        if Self::contains_any(seq) {
            return true;
        }
        Self::contains_any(&reverse_complement(seq))
    }

    fn contains_any(seq: &[u8]) -> bool {
        ADAPTERS.iter().any(|adapter| seq.contains_str(adapter))
    }
}

pub fn reverse_complement(seq: &[u8]) -> Vec<u8> {
    seq.iter().rev().map(|&b| complement(b)).collect()
}

fn complement(base: u8) -> u8 {
    match base {
        b'A' => b'T',
        b'T' => b'A',
        b'G' => b'C',
        b'C' => b'G',
        b'a' => b't',
        b't' => b'a',
        b'g' => b'c',
        b'c' => b'g',
        other => other,
    }
}
