use crate::fastq::Record;

pub struct FixedTrimmer;

impl FixedTrimmer {
    /// Removes `trim3` bases from the tail, then `trim5` from the head.
    /// Returns false when nothing of the read is left.
    pub fn trim(rec: &mut Record, trim5: usize, trim3: usize) -> bool {
        rec.trim_tail(trim3);
        rec.trim_front(trim5);
        !rec.is_empty()
    }
}
