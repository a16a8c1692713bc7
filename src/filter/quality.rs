use crate::fastq::Record;

/// Shortest read either quality algorithm lets through.
pub const MIN_TRIMMED_LEN: usize = 31;

/// Window width scanned for runs of low-quality bases.
const WINDOW: usize = 3;

pub struct StandardQuality;

impl StandardQuality {
    /// Mean check, 3' cut to the last base at or above `threshold`,
    /// length check, then rejection of any all-low 3-base window.
    pub fn apply(rec: &mut Record, threshold: i32) -> bool {
        match rec.mean_quality() {
            Some(mean) if mean > threshold as f64 => {}
            _ => return false,
        }

        let last_good = match rec.nqual().iter().rposition(|&q| q >= threshold) {
            Some(k) => k,
            None => return false,
        };
        rec.truncate(last_good + 1);
        if rec.len() < MIN_TRIMMED_LEN {
            return false;
        }

        !rec.nqual().windows(WINDOW).any(|w| w.iter().all(|&q| q < threshold))
    }
}

pub struct NewMethodQuality;

impl NewMethodQuality {
    /// Cuts at the rightmost centre `i >= 30` of a 3-base window whose scores
    /// are all at or above `threshold`, then requires the mean to exceed it.
    pub fn apply(rec: &mut Record, threshold: i32) -> bool {
        let scores = rec.nqual();
        if scores.len() < WINDOW {
            return false;
        }
        let last = scores.len() - 2;
        let ok = (MIN_TRIMMED_LEN - 2..=last)
            .rev()
            .find(|&i| scores[i - 1..=i + 1].iter().all(|&q| q >= threshold));

        let ok = match ok {
            Some(i) if i + 1 >= MIN_TRIMMED_LEN => i,
            _ => return false,
        };
        rec.truncate(ok + 1);

        match rec.mean_quality() {
            Some(mean) => mean > threshold as f64,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn rec_from_scores(scores: &[u8]) -> Record {
        let qual: Vec<u8> = scores.iter().map(|&s| s + 33).collect();
        Record::new("r", vec![b'A'; qual.len()], qual, 33).unwrap()
    }

    #[rstest]
    #[case(31)]
    #[case(50)]
    #[case(150)]
    fn test_standard_uniform_high_quality_is_untouched(#[case] len: usize) {
        let mut r = rec_from_scores(&vec![40; len]);
        assert!(StandardQuality::apply(&mut r, 20));
        assert_eq!(r.len(), len);
        assert_eq!(r.seq().len(), len);
        assert_eq!(r.qual().len(), len);
    }

    #[test]
    fn test_standard_cuts_low_tail() {
        let mut scores = vec![40u8; 40];
        scores.extend_from_slice(&[5, 5, 5, 5, 5]);
        let mut r = rec_from_scores(&scores);
        assert!(StandardQuality::apply(&mut r, 20));
        assert_eq!(r.len(), 40);
        assert_eq!(r.qual().len(), 40);
    }

    #[test]
    fn test_standard_rejects_low_mean() {
        let mut r = rec_from_scores(&vec![20; 40]);
        assert!(!StandardQuality::apply(&mut r, 20));
    }

    #[test]
    fn test_standard_rejects_short_after_cut() {
        let mut scores = vec![40u8; 30];
        scores.extend_from_slice(&[2; 4]);
        let mut r = rec_from_scores(&scores);
        assert!(!StandardQuality::apply(&mut r, 20));
    }

    #[test]
    fn test_standard_rejects_internal_low_window() {
        let mut scores = vec![40u8; 40];
        scores[10] = 5;
        scores[11] = 5;
        scores[12] = 5;
        let mut r = rec_from_scores(&scores);
        assert!(!StandardQuality::apply(&mut r, 20));

        // Two low bases in a row are tolerated.
        let mut scores = vec![40u8; 40];
        scores[10] = 5;
        scores[11] = 5;
        let mut r = rec_from_scores(&scores);
        assert!(StandardQuality::apply(&mut r, 20));
    }

    #[rstest]
    #[case(0)]
    #[case(3)]
    #[case(30)]
    #[case(31)]
    fn test_new_method_rejects_short_reads(#[case] len: usize) {
        let mut r = rec_from_scores(&vec![40; len]);
        assert!(!NewMethodQuality::apply(&mut r, 20));
    }

    #[test]
    fn test_new_method_keeps_up_to_window_centre() {
        let mut r = rec_from_scores(&vec![40; 50]);
        assert!(NewMethodQuality::apply(&mut r, 20));
        // rightmost centre is len - 2, kept inclusively
        assert_eq!(r.len(), 49);
        assert_eq!(r.seq().len(), 49);
    }

    #[test]
    fn test_new_method_cuts_at_last_good_window() {
        let mut scores = vec![40u8; 40];
        scores.extend_from_slice(&[40, 5, 40, 5, 40, 5, 5, 5]);
        let mut r = rec_from_scores(&scores);
        assert!(NewMethodQuality::apply(&mut r, 20));
        // last all-good window is centred on index 39
        assert_eq!(r.len(), 40);
    }

    #[test]
    fn test_new_method_rejects_when_no_window_past_30() {
        let mut scores = vec![40u8; 29];
        scores.extend_from_slice(&[5; 20]);
        let mut r = rec_from_scores(&scores);
        assert!(!NewMethodQuality::apply(&mut r, 20));
    }

    #[test]
    fn test_new_method_rejects_low_mean_after_cut() {
        let mut scores = vec![10u8; 30];
        scores.extend_from_slice(&[30; 10]);
        let mut r = rec_from_scores(&scores);
        assert!(!NewMethodQuality::apply(&mut r, 20));
    }
}
