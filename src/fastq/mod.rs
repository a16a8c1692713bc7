use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::fs::File;
use std::path::{Path, PathBuf};
use flate2::read::MultiGzDecoder;

use crate::config::OutputFormat;
use crate::error::{PrepError, Result};

/// One sequencing read with its quality string and numeric scores.
///
/// Trimming never copies: the record keeps the parsed arrays and a
/// `[start, end)` view over them, so `seq`, `qual` and `nqual` always
/// have the same length.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: String,
    seq: Vec<u8>,
    qual: Vec<u8>,
    nqual: Vec<i32>,
    start: usize,
    end: usize,
}

impl Record {
    /// Builds a record, deriving scores as `qual[i] - offset`.
    /// Returns `None` when sequence and quality lengths differ.
    pub fn new(id: impl Into<String>, seq: Vec<u8>, qual: Vec<u8>, offset: i32) -> Option<Self> {
        if seq.len() != qual.len() {
            return None;
        }
        let nqual = qual.iter().map(|&q| q as i32 - offset).collect();
        let end = seq.len();
        Some(Self { id: id.into(), seq, qual, nqual, start: 0, end })
    }

    pub fn seq(&self) -> &[u8] { &self.seq[self.start..self.end] }
    pub fn qual(&self) -> &[u8] { &self.qual[self.start..self.end] }
    pub fn nqual(&self) -> &[i32] { &self.nqual[self.start..self.end] }

    pub fn len(&self) -> usize { self.end - self.start }
    pub fn is_empty(&self) -> bool { self.start == self.end }

    /// Drops up to `n` positions from the 5' end.
    pub fn trim_front(&mut self, n: usize) {
        self.start = self.start.saturating_add(n).min(self.end);
    }

    /// Drops up to `n` positions from the 3' end.
    pub fn trim_tail(&mut self, n: usize) {
        self.end = self.end.saturating_sub(n).max(self.start);
    }

    /// Keeps at most the first `len` positions of the current view.
    pub fn truncate(&mut self, len: usize) {
        if len < self.len() {
            self.end = self.start + len;
        }
    }

    pub fn mean_quality(&self) -> Option<f64> {
        let scores = self.nqual();
        if scores.is_empty() {
            return None;
        }
        Some(scores.iter().map(|&q| q as i64).sum::<i64>() as f64 / scores.len() as f64)
    }
}

pub struct Reader<R: BufRead> {
    reader: R,
    path: PathBuf,
    offset: i32,
    line: u64,
    buf: Vec<u8>,
}

/// Opens a block or raw input file; `.gz` inputs are decompressed.
pub fn open_input(path: &Path) -> Result<Box<dyn BufRead>> {
    let f = File::open(path).map_err(|e| PrepError::io(path, e))?;
    let reader: Box<dyn BufRead> = if path.extension().map_or(false, |e| e == "gz") {
        Box::new(BufReader::new(MultiGzDecoder::new(f)))
    } else {
        Box::new(BufReader::new(f))
    };
    Ok(reader)
}

impl Reader<Box<dyn BufRead>> {
    pub fn open(path: &Path, offset: i32) -> Result<Self> {
        Ok(Reader::new(open_input(path)?, path, offset))
    }
}

impl<R: BufRead> Reader<R> {
    pub fn new(reader: R, path: impl Into<PathBuf>, offset: i32) -> Self {
        Self { reader, path: path.into(), offset, line: 0, buf: Vec::with_capacity(256) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the next 4-line unit. `Ok(None)` only at a clean end of input.
    /// Blank lines before a header are skipped, so trailing ones are harmless.
    pub fn next_record(&mut self) -> Result<Option<Record>> {
        loop {
            if !self.read_line()? {
                return Ok(None);
            }
            if !self.buf.iter().all(u8::is_ascii_whitespace) {
                break;
            }
        }
        let header = trim_newline(&self.buf);
        let header = header.strip_prefix(b"@").unwrap_or(header);
        let id = String::from_utf8_lossy(header).into_owned();

        if !self.read_line()? {
            return Err(self.malformed("missing sequence line"));
        }
        let seq = non_whitespace(&self.buf);

        if !self.read_line()? {
            return Err(self.malformed("missing separator line"));
        }

        if !self.read_line()? {
            return Err(self.malformed("missing quality line"));
        }
        let qual = non_whitespace(&self.buf);

        let (seq_len, qual_len) = (seq.len(), qual.len());
        match Record::new(id, seq, qual, self.offset) {
            Some(rec) => Ok(Some(rec)),
            None => Err(self.malformed(&format!(
                "sequence length {seq_len} does not match quality length {qual_len}"
            ))),
        }
    }

    fn read_line(&mut self) -> Result<bool> {
        self.buf.clear();
        let n = self.reader.read_until(b'\n', &mut self.buf).map_err(|e| PrepError::io(&self.path, e))?;
        if n == 0 {
            return Ok(false);
        }
        self.line += 1;
        Ok(true)
    }

    fn malformed(&self, reason: &str) -> PrepError {
        PrepError::MalformedRecord { path: self.path.clone(), line: self.line, reason: reason.to_string() }
    }
}

fn trim_newline(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn non_whitespace(line: &[u8]) -> Vec<u8> {
    line.iter().copied().filter(|b| !b.is_ascii_whitespace()).collect()
}

pub struct Writer {
    writer: Box<dyn Write + Send>,
    format: OutputFormat,
}

impl Writer {
    pub fn create(path: &Path, format: OutputFormat) -> Result<Self> {
        let f = File::create(path).map_err(|e| PrepError::io(path, e))?;
        Ok(Self::new(Box::new(BufWriter::new(f)), format))
    }

    pub fn new(writer: Box<dyn Write + Send>, format: OutputFormat) -> Self {
        Self { writer, format }
    }

    pub fn write_record(&mut self, rec: &Record) -> io::Result<()> {
        match self.format {
            OutputFormat::Fasta => {
                self.writer.write_all(b">")?; self.writer.write_all(rec.id.as_bytes())?; self.writer.write_all(b"\n")?;
                self.writer.write_all(rec.seq())?; self.writer.write_all(b"\n")?;
            }
            OutputFormat::Fastq => {
                self.writer.write_all(b"@")?; self.writer.write_all(rec.id.as_bytes())?; self.writer.write_all(b"\n")?;
                self.writer.write_all(rec.seq())?; self.writer.write_all(b"\n")?;
                self.writer.write_all(b"+")?; self.writer.write_all(rec.id.as_bytes())?; self.writer.write_all(b"\n")?;
                self.writer.write_all(rec.qual())?; self.writer.write_all(b"\n")?;
            }
        }
        Ok(())
    }
}

impl Write for Writer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> { self.writer.write(buf) }
    fn flush(&mut self) -> io::Result<()> { self.writer.flush() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};

    fn reader(text: &str) -> Reader<Cursor<Vec<u8>>> {
        Reader::new(Cursor::new(text.as_bytes().to_vec()), "test.fq", 33)
    }

    #[test]
    fn test_reads_records_and_scores() {
        let mut r = reader("@read1 extra\nACGT\n+\nII#5\n@read2\nGG\n+read2\n!!\n");
        let rec = r.next_record().unwrap().unwrap();
        assert_eq!(rec.id, "read1 extra");
        assert_eq!(rec.seq(), b"ACGT");
        assert_eq!(rec.qual(), b"II#5");
        assert_eq!(rec.nqual(), &[40, 40, 2, 20]);

        let rec = r.next_record().unwrap().unwrap();
        assert_eq!(rec.id, "read2");
        assert_eq!(rec.nqual(), &[0, 0]);
        assert!(r.next_record().unwrap().is_none());
    }

    #[test]
    fn test_whitespace_is_filtered_from_seq_and_qual() {
        let mut r = reader("@r\nAC GT\r\n+\nII II\r\n");
        let rec = r.next_record().unwrap().unwrap();
        assert_eq!(rec.seq(), b"ACGT");
        assert_eq!(rec.qual(), b"IIII");
    }

    #[test]
    fn test_truncated_unit_is_malformed() {
        let mut r = reader("@r1\nACGT\n+\nIIII\n@r2\nACGT\n");
        assert!(r.next_record().unwrap().is_some());
        let err = r.next_record().unwrap_err();
        assert_eq!(err.kind(), "MalformedRecordError");
        assert!(format!("{err}").contains("separator"));
    }

    #[test]
    fn test_trailing_blank_lines_end_input_cleanly() {
        let mut r = reader("@a\nAC\n+\nII\n\n  \n");
        assert_eq!(r.next_record().unwrap().unwrap().id, "a");
        assert!(r.next_record().unwrap().is_none());
    }

    #[test]
    fn test_blank_sequence_line_is_still_malformed() {
        let err = reader("@a\n\n+\nII\n").next_record().unwrap_err();
        assert_eq!(err.kind(), "MalformedRecordError");
    }

    #[test]
    fn test_length_mismatch_is_malformed() {
        let mut r = reader("@r1\nACGT\n+\nIII\n");
        let err = r.next_record().unwrap_err();
        assert!(format!("{err}").contains("does not match"));
    }

    #[test]
    fn test_empty_input() {
        assert!(reader("").next_record().unwrap().is_none());
    }

    #[test]
    fn test_view_trimming_keeps_arrays_in_lockstep() {
        let mut rec = Record::new("r", b"ACGTACGT".to_vec(), b"ABCDEFGH".to_vec(), 33).unwrap();
        rec.trim_front(0);
        rec.trim_tail(0);
        assert_eq!(rec.len(), 8);

        rec.trim_tail(2);
        rec.trim_front(3);
        assert_eq!(rec.seq(), b"TAC");
        assert_eq!(rec.qual(), b"DEF");
        assert_eq!(rec.nqual().len(), 3);

        rec.truncate(10);
        assert_eq!(rec.len(), 3);
        rec.truncate(1);
        assert_eq!(rec.seq(), b"T");

        rec.trim_front(50);
        assert!(rec.is_empty());
        assert_eq!(rec.qual().len(), 0);
        assert!(rec.mean_quality().is_none());
    }

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> { Ok(()) }
    }

    #[test]
    fn test_writer_formats() {
        let mut rec = Record::new("r1", b"ACGTA".to_vec(), b"IIIII".to_vec(), 33).unwrap();
        rec.trim_tail(1);

        let buf = SharedBuf::default();
        let mut w = Writer::new(Box::new(buf.clone()), OutputFormat::Fasta);
        w.write_record(&rec).unwrap();
        assert_eq!(&*buf.0.lock().unwrap(), b">r1\nACGT\n");

        let buf = SharedBuf::default();
        let mut w = Writer::new(Box::new(buf.clone()), OutputFormat::Fastq);
        w.write_record(&rec).unwrap();
        assert_eq!(&*buf.0.lock().unwrap(), b"@r1\nACGT\n+r1\nIIII\n");
    }
}
