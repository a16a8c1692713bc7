//! Ordered concatenation of per-block outputs into the final files.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::{PrepError, Result};

/// Concatenates `parts`, already sorted by block ordinal, into `dest`.
pub trait Merger {
    fn merge(&self, parts: &[PathBuf], dest: &Path) -> Result<()>;
}

/// Byte-level concatenation; gzip-compresses the result when `level > 0`.
pub struct ConcatMerger {
    level: u32,
}

impl ConcatMerger {
    pub fn new(level: u32) -> Self {
        Self { level }
    }

    pub fn compresses(&self) -> bool {
        self.level > 0
    }
}

impl Merger for ConcatMerger {
    fn merge(&self, parts: &[PathBuf], dest: &Path) -> Result<()> {
        let f = File::create(dest).map_err(|e| PrepError::io(dest, e))?;
        if self.compresses() {
            let mut enc = GzEncoder::new(BufWriter::new(f), Compression::new(self.level.min(9)));
            append_parts(parts, dest, &mut enc)?;
            let mut inner = enc.finish().map_err(|e| PrepError::io(dest, e))?;
            inner.flush().map_err(|e| PrepError::io(dest, e))
        } else {
            let mut out = BufWriter::new(f);
            append_parts(parts, dest, &mut out)?;
            out.flush().map_err(|e| PrepError::io(dest, e))
        }
    }
}

fn append_parts<W: Write>(parts: &[PathBuf], dest: &Path, out: &mut W) -> Result<()> {
    for part in parts {
        let mut input = File::open(part).map_err(|e| PrepError::io(part, e))?;
        io::copy(&mut input, out).map_err(|e| PrepError::io(dest, e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::MultiGzDecoder;
    use std::fs;
    use std::io::Read;
    use tempfile::TempDir;

    fn parts(dir: &Path) -> Vec<PathBuf> {
        let mut parts = Vec::new();
        for (name, body) in [("000000.se", ">a\nAC\n"), ("000001.se", ""), ("000002.se", ">b\nGT\n")] {
            let path = dir.join(name);
            fs::write(&path, body).unwrap();
            parts.push(path);
        }
        parts
    }

    #[test]
    fn test_concatenates_in_given_order() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("out.se.fa");
        ConcatMerger::new(0).merge(&parts(dir.path()), &dest).unwrap();
        assert_eq!(fs::read_to_string(&dest).unwrap(), ">a\nAC\n>b\nGT\n");
    }

    #[test]
    fn test_compressed_merge() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("out.se.fa.gz");
        ConcatMerger::new(6).merge(&parts(dir.path()), &dest).unwrap();

        let mut text = String::new();
        MultiGzDecoder::new(File::open(&dest).unwrap()).read_to_string(&mut text).unwrap();
        assert_eq!(text, ">a\nAC\n>b\nGT\n");
    }

    #[test]
    fn test_missing_part_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = ConcatMerger::new(0)
            .merge(&[dir.path().join("000009.se")], &dir.path().join("out.fa"))
            .unwrap_err();
        assert_eq!(err.kind(), "IOError");
        assert!(format!("{err}").contains("000009.se"));
    }
}
