use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::block::partition::LINES_PER_RECORD;
use crate::error::{PrepError, Result};

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    Fasta,
    Fastq,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Fasta => "fa",
            OutputFormat::Fastq => "fq",
        }
    }
}

#[derive(Parser, Debug, Clone, Serialize, Deserialize)]
#[command(name = "fqprep", version = "0.1.0", about = "Block-parallel FASTQ trimming and filtering for assembly")]
pub struct Cli {
    #[arg(short='i', long="in1")]
    pub in1: PathBuf,
    #[arg(short='I', long="in2")]
    pub in2: Option<PathBuf>,
    #[arg(short='o', long="out-prefix", default_value = "fqprep")]
    pub out_prefix: String,
    #[arg(short='d', long="work-dir", default_value = "fqprep_work")]
    pub work_dir: PathBuf,
    #[arg(long="keep-work-dir", action=ArgAction::SetTrue)]
    pub keep_work_dir: bool,

    // Partitioning
    #[arg(short='b', long="block-size", default_value_t=1_000_000)]
    pub block_size: usize,

    // Trimming Options
    #[arg(short='f', long="trim5", default_value_t=0)]
    pub trim5: usize,
    #[arg(short='t', long="trim3", default_value_t=0)]
    pub trim3: usize,

    // Filtering Options
    #[arg(short='N', long="no-n", action=ArgAction::SetTrue)]
    pub no_n: bool,
    #[arg(short='a', long="strip-adapters", action=ArgAction::SetTrue)]
    pub strip_adapters: bool,
    #[arg(short='q', long="quality-threshold")]
    pub quality_threshold: Option<i32>,
    #[arg(long="new-method", action=ArgAction::SetTrue)]
    pub use_new_method: bool,
    #[arg(long="quality-offset", default_value_t=33)]
    pub quality_offset: i32,

    // Output
    #[arg(long="format", value_enum, default_value_t=OutputFormat::Fasta)]
    pub output_format: OutputFormat,
    #[arg(short='s', long="separate", action=ArgAction::SetTrue)]
    pub separate_pe_output: bool,
    #[arg(short='z', long="compression", default_value_t=0)]
    pub compression: u32,

    // Reporting
    #[arg(short='j', long="json", default_value = "")]
    pub json: String,

    // Threading
    #[arg(short='w', long="thread", default_value_t=0)]
    pub thread: usize,
}

/// Which quality-adaptive trimming algorithm runs, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QualityMode {
    Standard { threshold: i32 },
    NewMethod { threshold: i32 },
}

/// Validated, immutable run configuration shared by every worker.
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub in1: PathBuf,
    pub in2: Option<PathBuf>,
    pub out_prefix: String,
    pub work_dir: PathBuf,
    pub keep_work_dir: bool,
    pub block_size: usize,
    pub trim5: usize,
    pub trim3: usize,
    pub no_n: bool,
    pub strip_adapters: bool,
    pub quality: Option<QualityMode>,
    pub quality_offset: i32,
    pub output_format: OutputFormat,
    pub separate_pe_output: bool,
    pub compression: u32,
    pub json: Option<PathBuf>,
    pub threads: usize,
}

impl Cli {
    pub fn into_config(self) -> Result<Config> {
        if self.block_size == 0 {
            return Err(PrepError::Config("block size must be a positive number of records".to_string()));
        }
        if self.block_size > usize::MAX / LINES_PER_RECORD {
            return Err(PrepError::Config(format!(
                "block size {} is too large; at most {} records",
                self.block_size,
                usize::MAX / LINES_PER_RECORD
            )));
        }
        if self.use_new_method && self.quality_threshold.is_none() {
            return Err(PrepError::Config("--new-method requires --quality-threshold".to_string()));
        }
        if self.separate_pe_output && self.in2.is_none() {
            return Err(PrepError::Config("--separate requires paired input (--in2)".to_string()));
        }
        if !(0..=127).contains(&self.quality_offset) {
            return Err(PrepError::Config(format!("quality offset {} is outside 0..=127", self.quality_offset)));
        }
        if self.out_prefix.is_empty() {
            return Err(PrepError::Config("output prefix must not be empty".to_string()));
        }

        let quality = self.quality_threshold.map(|threshold| {
            if self.use_new_method {
                QualityMode::NewMethod { threshold }
            } else {
                QualityMode::Standard { threshold }
            }
        });
        let threads = if self.thread == 0 { num_cpus::get() } else { self.thread };
        let json = if self.json.is_empty() { None } else { Some(PathBuf::from(self.json)) };

        Ok(Config {
            in1: self.in1,
            in2: self.in2,
            out_prefix: self.out_prefix,
            work_dir: self.work_dir,
            keep_work_dir: self.keep_work_dir,
            block_size: self.block_size,
            trim5: self.trim5,
            trim3: self.trim3,
            no_n: self.no_n,
            strip_adapters: self.strip_adapters,
            quality,
            quality_offset: self.quality_offset,
            output_format: self.output_format,
            separate_pe_output: self.separate_pe_output,
            compression: self.compression.min(9),
            json,
            threads,
        })
    }
}

impl Config {
    pub fn is_paired(&self) -> bool {
        self.in2.is_some()
    }

    /// A configuration with every filter disabled, used as a base in tests.
    #[cfg(test)]
    pub fn for_tests(work_dir: impl Into<PathBuf>) -> Config {
        Config {
            in1: PathBuf::from("in1.fq"),
            in2: None,
            out_prefix: "out".to_string(),
            work_dir: work_dir.into(),
            keep_work_dir: false,
            block_size: 4,
            trim5: 0,
            trim3: 0,
            no_n: false,
            strip_adapters: false,
            quality: None,
            quality_offset: 33,
            output_format: OutputFormat::Fasta,
            separate_pe_output: false,
            compression: 0,
            json: None,
            threads: 2,
        }
    }
}
