mod block;
mod config;
mod error;
mod fastq;
mod filter;
mod pair;
mod pipeline;
mod threading;

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use log::info;
use serde::Serialize;

use crate::block::scheduler::{BlockSummary, RunSummary};
use crate::config::{Cli, Config};
use crate::error::PrepError;

#[derive(Serialize)]
struct JsonReport<'a> {
    config: &'a Config,
    summary: &'a RunSummary,
}

/// Written instead of `JsonReport` when blocks failed and nothing was merged.
#[derive(Serialize)]
struct FailedJsonReport<'a> {
    config: &'a Config,
    error: String,
    blocks: &'a [BlockSummary],
}

fn write_json<T: Serialize>(path: &Path, report: &T) -> Result<()> {
    let f = File::create(path).with_context(|| format!("Failed to create report {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(f), report)
        .with_context(|| format!("Failed to write report {}", path.display()))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = Arc::new(cli.into_config()?);
    info!(
        "Processing {}{} in blocks of {} records on {} thread(s)",
        config.in1.display(),
        config.in2.as_ref().map(|p| format!(" + {}", p.display())).unwrap_or_default(),
        config.block_size,
        config.threads
    );

    let summary = match pipeline::run(config.clone()) {
        Ok(summary) => summary,
        Err(e) => {
            if let (PrepError::BlocksFailed { blocks, .. }, Some(path)) = (&e, &config.json) {
                write_json(path, &FailedJsonReport { config: &config, error: e.to_string(), blocks })?;
            }
            return Err(anyhow::Error::new(e).context("Run failed; merged output would be incomplete"));
        }
    };

    let rep = &summary.report;
    info!(
        "Reads: {} in, {} passed ({} SE, {} PE pairs); rejected: {} trimmed away, {} adapter, {} N, {} low quality",
        rep.total_reads,
        rep.passed_reads,
        rep.se_reads,
        rep.pe_pairs,
        rep.failed_trimmed_away,
        rep.failed_adapter,
        rep.failed_n,
        rep.failed_low_quality
    );
    for output in &summary.outputs {
        info!("Output: {}", output.display());
    }
    info!("Done in {:.2}s over {} block(s)", summary.elapsed_secs, summary.blocks.len());

    // Generate JSON Report
    if let Some(path) = &config.json {
        write_json(path, &JsonReport { config: &config, summary: &summary })?;
    }

    Ok(())
}
