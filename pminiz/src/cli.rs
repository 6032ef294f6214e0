//! Command-line surface: `pminiz <MODE> <PATH> [WORKERS] [--block-size <BYTES>] [-q|-v]`.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use pminiz_core::config::{DEFAULT_BLOCK_SIZE, MAX_BLOCK_SIZE, MIN_BLOCK_SIZE};
use pminiz_core::{JobConfig, Mode, Verbosity};

/// Parallel block-oriented file compressor/decompressor.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// c/C to compress, d/D to decompress.
    pub mode: String,

    /// File or directory to process.
    pub path: PathBuf,

    /// Codec worker threads per process. Omitted runs every file through
    /// the small-file fast path sequentially (the "Sequential" executable).
    pub workers: Option<usize>,

    /// Block size in bytes.
    #[arg(long, default_value_t = DEFAULT_BLOCK_SIZE)]
    pub block_size: u64,

    /// Suppress all logging.
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log every file processed, not just errors.
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    pub fn mode(&self) -> Result<Mode> {
        match self.mode.as_str() {
            "c" | "C" => Ok(Mode::Compress),
            "d" | "D" => Ok(Mode::Decompress),
            other => bail!("invalid mode '{other}': expected one of c, C, d, D"),
        }
    }

    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Silent
        } else if self.verbose {
            Verbosity::Verbose
        } else {
            Verbosity::ErrorsOnly
        }
    }

    pub fn job_config(&self) -> Result<JobConfig> {
        if !(MIN_BLOCK_SIZE..=MAX_BLOCK_SIZE).contains(&self.block_size) {
            bail!("block size {} out of range [{MIN_BLOCK_SIZE}, {MAX_BLOCK_SIZE}]", self.block_size);
        }
        JobConfig::new(self.mode()?, self.block_size, self.workers, self.verbosity())
            .context("invalid job configuration")
    }
}
