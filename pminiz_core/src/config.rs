//! Run configuration, bundled into one value instead of the module-scope
//! globals the original tool used (spec.md §9's "global mutable state"
//! note). A `JobConfig` is built once from CLI arguments and shared by
//! reference with every component for the life of the job.

use flate2::Compression;

use crate::error::{BlzError, Result};

pub const MIN_BLOCK_SIZE: u64 = 1024 * 1024;
pub const MAX_BLOCK_SIZE: u64 = 128 * 1024 * 1024;
pub const DEFAULT_BLOCK_SIZE: u64 = 2 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Compress,
    Decompress,
}

/// Mirrors spec.md §7's three verbosity levels (`QUITE_MODE` in the
/// original source).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    Silent,
    ErrorsOnly,
    Verbose,
}

#[derive(Debug, Clone)]
pub struct JobConfig {
    pub mode: Mode,
    pub block_size: usize,
    /// `None` selects the small-file fast path unconditionally for every
    /// file, i.e. the "Sequential" executable of spec.md §6. `Some(n)`
    /// selects the intra-node pipeline with `n` codec workers for files
    /// above `block_size`.
    pub workers: Option<usize>,
    pub verbosity: Verbosity,
    pub compression_level: Compression,
}

impl JobConfig {
    pub fn new(mode: Mode, block_size: u64, workers: Option<usize>, verbosity: Verbosity) -> Result<Self> {
        if !(MIN_BLOCK_SIZE..=MAX_BLOCK_SIZE).contains(&block_size) {
            return Err(BlzError::config(format!(
                "block size {block_size} out of range [{MIN_BLOCK_SIZE}, {MAX_BLOCK_SIZE}]"
            )));
        }
        if let Some(0) = workers {
            return Err(BlzError::config("worker count must be at least 1"));
        }
        Ok(JobConfig {
            mode,
            block_size: block_size as usize,
            workers,
            verbosity,
            compression_level: Compression::default(),
        })
    }

    pub fn is_parallel(&self) -> bool {
        self.workers.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_block_size_out_of_range() {
        assert!(JobConfig::new(Mode::Compress, 1, None, Verbosity::ErrorsOnly).is_err());
        assert!(JobConfig::new(Mode::Compress, MAX_BLOCK_SIZE + 1, None, Verbosity::ErrorsOnly).is_err());
    }

    #[test]
    fn rejects_zero_workers() {
        assert!(JobConfig::new(Mode::Compress, DEFAULT_BLOCK_SIZE, Some(0), Verbosity::ErrorsOnly).is_err());
    }

    #[test]
    fn accepts_default_block_size() {
        let cfg = JobConfig::new(Mode::Compress, DEFAULT_BLOCK_SIZE, Some(4), Verbosity::ErrorsOnly).unwrap();
        assert!(cfg.is_parallel());
        assert_eq!(cfg.block_size, DEFAULT_BLOCK_SIZE as usize);
    }
}
