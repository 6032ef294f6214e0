//! Job dispatcher (§4.H): walks the input paths, routes each file to the
//! small-file fast path or the intra-node pipeline, and writes the result
//! next to the input (compressed name via `naming::compressed_name`,
//! decompressed name via `naming::decompressed_name` plus disambiguation).
//!
//! Local mode only (`Transport::world_size() == 1`); inter-node jobs go
//! through `coordinator`/`worker_shell` instead, one layer below this.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use memmap2::Mmap;
use rayon::prelude::*;
use walkdir::WalkDir;

use crate::blockbuf::SharedBytes;
use crate::config::{JobConfig, Mode};
use crate::container;
use crate::descriptor::{BlockIndex, FileDescriptor};
use crate::error::{BlzError, Result};
use crate::fastpath;
use crate::naming;
use crate::pipeline;

/// Outcome of running a job over a set of input paths: how many files
/// succeeded, and the paths that failed along with their errors. One
/// file's failure never aborts the rest of the job (§4.H, §7).
#[derive(Debug, Default)]
pub struct JobReport {
    pub succeeded: usize,
    pub failed: Vec<(PathBuf, BlzError)>,
}

impl JobReport {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Walks `roots` and runs `cfg`'s mode over every regular file found,
/// skipping files that don't belong to the current mode (non-`.miniz`
/// files on decompression).
pub fn run(cfg: &JobConfig, roots: &[PathBuf]) -> JobReport {
    let files = enumerate_files(cfg.mode, roots);

    let results: Vec<std::result::Result<PathBuf, (PathBuf, BlzError)>> = files
        .into_par_iter()
        .map(|mut desc| {
            let path = desc.path.clone();
            // `desc` is created above at enumeration time and dropped here
            // once its output has been written (§3 "File descriptor"
            // lifecycle) — there's no longer-lived registry holding it.
            process_file(cfg, &mut desc).map(|_| path.clone()).map_err(|e| (path, e))
        })
        .collect();

    let mut report = JobReport::default();
    for result in results {
        match result {
            Ok(_) => report.succeeded += 1,
            Err((path, err)) => {
                tracing::error!(path = %path.display(), error = %err, "file failed");
                report.failed.push((path, err));
            }
        }
    }
    report
}

fn enumerate_files(mode: Mode, roots: &[PathBuf]) -> Vec<FileDescriptor> {
    let mut files = Vec::new();
    for root in roots {
        for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path().to_path_buf();
            let matches_mode = match mode {
                Mode::Compress => !naming::is_compressed(&path),
                Mode::Decompress => naming::is_compressed(&path),
            };
            if matches_mode {
                let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
                files.push(FileDescriptor::new(path, size));
            }
        }
    }
    files
}

fn process_file(cfg: &JobConfig, desc: &mut FileDescriptor) -> Result<()> {
    let path: &Path = desc.path.as_path();
    let file = File::open(path).map_err(|e| BlzError::io(path, e))?;
    let mmap = unsafe { Mmap::map(&file).map_err(|e| BlzError::io(path, e))? };

    let output = match cfg.mode {
        Mode::Compress => compress_one(cfg, &mmap)?,
        Mode::Decompress => decompress_one(cfg, desc, &mmap)?,
    };

    let candidate = match cfg.mode {
        Mode::Compress => naming::compressed_name(path),
        Mode::Decompress => naming::decompressed_name(path),
    };
    let out_path = naming::disambiguate(&candidate, |p| p.exists());
    std::fs::write(&out_path, output).map_err(|e| BlzError::io(&out_path, e))?;

    if cfg.verbosity >= crate::config::Verbosity::Verbose {
        tracing::info!(from = %path.display(), to = %out_path.display(), "done");
    }
    Ok(())
}

fn compress_one(cfg: &JobConfig, data: &[u8]) -> Result<Vec<u8>> {
    if data.len() <= cfg.block_size || cfg.workers.is_none() {
        return fastpath::compress_small(data, cfg.compression_level);
    }

    let workers = cfg.workers.unwrap();
    let source: SharedBytes = Arc::new(data.to_vec());
    let blocks = pipeline::compress_shard(source, cfg.block_size, workers, cfg.compression_level)?;
    let lens: Vec<u64> = blocks.iter().map(|b| b.len() as u64).collect();
    let mut out = container::encode_header(data.len() as u64, &lens)?;
    for block in blocks {
        out.extend_from_slice(&block);
    }
    Ok(out)
}

fn decompress_one(cfg: &JobConfig, desc: &mut FileDescriptor, data: &[u8]) -> Result<Vec<u8>> {
    let header = container::decode_header(data)?;
    // Populated here, once the container header has been read (§3's
    // "lazily populated" note on `BlockIndex`), and used below as the
    // single source of truth for block count/lengths instead of reaching
    // back into `header` directly.
    desc.block_index = Some(BlockIndex { block_lens: header.block_lens.clone() });
    let block_index = desc.block_index.as_ref().expect("just set above");

    if block_index.block_count() <= 1 || cfg.workers.is_none() {
        return fastpath::decompress_small(data);
    }

    let workers = cfg.workers.unwrap();
    let output_lens = crate::partition::output_lengths(header.uncompressed_size as usize, cfg.block_size, block_index.block_count());
    let payload: SharedBytes = Arc::new(data[header.payload_offset..].to_vec());
    let blocks = pipeline::decompress_shard(payload, &block_index.block_lens, &output_lens, workers)?;
    Ok(blocks.into_iter().flatten().collect())
}
