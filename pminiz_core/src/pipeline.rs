//! The intra-node pipeline (§4.D): a dispatcher fans one shard out into
//! block tasks, a dedicated codec-worker pool drains them concurrently,
//! and a gatherer stores each result at its block index. Ordering within
//! a file depends only on block index, never on worker scheduling, so the
//! reassembled artifact is bit-for-bit identical regardless of how the
//! pool interleaves work (the "Independence of parallelism" property in
//! spec.md §8).
//!
//! The dispatcher/pool/gatherer triple here is scoped to a single shard —
//! a whole file in local mode, or one worker's slice of a file in
//! inter-node mode — rather than a long-lived server that loops across
//! many shards. File-level overlap is handled one layer up (the job
//! dispatcher iterating local files, or the coordinator's per-file thread
//! pool); see DESIGN.md.

use std::sync::{Arc, Mutex};

use crossbeam_channel::bounded;
use flate2::Compression;
use rayon::ThreadPoolBuilder;

use crate::blockbuf::{BlockBuffer, SharedBytes};
use crate::codec;
use crate::error::{BlzError, Result};
use crate::partition;

#[derive(Debug, Clone, Copy)]
struct BlockJob {
    index: usize,
    input_offset: usize,
    input_len: usize,
    /// Only meaningful when decompressing: the exact uncompressed length to
    /// decompress into.
    output_len: usize,
}

enum Stage {
    Compress(Compression),
    Decompress,
}

/// Compresses `source` (a whole file, or one shard of one) into block
/// payloads using `workers` codec-worker threads. Returns each block's
/// compressed bytes, in block order.
pub fn compress_shard(
    source: SharedBytes,
    block_size: usize,
    workers: usize,
    level: Compression,
) -> Result<Vec<Vec<u8>>> {
    let len = source.as_ref().as_ref().len();
    let jobs: Vec<BlockJob> = partition::partition(len, block_size)
        .map(|s| BlockJob {
            index: s.index,
            input_offset: s.offset,
            input_len: s.length,
            output_len: 0,
        })
        .collect();
    run_stage(source, jobs, workers, Stage::Compress(level))
}

/// Decompresses one shard's worth of compressed block payloads.
/// `block_lens` is each block's compressed length, in order; `output_lens`
/// is each block's uncompressed length (`block_size`, except possibly the
/// file's very last block). `source` must hold exactly
/// `sum(block_lens)` bytes, laid out back to back.
pub fn decompress_shard(
    source: SharedBytes,
    block_lens: &[u64],
    output_lens: &[usize],
    workers: usize,
) -> Result<Vec<Vec<u8>>> {
    assert_eq!(block_lens.len(), output_lens.len());
    let mut offset = 0usize;
    let jobs: Vec<BlockJob> = block_lens
        .iter()
        .zip(output_lens)
        .enumerate()
        .map(|(index, (&clen, &olen))| {
            let job = BlockJob {
                index,
                input_offset: offset,
                input_len: clen as usize,
                output_len: olen,
            };
            offset += clen as usize;
            job
        })
        .collect();
    run_stage(source, jobs, workers, Stage::Decompress)
}

fn run_stage(
    source: SharedBytes,
    jobs: Vec<BlockJob>,
    workers: usize,
    stage: Stage,
) -> Result<Vec<Vec<u8>>> {
    let block_count = jobs.len();
    if block_count == 0 {
        return Ok(Vec::new());
    }

    let buffer = Arc::new(BlockBuffer::new(Arc::clone(&source), block_count));
    let pool = ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map_err(|e| BlzError::transport(format!("failed to build codec worker pool: {e}")))?;

    let (task_tx, task_rx) = bounded::<BlockJob>(workers.saturating_mul(4).max(1));
    let first_error: Arc<Mutex<Option<BlzError>>> = Arc::new(Mutex::new(None));
    let level = match stage {
        Stage::Compress(level) => Some(level),
        Stage::Decompress => None,
    };

    pool.scope(|scope| {
        // Dispatcher: emits tasks in block-index order. Delivery order
        // downstream is whatever the bounded channel happens to produce.
        scope.spawn(move |_| {
            for job in jobs {
                if task_tx.send(job).is_err() {
                    break;
                }
            }
        });

        // Codec worker pool: each worker pops the next task and never
        // touches another worker's task.
        for _ in 0..workers {
            let task_rx = task_rx.clone();
            let buffer = Arc::clone(&buffer);
            let source = Arc::clone(&source);
            let first_error = Arc::clone(&first_error);
            scope.spawn(move |_| {
                for job in task_rx.iter() {
                    let slice =
                        &source.as_ref().as_ref()[job.input_offset..job.input_offset + job.input_len];
                    let result = match level {
                        Some(level) => codec::compress_block(slice, level),
                        None => {
                            let mut out = vec![0u8; job.output_len];
                            codec::decompress_block(&mut out, slice).map(|n| {
                                out.truncate(n);
                                out
                            })
                        }
                    };
                    // Gatherer step: store at this block's index and bump
                    // the completion counter. The buffer itself decides
                    // whether this was the last block; the caller below
                    // just waits for every worker to drain the channel.
                    match result {
                        Ok(bytes) => {
                            buffer.store(job.index, bytes);
                        }
                        Err(e) => {
                            let mut guard = first_error.lock().unwrap();
                            if guard.is_none() {
                                *guard = Some(reindex(e, job.index));
                            }
                        }
                    }
                }
            });
        }
    });

    if let Some(err) = first_error.lock().unwrap().take() {
        return Err(err);
    }

    let buffer = Arc::try_unwrap(buffer)
        .unwrap_or_else(|_| panic!("block buffer still shared after pipeline join"));
    Ok(buffer.into_finished())
}

fn reindex(err: BlzError, index: usize) -> BlzError {
    match err {
        BlzError::CodecFailed { reason, .. } => BlzError::codec(index, reason),
        other => other,
    }
}
