//! Inter-node coordinator (§4.F compression, §4.F' decompression).
//!
//! Runs only on rank 0 of an MPI job (`world_size() > 1`); everything here
//! is unreachable under `LocalTransport`, which never reports more than one
//! rank. The coordinator never touches a codec itself — every block is
//! compressed or decompressed by a worker rank's own intra-node pipeline.

use std::sync::Arc;

use crate::config::JobConfig;
use crate::container;
use crate::error::{BlzError, Result};
use crate::transport::{Transport, TransportOp, TransportOutcome, SENTINEL_TAG};

/// One worker's contiguous slice of a file, in full blocks of `block_size`
/// bytes (the trailing partial block, if any, is folded into the last
/// non-empty shard). See §4.F step 2's `start_j`/`end_j` formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shard {
    pub worker: i32,
    pub start: usize,
    pub end: usize,
}

/// Splits `size` bytes into `workers` contiguous shards aligned to
/// `block_size`, per `start_j = floor(full_blocks * j / W) * B`,
/// `end_j = floor(full_blocks * (j+1) / W) * B`, with the trailing partial
/// block folded into the last non-empty shard.
pub fn compression_shards(size: usize, block_size: usize, workers: usize) -> Vec<Shard> {
    if size == 0 || workers == 0 {
        return Vec::new();
    }
    let full_blocks = size / block_size;
    let mut shards = Vec::with_capacity(workers);
    for j in 0..workers {
        let start = full_blocks * j / workers * block_size;
        let end = full_blocks * (j + 1) / workers * block_size;
        shards.push(Shard {
            worker: j as i32,
            start,
            end,
        });
    }
    if let Some(last) = shards.iter_mut().rev().find(|s| s.end > s.start) {
        last.end = size;
    } else if let Some(last) = shards.last_mut() {
        // Every shard was empty (size < block_size didn't reach here, but
        // size < workers blocks can still produce this): still attach the
        // whole trailing remainder to worker W-1 so no bytes are dropped.
        last.end = size;
    }
    shards.retain(|s| s.end > s.start);
    shards
}

/// Splits `block_count` blocks across `workers` ranks so the first
/// `block_count mod workers` workers take one extra block each (§4.F' step 2).
pub fn decompression_slices(block_count: usize, workers: usize) -> Vec<(i32, usize, usize)> {
    if block_count == 0 || workers == 0 {
        return Vec::new();
    }
    let base = block_count / workers;
    let extra = block_count % workers;
    let mut slices = Vec::with_capacity(workers);
    let mut cursor = 0usize;
    for j in 0..workers {
        let take = base + usize::from(j < extra);
        if take > 0 {
            slices.push((j as i32, cursor, cursor + take));
        }
        cursor += take;
    }
    slices
}

/// Drives one file's compression across the worker pool: sends each
/// non-empty shard to its worker (tagged with `file_id`), waits for every
/// reply, and assembles the final container (§4.F steps 3-5).
pub fn compress_file_distributed(
    transport: &dyn Transport,
    cfg: &JobConfig,
    file_id: i32,
    data: &[u8],
) -> Result<Vec<u8>> {
    let workers = (transport.world_size() - 1).max(0) as usize;
    let shards = compression_shards(data.len(), cfg.block_size, workers);

    // Post every shard's send before waiting on any of them, so all
    // workers start compressing concurrently (§4.F step 3; §5).
    let send_ops = shards
        .iter()
        .map(|shard| TransportOp::Send {
            dest: shard.worker + 1, // rank 0 is the coordinator, never a worker
            tag: file_id,
            data: data[shard.start..shard.end].to_vec(),
        })
        .collect();
    transport.exchange(send_ops)?;

    // Sizes are learned one probe at a time (each blocks on its own source
    // rank), but the matching receives are then posted and drained as a
    // single batch.
    let recv_ops = shards
        .iter()
        .map(|shard| {
            let dest = shard.worker + 1;
            let (_, _, count) = transport.probe(dest)?;
            Ok(TransportOp::Recv { source: dest, tag: file_id, len: count })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut per_worker_block_lens: Vec<Vec<u64>> = Vec::with_capacity(shards.len());
    let mut payloads: Vec<Vec<u8>> = Vec::with_capacity(shards.len());
    for outcome in transport.exchange(recv_ops)? {
        let buf = match outcome {
            TransportOutcome::Received(buf) => buf,
            TransportOutcome::Sent => return Err(BlzError::transport("expected a Received outcome from a Recv op")),
        };
        let reply = decode_shard_reply(&buf)?;
        per_worker_block_lens.push(reply.0);
        payloads.push(reply.1);
    }

    let all_lens: Vec<u64> = per_worker_block_lens.into_iter().flatten().collect();
    let mut container = container::encode_header(data.len() as u64, &all_lens)?;
    for payload in payloads {
        container.extend_from_slice(&payload);
    }
    Ok(container)
}

/// Drives one file's decompression across the worker pool (§4.F').
pub fn decompress_file_distributed(
    transport: &dyn Transport,
    file_id: i32,
    container_bytes: &[u8],
) -> Result<Vec<u8>> {
    let header = container::decode_header(container_bytes)?;
    let workers = (transport.world_size() - 1).max(0) as usize;
    let slices = decompression_slices(header.block_lens.len(), workers);

    let mut output = vec![0u8; header.uncompressed_size as usize];
    let mut offset = 0usize;
    let cumulative: Vec<usize> = {
        let mut acc = Vec::with_capacity(header.block_lens.len());
        let mut running = 0usize;
        for &len in &header.block_lens {
            acc.push(running);
            running += len as usize;
        }
        acc
    };

    // Every worker's index message and payload message are posted together
    // so the transfers overlap instead of each worker waiting its turn.
    let mut send_ops = Vec::with_capacity(slices.len() * 2);
    for (worker, start, end) in &slices {
        let dest = worker + 1;
        let sub_index = &header.block_lens[*start..*end];
        let payload_start = cumulative[*start];
        let payload_end = if *end == header.block_lens.len() {
            container_bytes.len() - header.payload_offset
        } else {
            cumulative[*end]
        };
        let mut message = Vec::with_capacity(sub_index.len() * 8);
        for &len in sub_index {
            message.extend_from_slice(&len.to_le_bytes());
        }
        let payload = container_bytes[header.payload_offset + payload_start..header.payload_offset + payload_end].to_vec();
        send_ops.push(TransportOp::Send { dest, tag: file_id, data: message });
        send_ops.push(TransportOp::Send { dest, tag: file_id, data: payload });
    }
    transport.exchange(send_ops)?;

    let recv_ops = slices
        .iter()
        .map(|(worker, _, _)| {
            let dest = worker + 1;
            let (_, _, count) = transport.probe(dest)?;
            Ok(TransportOp::Recv { source: dest, tag: file_id, len: count })
        })
        .collect::<Result<Vec<_>>>()?;

    for ((worker, _, _), outcome) in slices.iter().zip(transport.exchange(recv_ops)?) {
        let buf = match outcome {
            TransportOutcome::Received(buf) => buf,
            TransportOutcome::Sent => return Err(BlzError::transport("expected a Received outcome from a Recv op")),
        };
        let slice_len = buf.len();
        if offset + slice_len > output.len() {
            return Err(BlzError::transport(format!(
                "worker {worker} returned more bytes ({slice_len}) than remain in output ({})",
                output.len() - offset
            )));
        }
        output[offset..offset + slice_len].copy_from_slice(&buf);
        offset += slice_len;
    }

    output.truncate(header.uncompressed_size as usize);
    Ok(output)
}

/// Decodes a worker's compression reply: `n_blocks`, then `n_blocks` block
/// lengths, then the concatenated payloads (§4.F step 4).
fn decode_shard_reply(buf: &[u8]) -> Result<(Vec<u64>, Vec<u8>)> {
    const WORD: usize = 8;
    if buf.len() < WORD {
        return Err(BlzError::malformed("shard reply shorter than its block count word"));
    }
    let n_blocks = u64::from_le_bytes(buf[0..WORD].try_into().unwrap()) as usize;
    let index_end = WORD + n_blocks * WORD;
    if index_end > buf.len() {
        return Err(BlzError::malformed("shard reply block-length index truncated"));
    }
    let mut lens = Vec::with_capacity(n_blocks);
    for i in 0..n_blocks {
        let off = WORD + i * WORD;
        lens.push(u64::from_le_bytes(buf[off..off + WORD].try_into().unwrap()));
    }
    Ok((lens, buf[index_end..].to_vec()))
}

/// Sends the end-of-job sentinel to every worker rank (§4.F step 6).
pub fn send_sentinel(transport: &dyn Transport) -> Result<()> {
    let ops = (1..transport.world_size())
        .map(|rank| TransportOp::Send { dest: rank, tag: SENTINEL_TAG, data: Vec::new() })
        .collect();
    transport.exchange(ops)?;
    Ok(())
}

/// Broadcasts the file-size vector to every worker rank (§4.F step 1,
/// §4.F' step 1), encoded as a flat list of little-endian `u64` sizes.
pub fn broadcast_file_sizes(transport: &dyn Transport, sizes: &[u64]) -> Result<()> {
    let mut buf = Vec::with_capacity(sizes.len() * 8);
    for &size in sizes {
        buf.extend_from_slice(&size.to_le_bytes());
    }
    let ops = (1..transport.world_size())
        .map(|rank| TransportOp::Send { dest: rank, tag: 0, data: buf.clone() })
        .collect();
    transport.exchange(ops)?;
    Ok(())
}

/// Convenience wrapper used by the job dispatcher when it needs shared
/// ownership of a transport across a per-file thread pool (§5's "iteration
/// over files is additionally parallel over a small thread pool").
pub type SharedTransport = Arc<dyn Transport>;
