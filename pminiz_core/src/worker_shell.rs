//! Inter-node worker shell (§4.G). Each non-coordinator rank runs this
//! receive loop for the life of the job, handing shards off to the
//! intra-node pipeline (§4.D) and replying to the coordinator when a
//! shard's gatherer finishes.

use std::collections::HashMap;
use std::sync::Arc;

use flate2::Compression;

use crate::blockbuf::SharedBytes;
use crate::config::Mode;
use crate::descriptor::BlockIndex;
use crate::error::Result;
use crate::pipeline;
use crate::transport::{Transport, SENTINEL_TAG};

/// Runs the worker receive loop until the sentinel tag arrives. `workers`
/// is this rank's intra-node codec-worker count; `block_size` is the job's
/// configured block size `B`; `level` is used only for compression.
///
/// For decompression, a file id's `BlockIndex` arrives as its own message
/// before the matching payload — the two decompression message kinds are
/// distinguished by protocol step, not by content (§6 "Inter-node message
/// framing"), so presence in `pending` is what "index received, payload
/// still outstanding" means.
pub fn run(
    transport: &dyn Transport,
    mode: Mode,
    block_size: usize,
    workers: usize,
    level: Compression,
) -> Result<()> {
    let mut pending: HashMap<i32, BlockIndex> = HashMap::new();

    loop {
        let (source, tag, count) = transport.probe(-1)?;
        if tag == SENTINEL_TAG {
            return Ok(());
        }

        let buf = transport.recv(source, tag, count)?;

        match mode {
            Mode::Compress => {
                handle_compression_shard(transport, source, tag, &buf, block_size, workers, level)?
            }
            Mode::Decompress => match pending.remove(&tag) {
                None => {
                    let block_lens = decode_index(&buf);
                    pending.insert(tag, BlockIndex { block_lens });
                }
                Some(block_index) => {
                    handle_decompression_payload(transport, source, tag, &block_index, &buf, block_size, workers)?;
                }
            },
        }
    }
}

fn decode_index(index_bytes: &[u8]) -> Vec<u64> {
    index_bytes
        .chunks_exact(8)
        .map(|chunk| u64::from_le_bytes(chunk.try_into().unwrap()))
        .collect()
}

/// Handles a received compression shard: runs it through the intra-node
/// pipeline and sends the reply described in §4.F step 4.
fn handle_compression_shard(
    transport: &dyn Transport,
    source: i32,
    file_id: i32,
    shard: &[u8],
    block_size: usize,
    workers: usize,
    level: Compression,
) -> Result<()> {
    let source_bytes: SharedBytes = Arc::new(shard.to_vec());
    let blocks = pipeline::compress_shard(source_bytes, block_size, workers, level)?;

    let mut reply = Vec::new();
    reply.extend_from_slice(&(blocks.len() as u64).to_le_bytes());
    for block in &blocks {
        reply.extend_from_slice(&(block.len() as u64).to_le_bytes());
    }
    for block in &blocks {
        reply.extend_from_slice(block);
    }
    transport.send(source, file_id, reply)?;
    Ok(())
}

/// Handles the second of the two decompression messages: the concatenated
/// compressed payload matching the sub-index received earlier. Every block
/// but the file's very last decompresses to exactly `block_size` bytes;
/// the coordinator trims the assembled output to `uncompressed_size` once
/// every worker's slice has been received (§4.F' step 4), so this shell
/// never needs to know which block (if any) is the file's last.
fn handle_decompression_payload(
    transport: &dyn Transport,
    source: i32,
    file_id: i32,
    block_index: &BlockIndex,
    payload: &[u8],
    block_size: usize,
    workers: usize,
) -> Result<()> {
    let output_lens = vec![block_size; block_index.block_count()];
    let source_bytes: SharedBytes = Arc::new(payload.to_vec());
    let blocks = pipeline::decompress_shard(source_bytes, &block_index.block_lens, &output_lens, workers)?;
    let flat: Vec<u8> = blocks.into_iter().flatten().collect();
    transport.send(source, file_id, flat)?;
    Ok(())
}
