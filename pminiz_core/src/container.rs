//! The on-disk container format (§3, §4.A of the design).
//!
//! Layout, all integers little-endian `u64` (`WIDTH` bytes each):
//!
//! ```text
//! uncompressed_size : u64
//! block_count       : u64
//! block_len[0..block_count] : u64 each
//! <concatenated compressed block payloads, in block order>
//! ```
//!
//! `W` is fixed at 8 bytes rather than tracking the host's native pointer
//! width, so the same container is byte-identical whether produced on a
//! 32- or a 64-bit host (see DESIGN.md).

use crate::error::{BlzError, Result};

/// Width in bytes of every integer field in the header.
pub const WIDTH: usize = std::mem::size_of::<u64>();

/// Refuses headers that claim more blocks than this. Guards against
/// a corrupt or truncated file driving an enormous allocation.
pub const MAX_BLOCKS: u64 = 64 * 1024 * 1024;

/// Decoded container header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub uncompressed_size: u64,
    pub block_lens: Vec<u64>,
    /// Byte offset, within the container, where the payload section begins.
    pub payload_offset: usize,
}

impl Header {
    pub fn block_count(&self) -> u64 {
        self.block_lens.len() as u64
    }
}

/// Emits the header and block-length index described above. The caller is
/// responsible for appending the compressed payloads, in block order,
/// immediately after the returned bytes.
pub fn encode_header(uncompressed_size: u64, block_lens: &[u64]) -> Result<Vec<u8>> {
    let block_count = block_lens.len() as u64;
    let total_payload: u64 = block_lens.iter().try_fold(0u64, |acc, &len| {
        acc.checked_add(len)
            .ok_or_else(|| BlzError::malformed("block length overflow while encoding header"))
    })?;
    // Make sure the advertised sizes can't silently overflow a `usize` offset
    // computation on decode.
    let header_len = WIDTH
        .checked_mul(2 + block_lens.len())
        .ok_or_else(|| BlzError::malformed("header size overflow"))?;
    let _total_len = (header_len as u64)
        .checked_add(total_payload)
        .ok_or_else(|| BlzError::malformed("container size overflow"))?;

    let mut out = Vec::with_capacity(header_len);
    out.extend_from_slice(&uncompressed_size.to_le_bytes());
    out.extend_from_slice(&block_count.to_le_bytes());
    for &len in block_lens {
        out.extend_from_slice(&len.to_le_bytes());
    }
    Ok(out)
}

/// Reads the first two words, then `block_count` words, from `bytes`.
/// Returns the decoded header; `header.payload_offset` equals
/// `(2 + block_count) * WIDTH` and is guaranteed to be `<= bytes.len()`.
pub fn decode_header(bytes: &[u8]) -> Result<Header> {
    if bytes.len() < 2 * WIDTH {
        return Err(BlzError::malformed(format!(
            "container shorter than the fixed header ({} < {})",
            bytes.len(),
            2 * WIDTH
        )));
    }

    let uncompressed_size = read_u64(bytes, 0);
    let block_count = read_u64(bytes, WIDTH);

    if block_count > MAX_BLOCKS {
        return Err(BlzError::malformed(format!(
            "block_count {block_count} exceeds sanity limit {MAX_BLOCKS}"
        )));
    }

    let payload_offset = WIDTH
        .checked_mul(2 + block_count as usize)
        .ok_or_else(|| BlzError::malformed("header size overflow"))?;
    if payload_offset > bytes.len() {
        return Err(BlzError::malformed(format!(
            "declared block index ({block_count} entries) does not fit in {} header bytes",
            bytes.len()
        )));
    }

    let mut block_lens = Vec::with_capacity(block_count as usize);
    let mut total_payload: u64 = 0;
    for i in 0..block_count {
        let off = 2 * WIDTH + (i as usize) * WIDTH;
        let len = read_u64(bytes, off);
        total_payload = total_payload
            .checked_add(len)
            .ok_or_else(|| BlzError::malformed("block length overflow while decoding header"))?;
        block_lens.push(len);
    }

    let remaining = (bytes.len() - payload_offset) as u64;
    if total_payload > remaining {
        return Err(BlzError::malformed(format!(
            "declared payload ({total_payload} bytes) exceeds remaining container bytes ({remaining})"
        )));
    }

    Ok(Header {
        uncompressed_size,
        block_lens,
        payload_offset,
    })
}

fn read_u64(bytes: &[u8], offset: usize) -> u64 {
    let mut buf = [0u8; WIDTH];
    buf.copy_from_slice(&bytes[offset..offset + WIDTH]);
    u64::from_le_bytes(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_roundtrip_empty() {
        let header = encode_header(0, &[]).unwrap();
        let decoded = decode_header(&header).unwrap();
        assert_eq!(decoded.uncompressed_size, 0);
        assert_eq!(decoded.block_lens, Vec::<u64>::new());
        assert_eq!(decoded.payload_offset, 2 * WIDTH);
    }

    #[test]
    fn header_roundtrip_many_blocks() {
        let lens = vec![10u64, 0, 42, 7];
        let header = encode_header(59, &lens).unwrap();
        let decoded = decode_header(&header).unwrap();
        assert_eq!(decoded.uncompressed_size, 59);
        assert_eq!(decoded.block_lens, lens);
        assert_eq!(decoded.payload_offset, (2 + lens.len()) * WIDTH);
    }

    #[test]
    fn decode_rejects_truncated_fixed_header() {
        let bytes = vec![0u8; WIDTH]; // shorter than 2*WIDTH
        assert!(decode_header(&bytes).is_err());
    }

    #[test]
    fn decode_rejects_block_count_sanity_limit() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0u64.to_le_bytes());
        bytes.extend_from_slice(&(MAX_BLOCKS + 1).to_le_bytes());
        assert!(decode_header(&bytes).is_err());
    }

    #[test]
    fn decode_rejects_index_overrunning_buffer() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0u64.to_le_bytes());
        bytes.extend_from_slice(&10u64.to_le_bytes()); // claims 10 blocks
        bytes.extend_from_slice(&1u64.to_le_bytes()); // but only one length follows
        assert!(decode_header(&bytes).is_err());
    }

    #[test]
    fn decode_rejects_payload_shorter_than_declared() {
        let lens = vec![100u64];
        let mut header = encode_header(100, &lens).unwrap();
        header.extend_from_slice(&[0u8; 10]); // far short of 100 declared bytes
        assert!(decode_header(&header).is_err());
    }

    #[test]
    fn payload_section_accepts_exact_fit() {
        let lens = vec![3u64, 5u64];
        let mut container = encode_header(8, &lens).unwrap();
        container.extend_from_slice(&[1, 2, 3]);
        container.extend_from_slice(&[4, 5, 6, 7, 8]);
        let decoded = decode_header(&container).unwrap();
        assert_eq!(decoded.block_lens, lens);
        assert_eq!(decoded.payload_offset, 3 * WIDTH);
    }
}
