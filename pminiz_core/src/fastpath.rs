//! Small-file fast path (§4.E): files at or below the block threshold skip
//! the pipeline entirely and are handled synchronously by the calling
//! thread, using the same container format with `block_count = 1`.

use flate2::Compression;

use crate::codec;
use crate::container;
use crate::error::Result;

/// Compresses `data` (whose length must be `<= block_size`, i.e. it fits in
/// a single block) into a complete container. An empty file gets zero
/// blocks (`block_count = ceil(0 / B) = 0`), matching §3's block-count
/// invariant exactly — it is not treated as "one block of zero bytes".
pub fn compress_small(data: &[u8], level: Compression) -> Result<Vec<u8>> {
    if data.is_empty() {
        return container::encode_header(0, &[]);
    }
    let compressed = codec::compress_block(data, level)?;
    let mut out = container::encode_header(data.len() as u64, &[compressed.len() as u64])?;
    out.extend_from_slice(&compressed);
    Ok(out)
}

/// Decompresses a complete container of zero or one blocks back to the
/// original bytes.
pub fn decompress_small(container_bytes: &[u8]) -> Result<Vec<u8>> {
    let header = container::decode_header(container_bytes)?;
    if header.block_lens.is_empty() {
        return Ok(Vec::new());
    }
    let payload = &container_bytes[header.payload_offset..];
    let mut out = vec![0u8; header.uncompressed_size as usize];
    let n = codec::decompress_block(&mut out, payload)?;
    out.truncate(n);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_small_file() {
        let data = b"hello, small file fast path";
        let container = compress_small(data, Compression::default()).unwrap();
        let header = container::decode_header(&container).unwrap();
        assert_eq!(header.block_count(), 1);
        let decompressed = decompress_small(&container).unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn roundtrip_empty_file() {
        let container = compress_small(&[], Compression::default()).unwrap();
        let header = container::decode_header(&container).unwrap();
        assert_eq!(header.uncompressed_size, 0);
        assert_eq!(header.block_count(), 0);
        let decompressed = decompress_small(&container).unwrap();
        assert!(decompressed.is_empty());
    }
}
