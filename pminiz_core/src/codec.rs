//! The DEFLATE-family codec worker (§4.C).
//!
//! The original tool treats compression/decompression as an opaque
//! `compress(dst, &dst_len, src, src_len) -> ok|err` / `uncompress(...)`
//! pair (zlib's own C entry points, as used by miniz). `flate2::Compress`/
//! `Decompress` expose the same in/out-capacity-counted shape, so they are
//! used directly rather than going through `flate2`'s higher-level
//! `Read`/`Write` wrappers — there is exactly one block's worth of data per
//! call and no streaming state to carry across calls.

use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};

use crate::error::{BlzError, Result};

/// Safe upper bound on the compressed size of `n` bytes, following zlib's
/// own `deflateBound` formula (miniz and flate2 both implement the same
/// algorithm, but flate2 does not re-expose the bound directly).
pub fn codec_bound(n: usize) -> usize {
    n + (n >> 12) + (n >> 14) + (n >> 25) + 13
}

/// Compresses one block, returning a freshly allocated buffer trimmed to
/// the actual compressed length. Leaves no partial state on failure.
pub fn compress_block(src: &[u8], level: Compression) -> Result<Vec<u8>> {
    let bound = codec_bound(src.len());
    let mut out = vec![0u8; bound];
    let mut compressor = Compress::new(level, true);
    let status = compressor
        .compress(src, &mut out, FlushCompress::Finish)
        .map_err(|e| BlzError::codec(0, format!("deflate compress failed: {e}")))?;
    if status != Status::StreamEnd {
        return Err(BlzError::codec(
            0,
            format!("deflate compress did not finish the stream (status {status:?})"),
        ));
    }
    let produced = compressor.total_out() as usize;
    out.truncate(produced);
    Ok(out)
}

/// Decompresses exactly one block into a caller-owned region of length
/// `dst.len()`. Returns the number of bytes actually written, which is
/// always `<= dst.len()`.
pub fn decompress_block(dst: &mut [u8], src: &[u8]) -> Result<usize> {
    let mut decompressor = Decompress::new(true);
    let status = decompressor
        .decompress(src, dst, FlushDecompress::Finish)
        .map_err(|e| BlzError::codec(0, format!("deflate decompress failed: {e}")))?;
    match status {
        Status::StreamEnd => Ok(decompressor.total_out() as usize),
        // `Finish` was requested but the stream didn't end: the
        // destination was too small for this block's real uncompressed
        // length, which should never happen when callers pass the exact
        // length recorded for this block.
        Status::Ok => Err(BlzError::codec(
            0,
            "decompress did not reach end of stream (destination too small?)".to_string(),
        )),
        Status::BufError => Err(BlzError::codec(
            0,
            "decompress buffer too small for the declared block".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_single_block() {
        let data = b"the quick brown fox jumps over the lazy dog".repeat(100);
        let compressed = compress_block(&data, Compression::default()).unwrap();
        let mut decompressed = vec![0u8; data.len()];
        let n = decompress_block(&mut decompressed, &compressed).unwrap();
        assert_eq!(n, data.len());
        assert_eq!(&decompressed[..n], &data[..]);
    }

    #[test]
    fn roundtrip_empty_block() {
        let data: &[u8] = &[];
        let compressed = compress_block(data, Compression::default()).unwrap();
        let mut decompressed = vec![0u8; 0];
        let n = decompress_block(&mut decompressed, &compressed).unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn codec_bound_is_never_smaller_than_input_header() {
        for n in [0usize, 1, 1024, 1 << 20, (2 << 20) + 100] {
            assert!(codec_bound(n) >= n);
        }
    }

    #[test]
    fn decompress_rejects_undersized_destination() {
        let data = vec![42u8; 4096];
        let compressed = compress_block(&data, Compression::default()).unwrap();
        let mut too_small = vec![0u8; 10];
        assert!(decompress_block(&mut too_small, &compressed).is_err());
    }
}
