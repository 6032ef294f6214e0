#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use pminiz_core::codec::decompress_block;

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    src: Vec<u8>,
    dst_len: u16,
}

fuzz_target!(|input: FuzzInput| {
    if input.src.len() > 1_000_000 {
        return;
    }
    let mut dst = vec![0u8; input.dst_len as usize];
    // Arbitrary (likely-not-deflate) bytes must surface as CodecFailed,
    // never panic and never write past `dst`'s declared length.
    let _ = decompress_block(&mut dst, &input.src);
});
