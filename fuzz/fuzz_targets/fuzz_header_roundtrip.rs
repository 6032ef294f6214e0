#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use pminiz_core::container::{decode_header, encode_header};

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    uncompressed_size: u64,
    block_lens: Vec<u64>,
}

fuzz_target!(|input: FuzzInput| {
    if input.block_lens.len() > 4096 {
        return;
    }

    let Ok(header) = encode_header(input.uncompressed_size, &input.block_lens) else {
        return;
    };

    // `encode_header`'s own output must always decode back to the same
    // fields, regardless of what arbitrary sizes/lengths it was given.
    let decoded = decode_header(&header).expect("self-produced header failed to decode");
    assert_eq!(decoded.uncompressed_size, input.uncompressed_size);
    assert_eq!(decoded.block_lens, input.block_lens);
    assert_eq!(decoded.payload_offset, header.len());
});
