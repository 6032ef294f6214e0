#![no_main]

use libfuzzer_sys::fuzz_target;
use pminiz_core::container::decode_header;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes, possibly truncated or carrying a bogus block count:
    // decode_header must reject them with MalformedHeader, never panic.
    let _ = decode_header(data);
});
