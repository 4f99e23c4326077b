#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Decoding arbitrary bytes may fail - that's OK.
    // We're looking for panics and runaway allocation, not errors.
    let _ = rbrotli::decompress_with_limit(data, 1 << 24);
});
