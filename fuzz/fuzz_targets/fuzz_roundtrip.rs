#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let compressed = rbrotli::compress(data);
    let restored = rbrotli::decompress(&compressed).expect("own streams must decode");
    assert_eq!(restored, data);
});
