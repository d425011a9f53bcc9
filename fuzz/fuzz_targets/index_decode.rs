#![no_main]

use libfuzzer_sys::fuzz_target;
use vecstore::fuzzing;

fuzz_target!(|data: &[u8]| {
    fuzzing::decode_index(data);
    fuzzing::decode_index_body(data);
});
