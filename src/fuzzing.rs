//! Decoder entry points for the `fuzz/` targets. Inputs are arbitrary bytes;
//! the only requirement is that decoding never panics.

use crate::storage;

pub fn decode_index(data: &[u8]) {
    let _ = storage::decode_index(data);
}

pub fn decode_index_body(data: &[u8]) {
    let _ = crate::index::FlatL2Index::decode(data);
}

pub fn decode_ledger(data: &[u8]) {
    let _ = storage::decode_ledger(data);
}

pub fn decode_lookup(data: &[u8]) {
    let _ = storage::decode_lookup(data);
}
