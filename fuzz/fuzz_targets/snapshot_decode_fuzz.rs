//! Fuzz test for the snapshot decoder
//!
//! Feeds arbitrary bytes to the decoder. It must never panic, and anything
//! it accepts must be a table with unique keys that survives re-encoding.
//!
//! Run with: cargo +nightly fuzz run snapshot_decode_fuzz -- -max_total_time=60

#![no_main]

use catalog_core::Tier;
use catalog_storage::codec;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(table) = codec::decode(data, Tier::Local) else {
        return;
    };

    assert!(table.has_unique_keys(), "decoded table has duplicate keys");

    let encoded = match codec::encode(&table) {
        Ok(bytes) => bytes,
        Err(e) => panic!("decoded table failed to re-encode: {}", e),
    };
    match codec::decode(&encoded, Tier::Local) {
        Ok(again) => assert_eq!(again, table, "re-encoded table differs"),
        Err(e) => panic!("re-encoded snapshot failed to decode: {}", e),
    }
});
