//! Fuzz target for `dataset_infos.json` manifest validation.
//!
//! Run with:
//!   cargo +nightly fuzz run dataset_infos_parse

#![no_main]

use annoguard::info::from_infos_slice;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 1024 * 1024 {
        return;
    }

    let _ = from_infos_slice(data);
});
