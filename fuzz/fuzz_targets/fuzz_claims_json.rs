//! Fuzz target for claim batch parsing and feature preparation.
//!
//! Arbitrary JSON / JSON Lines input must either fail with an error or
//! produce a batch whose feature matrix has one row per claim.

#![no_main]

use cs_core::claims::ClaimBatch;
use cs_core::features::prepare_features;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(batch) = ClaimBatch::from_json_str(text) else {
        return;
    };
    if let Ok(features) = prepare_features(&batch) {
        assert_eq!(features.n_rows(), batch.len());
    }
});
