//! Fuzz target for detection config parsing.
//!
//! Parsing and validating arbitrary TOML should never panic.

#![no_main]

use cs_config::validate::validate_detection;
use cs_config::DetectionConfig;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(config) = DetectionConfig::from_toml_str(text) {
            let _ = validate_detection(&config);
        }
    }
    let _ = serde_json::from_slice::<DetectionConfig>(data);
});
