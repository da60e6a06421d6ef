#![no_main]

use libfuzzer_sys::fuzz_target;

// Arbitrary bytes, parsed as JSON when possible, compiled under a fixed root
// name. Goal: no panics and no output on failure.
fuzz_target!(|data: &[u8]| {
    if let Ok(schema) = serde_json::from_slice::<serde_json::Value>(data) {
        let _ = jsonschema_ts_core::compile(&schema, "Fuzz", &Default::default());
    }
});
