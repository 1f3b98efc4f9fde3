//! Fuzz target for query descriptor parsing.

#![no_main]

use libfuzzer_sys::fuzz_target;
use serde_json::Value;

use figure_query::query::QueryDescriptor;

fuzz_target!(|data: &[u8]| {
    let Ok(value) = serde_json::from_slice::<Value>(data) else {
        return;
    };
    if let Ok(descriptor) = QueryDescriptor::from_json(&value) {
        let _ = descriptor.kind();
        let _ = descriptor.table();
        let _ = descriptor.period();
    }
});
