#![no_main]

use libfuzzer_sys::fuzz_target;
use megalista_reader::execution::Execution;

fuzz_target!(|data: &[u8]| {
    if let Ok(exec) = serde_json::from_slice::<Execution>(data) {
        let _ = exec.to_string();
        let _ = exec.source.dataset_and_table();
    }
});
