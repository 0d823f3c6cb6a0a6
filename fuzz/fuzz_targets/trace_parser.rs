#![no_main]

use falseshare::config::AnalysisConfig;
use falseshare::pipeline;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // In-memory input has no I/O failures, so any byte soup must be accepted
    // line by line
    let result = pipeline::detect(data, &AnalysisConfig::default(), |_| {});
    assert!(result.is_ok(), "detect rejected input: {:?}", result.err());
});
