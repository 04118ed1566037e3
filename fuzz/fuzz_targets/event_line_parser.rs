#![no_main]

use gclens::correlator::{correlation_id, role_from_when, PairCorrelator};
use gclens::source::parse_event_line;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        // Decoding and correlating arbitrary lines must never panic
        let mut correlator = PairCorrelator::new();
        for line in input.lines() {
            if let Ok(event) = parse_event_line(line) {
                let _ = event.thread_name();
                let _ = correlator.correlate(&event, correlation_id, role_from_when);
            }
        }
        let _ = correlator.drain_unpaired();
    }
});
