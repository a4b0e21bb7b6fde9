//! Fuzz target for envelope parsing.
//!
//! Arbitrary transport input must be rejected cleanly - never a panic,
//! never an envelope that skips validation.

#![no_main]

use libfuzzer_sys::fuzz_target;

use cachet_protocol::Envelope;

fuzz_target!(|data: &[u8]| {
    if let Ok(json) = std::str::from_utf8(data) {
        if let Ok(envelope) = Envelope::from_json(json) {
            // Anything that parses must also re-serialize
            let _ = envelope.to_json();
        }
    }
});
