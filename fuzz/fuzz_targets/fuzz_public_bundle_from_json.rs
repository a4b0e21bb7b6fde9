//! Fuzz target for public bundle parsing.
//!
//! Directory responses are attacker-controlled input; parsing must never
//! panic and every accepted bundle must fingerprint cleanly.

#![no_main]

use libfuzzer_sys::fuzz_target;

use cachet_keys::PublicKeyBundle;

fuzz_target!(|data: &[u8]| {
    if let Ok(json) = std::str::from_utf8(data) {
        if let Ok(bundle) = PublicKeyBundle::from_json(json) {
            let _ = bundle.fingerprint();
        }
    }
});
