//! Fuzz target for password-protected blob parsing and unwrap.
//!
//! A corrupted or crafted blob must surface as a typed failure, never a
//! panic or partial key material.

#![no_main]

use libfuzzer_sys::fuzz_target;

use cachet_keys::PasswordProtectedBundle;

fuzz_target!(|data: &[u8]| {
    if let Ok(json) = std::str::from_utf8(data) {
        if let Ok(blob) = PasswordProtectedBundle::from_json(json) {
            let _ = blob.unwrap(b"fuzz password");
        }
    }
});
