//! Fuzz target for the codec layer.
//!
//! Base64 and UTF-8 decoding handle arbitrary input without panicking,
//! and every successful decode round-trips.

#![no_main]

use libfuzzer_sys::fuzz_target;

use cachet_crypto::codec;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(decoded) = codec::base64_decode(text) {
            let reencoded = codec::base64_encode(&decoded);
            // Canonical padding: decoding the re-encoding must agree
            assert_eq!(codec::base64_decode(&reencoded).unwrap(), decoded);
        }
    }

    let _ = codec::utf8_decode(data);
});
