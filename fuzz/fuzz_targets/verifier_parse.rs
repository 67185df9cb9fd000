#![no_main]

use coffer_core::crypto::PasswordVerifier;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // PasswordVerifier::from_bytes must never panic on arbitrary input.
    if let Ok(verifier) = PasswordVerifier::from_bytes(data) {
        let bytes = verifier.to_bytes();
        let _ = PasswordVerifier::from_bytes(&bytes);
    }
});
