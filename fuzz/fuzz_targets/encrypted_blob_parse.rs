#![no_main]

use coffer_core::crypto::EncryptedBlob;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // EncryptedBlob::from_bytes must never panic on arbitrary input.
    if let Ok(blob) = EncryptedBlob::from_bytes(data) {
        // A parsed blob must re-serialize and re-parse without panicking
        let bytes = blob.to_bytes();
        let _ = EncryptedBlob::from_bytes(&bytes);
    }
});
