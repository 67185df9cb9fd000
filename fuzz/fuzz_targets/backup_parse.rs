#![no_main]

use coffer_wallet::backup::BackupContainer;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // BackupContainer::from_bytes must never panic on arbitrary input,
    // including hostile length prefixes.
    if let Ok(container) = BackupContainer::from_bytes(data) {
        if let Ok(bytes) = container.to_bytes() {
            let _ = BackupContainer::from_bytes(&bytes);
        }
    }
});
