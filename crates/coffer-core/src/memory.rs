//! Memory protection for resident key material
//!
//! Two hardening measures, both best-effort (containers and unprivileged
//! users may forbid them, so failures warn instead of aborting):
//!
//! 1. Core dump prevention via `setrlimit(RLIMIT_CORE, 0)` — a crash must
//!    never write seed material to disk.
//! 2. `mlock()` on buffers holding decrypted seeds, so they cannot be
//!    swapped out.
//!
//! [`SecretBuffer`] combines both with zeroize-on-drop: the wallet
//! manager keeps the unlocked seed in one, and dropping it (on lock,
//! timeout, or any error path) scrubs and unlocks the memory.

use std::sync::atomic::{AtomicBool, Ordering};

use zeroize::Zeroize;

static CORE_DUMPS_DISABLED: AtomicBool = AtomicBool::new(false);

/// Disable core dumps for the current process. Call once at startup,
/// before any seed is decrypted. Returns whether the limit took effect.
pub fn disable_core_dumps() -> bool {
    if CORE_DUMPS_DISABLED.swap(true, Ordering::SeqCst) {
        return true;
    }

    #[cfg(unix)]
    {
        // SAFETY: setrlimit with RLIMIT_CORE=0 is a standard POSIX call
        unsafe {
            let rlim = libc::rlimit {
                rlim_cur: 0,
                rlim_max: 0,
            };
            if libc::setrlimit(libc::RLIMIT_CORE, &rlim) != 0 {
                eprintln!(
                    "[coffer] warning: failed to disable core dumps: {}",
                    std::io::Error::last_os_error()
                );
                return false;
            }
        }
        true
    }

    #[cfg(not(unix))]
    {
        eprintln!("[coffer] warning: core dump prevention not supported on this platform");
        false
    }
}

#[cfg(unix)]
unsafe fn mlock(ptr: *const u8, len: usize) -> bool {
    libc::mlock(ptr as *const libc::c_void, len) == 0
}

#[cfg(unix)]
unsafe fn munlock(ptr: *const u8, len: usize) -> bool {
    libc::munlock(ptr as *const libc::c_void, len) == 0
}

/// A fixed-size buffer for secret material: locked in RAM where the
/// platform allows it, zeroized and unlocked on drop.
pub struct SecretBuffer {
    data: Vec<u8>,
    locked: bool,
}

impl SecretBuffer {
    /// Copy `secret` into a locked buffer.
    pub fn from_slice(secret: &[u8]) -> Self {
        let mut buf = Self::zeroed(secret.len());
        buf.data.copy_from_slice(secret);
        buf
    }

    /// Allocate a zero-filled locked buffer.
    pub fn zeroed(len: usize) -> Self {
        let data = vec![0u8; len];
        let locked = if data.is_empty() {
            true
        } else {
            #[cfg(unix)]
            {
                // SAFETY: data is a live allocation of exactly data.len() bytes
                unsafe { mlock(data.as_ptr(), data.len()) }
            }
            #[cfg(not(unix))]
            {
                false
            }
        };

        if !locked {
            eprintln!(
                "[coffer] warning: failed to mlock {} bytes; secret may be swappable",
                data.len()
            );
        }

        Self { data, locked }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether the pages backing this buffer are actually locked.
    pub fn is_locked(&self) -> bool {
        self.locked
    }
}

impl Drop for SecretBuffer {
    fn drop(&mut self) {
        self.data.zeroize();
        #[cfg(unix)]
        if self.locked && !self.data.is_empty() {
            // SAFETY: matches the mlock call in `zeroed`
            unsafe {
                munlock(self.data.as_ptr(), self.data.len());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disable_core_dumps_idempotent() {
        // May fail in sandboxes; must not panic, and the second call
        // always reports success.
        let _ = disable_core_dumps();
        assert!(disable_core_dumps());
    }

    #[test]
    fn test_secret_buffer_holds_data() {
        let buf = SecretBuffer::from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(buf.as_slice(), &[0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(buf.len(), 4);
    }

    #[test]
    fn test_zero_length_buffer() {
        let buf = SecretBuffer::zeroed(0);
        assert!(buf.is_empty());
        assert!(buf.is_locked());
    }

    #[test]
    fn test_zeroize_path() {
        let mut buf = SecretBuffer::zeroed(32);
        buf.as_mut_slice().fill(0xFF);
        buf.data.zeroize();
        assert!(buf.as_slice().iter().all(|&b| b == 0));
    }
}
