//! Suspension of `SIGVTALRM` around blocking socket calls.
//!
//! A virtual-timer alarm delivered while the calling thread waits on the
//! socket interrupts the wait, and the call fails with
//! [`S7Error::Timeout`](crate::S7Error::Timeout) although the controller
//! answered in time.
//!
//! [`SignalGuard`] blocks the signal for the lifetime of the guard and
//! restores the mask it found when dropped. Signal masks are per thread, so
//! the guard is `!Send`. Guards nest: an inner guard sees the signal already
//! blocked and leaves it blocked on drop, the outermost one unblocks it.
//! [`SignalGuard::active`] reports how many guards are alive across all
//! clients; it is a diagnostic and never influences the mask.
//!
//! # Example
//!
//! ```
//! use simatic_s7::SignalGuard;
//!
//! {
//!     let _guard = SignalGuard::suspend();
//!     // blocking socket work here
//! #   #[cfg(unix)]
//! #   assert!(SignalGuard::is_blocked());
//! }
//! ```

use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::warn;

static ACTIVE: AtomicUsize = AtomicUsize::new(0);

/// RAII guard that keeps `SIGVTALRM` blocked on the current thread.
#[must_use = "the signal is unblocked as soon as the guard is dropped"]
#[derive(Debug)]
pub struct SignalGuard {
    /// Whether this guard changed the mask and must undo it.
    restore: bool,
    _not_send: PhantomData<*const ()>,
}

impl SignalGuard {
    /// Blocks the guarded signal until the returned guard is dropped.
    ///
    /// If the mask cannot be changed the failure is logged and the guard
    /// becomes a no-op; the I/O it protects still runs.
    pub fn suspend() -> Self {
        let restore = match sys::block() {
            Ok(was_blocked) => !was_blocked,
            Err(e) => {
                warn!(error = %e, "failed to block SIGVTALRM");
                false
            }
        };
        ACTIVE.fetch_add(1, Ordering::SeqCst);
        Self {
            restore,
            _not_send: PhantomData,
        }
    }

    /// Number of guards currently alive in the process.
    ///
    /// Diagnostics only: masking is decided per thread by each guard.
    pub fn active() -> usize {
        ACTIVE.load(Ordering::SeqCst)
    }

    /// Returns whether the guarded signal is blocked on the current thread.
    ///
    /// Always `false` on targets without POSIX signals.
    pub fn is_blocked() -> bool {
        sys::is_blocked().unwrap_or(false)
    }
}

impl Drop for SignalGuard {
    fn drop(&mut self) {
        if self.restore {
            if let Err(e) = sys::unblock() {
                warn!(error = %e, "failed to unblock SIGVTALRM");
            }
        }
        ACTIVE.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(unix)]
mod sys {
    use std::io;
    use std::mem::MaybeUninit;
    use std::ptr;

    fn guarded_set() -> libc::sigset_t {
        let mut set = MaybeUninit::<libc::sigset_t>::uninit();
        // SAFETY: sigemptyset initializes the set before sigaddset reads it.
        unsafe {
            libc::sigemptyset(set.as_mut_ptr());
            libc::sigaddset(set.as_mut_ptr(), libc::SIGVTALRM);
            set.assume_init()
        }
    }

    fn mask(how: libc::c_int, set: Option<&libc::sigset_t>) -> io::Result<libc::sigset_t> {
        let mut old = MaybeUninit::<libc::sigset_t>::uninit();
        let set_ptr = set.map_or(ptr::null(), |s| s as *const _);
        // SAFETY: both pointers are valid for the duration of the call and
        // pthread_sigmask fully writes `old` on success.
        let rc = unsafe { libc::pthread_sigmask(how, set_ptr, old.as_mut_ptr()) };
        if rc != 0 {
            return Err(io::Error::from_raw_os_error(rc));
        }
        // SAFETY: initialized by the successful call above.
        Ok(unsafe { old.assume_init() })
    }

    fn contains(set: &libc::sigset_t) -> bool {
        // SAFETY: `set` is an initialized signal set.
        unsafe { libc::sigismember(set, libc::SIGVTALRM) == 1 }
    }

    /// Blocks the signal and reports whether it was already blocked.
    pub(super) fn block() -> io::Result<bool> {
        let old = mask(libc::SIG_BLOCK, Some(&guarded_set()))?;
        Ok(contains(&old))
    }

    pub(super) fn unblock() -> io::Result<()> {
        mask(libc::SIG_UNBLOCK, Some(&guarded_set())).map(|_| ())
    }

    pub(super) fn is_blocked() -> io::Result<bool> {
        mask(libc::SIG_BLOCK, None).map(|current| contains(&current))
    }
}

#[cfg(not(unix))]
mod sys {
    use std::io;

    pub(super) fn block() -> io::Result<bool> {
        Ok(true)
    }

    pub(super) fn unblock() -> io::Result<()> {
        Ok(())
    }

    pub(super) fn is_blocked() -> io::Result<bool> {
        Ok(false)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::thread;

    // Each test runs on a fresh thread so the starting mask is the default one.

    #[test]
    fn test_blocks_and_restores() {
        thread::spawn(|| {
            assert!(!SignalGuard::is_blocked());
            {
                let _guard = SignalGuard::suspend();
                assert!(SignalGuard::is_blocked());
            }
            assert!(!SignalGuard::is_blocked());
        })
        .join()
        .unwrap();
    }

    #[test]
    fn test_nested_guards() {
        thread::spawn(|| {
            let outer = SignalGuard::suspend();
            {
                let _inner = SignalGuard::suspend();
                assert!(SignalGuard::is_blocked());
            }
            assert!(SignalGuard::is_blocked());
            drop(outer);
            assert!(!SignalGuard::is_blocked());
        })
        .join()
        .unwrap();
    }

    #[test]
    fn test_prior_block_is_preserved() {
        thread::spawn(|| {
            sys::block().unwrap();
            {
                let _guard = SignalGuard::suspend();
            }
            assert!(SignalGuard::is_blocked());
            sys::unblock().unwrap();
        })
        .join()
        .unwrap();
    }

    #[test]
    fn test_restored_on_error_path() {
        fn failing() -> Result<(), &'static str> {
            let _guard = SignalGuard::suspend();
            if SignalGuard::is_blocked() {
                return Err("boom");
            }
            Ok(())
        }

        thread::spawn(|| {
            assert!(failing().is_err());
            assert!(!SignalGuard::is_blocked());
        })
        .join()
        .unwrap();
    }

    #[test]
    fn test_guard_is_other_threads_agnostic() {
        let _guard = SignalGuard::suspend();
        thread::spawn(|| {
            // New threads inherit the creator's mask; unblock to get a clean slate.
            sys::unblock().unwrap();
            let _inner = SignalGuard::suspend();
            assert!(SignalGuard::is_blocked());
        })
        .join()
        .unwrap();
        assert!(SignalGuard::is_blocked());
        assert!(SignalGuard::active() >= 1);
    }
}
