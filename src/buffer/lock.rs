//! One-bit reentrancy guard.
//!
//! Not a mutex: nothing ever waits on it. A nested call that finds the bit
//! set fails with `Busy` right away.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::status::{CoreError, CoreResult};

/// The `LOCKED` bit of a buffer
#[derive(Debug, Default)]
pub struct LockBit {
    bit: AtomicBool,
}

impl LockBit {
    pub const fn new() -> Self {
        Self {
            bit: AtomicBool::new(false),
        }
    }

    pub fn is_set(&self) -> bool {
        self.bit.load(Ordering::Acquire)
    }

    /// Take the bit for the lifetime of the returned guard
    pub fn try_acquire(&self) -> CoreResult<LockGuard<'_>> {
        self.set()?;
        Ok(LockGuard { bit: &self.bit })
    }

    /// Take the bit until a matching `clear`
    pub fn set(&self) -> CoreResult<()> {
        self.bit
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .map(|_| ())
            .map_err(|_| {
                tracing::debug!("lock bit contention");
                CoreError::busy("buffer is locked")
            })
    }

    /// Release a bit taken with `set`
    pub fn clear(&self) -> CoreResult<()> {
        self.bit
            .compare_exchange(true, false, Ordering::Release, Ordering::Relaxed)
            .map(|_| ())
            .map_err(|_| CoreError::invalid("buffer is not locked"))
    }
}

/// Releases the bit on drop, so every exit path unlocks
#[derive(Debug)]
pub struct LockGuard<'a> {
    bit: &'a AtomicBool,
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        self.bit.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_releases_on_drop() {
        let lock = LockBit::new();
        {
            let _guard = lock.try_acquire().unwrap();
            assert!(lock.is_set());
            assert!(matches!(lock.try_acquire(), Err(CoreError::Busy(_))));
        }
        assert!(!lock.is_set());
    }

    #[test]
    fn test_guard_releases_on_early_return() {
        fn fails(lock: &LockBit) -> CoreResult<()> {
            let _guard = lock.try_acquire()?;
            Err(CoreError::range("bail out"))
        }

        let lock = LockBit::new();
        assert!(fails(&lock).is_err());
        assert!(!lock.is_set());
    }

    #[test]
    fn test_explicit_set_clear() {
        let lock = LockBit::new();
        lock.set().unwrap();
        assert!(matches!(lock.set(), Err(CoreError::Busy(_))));
        lock.clear().unwrap();
        assert!(matches!(lock.clear(), Err(CoreError::InvalidArgument(_))));
    }
}
