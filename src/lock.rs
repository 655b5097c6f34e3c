//! Cross-process mutual exclusion for map writers.
//!
//! The map never creates or destroys the lock primitive itself; it is
//! handed an already-provisioned handle and only acquires/releases it
//! around mutations. [`FlockLock`] is the provided adapter, built on an
//! advisory `flock` over a file that all cooperating processes open.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use rustix::fd::OwnedFd;
use rustix::fs::FlockOperation;
use tracing::warn;

use crate::error::{Error, Result};

/// A cross-process mutual-exclusion handle.
///
/// Non-reentrant: a handle that already holds the lock must not acquire it
/// again, and a handle that does not hold it must not release it. Both are
/// usage bugs and surface as errors rather than deadlocks.
pub trait ProcessLock: Send + Sync {
    /// Acquire the lock, blocking until it is granted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LockAlreadyHeld`] if this handle already holds the
    /// lock, or the underlying system error if the acquisition fails.
    fn acquire(&self) -> Result<()>;

    /// Release the lock.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LockNotHeld`] if this handle does not hold the
    /// lock, or the underlying system error if the release fails.
    fn release(&self) -> Result<()>;
}

/// A [`ProcessLock`] backed by an advisory `flock` on a file.
///
/// Every process that mutates the same map opens the same lock file; the
/// kernel serializes the exclusive locks across them. Dropping a handle
/// that still holds the lock releases it, so an abandoned writer can never
/// leave the map permanently locked.
///
/// # Example
///
/// ```rust,ignore
/// use shmap::lock::{FlockLock, ProcessLock};
///
/// let lock = FlockLock::open("/tmp/intmap.lock")?;
/// lock.acquire()?;
/// // ... critical section ...
/// lock.release()?;
/// ```
pub struct FlockLock {
    /// The lock file descriptor.
    fd: OwnedFd,
    /// Whether this handle currently holds the lock.
    held: AtomicBool,
}

impl FlockLock {
    /// Open (creating if necessary) the lock file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        use rustix::fs::{Mode, OFlags};
        let fd = rustix::fs::open(
            path.as_ref(),
            OFlags::RDWR | OFlags::CREATE | OFlags::CLOEXEC,
            Mode::from_raw_mode(0o644),
        )?;
        Ok(Self::from_fd(fd))
    }

    /// Wrap an already-open lock file descriptor.
    ///
    /// The fd must refer to its own open file description: two handles
    /// sharing one description would also share the kernel-side lock and
    /// defeat mutual exclusion.
    pub fn from_fd(fd: OwnedFd) -> Self {
        Self {
            fd,
            held: AtomicBool::new(false),
        }
    }
}

impl ProcessLock for FlockLock {
    fn acquire(&self) -> Result<()> {
        if self.held.swap(true, Ordering::AcqRel) {
            return Err(Error::LockAlreadyHeld);
        }

        if let Err(err) = rustix::fs::flock(&self.fd, FlockOperation::LockExclusive) {
            self.held.store(false, Ordering::Release);
            return Err(err.into());
        }

        Ok(())
    }

    fn release(&self) -> Result<()> {
        if !self.held.load(Ordering::Acquire) {
            return Err(Error::LockNotHeld);
        }

        rustix::fs::flock(&self.fd, FlockOperation::Unlock)?;
        self.held.store(false, Ordering::Release);

        Ok(())
    }
}

impl Drop for FlockLock {
    fn drop(&mut self) {
        if self.held.load(Ordering::Acquire) {
            if let Err(err) = rustix::fs::flock(&self.fd, FlockOperation::Unlock) {
                warn!(%err, "failed to release abandoned lock");
            }
        }
    }
}

/// Scoped acquisition of a [`ProcessLock`].
///
/// The lock is released when the guard drops, so every exit path of the
/// critical section — including error paths — releases it.
pub(crate) struct HeldLock<'a> {
    lock: &'a dyn ProcessLock,
}

impl<'a> HeldLock<'a> {
    pub(crate) fn acquire(lock: &'a dyn ProcessLock) -> Result<Self> {
        lock.acquire()?;
        Ok(Self { lock })
    }
}

impl Drop for HeldLock<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.lock.release() {
            warn!(%err, "failed to release map lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn test_flock_acquire_release_cycle() {
        let dir = tempdir().unwrap();
        let lock = FlockLock::open(dir.path().join("test.lock")).unwrap();

        lock.acquire().unwrap();
        lock.release().unwrap();
        lock.acquire().unwrap();
        lock.release().unwrap();
    }

    #[test]
    fn test_flock_double_acquire_fails() {
        let dir = tempdir().unwrap();
        let lock = FlockLock::open(dir.path().join("test.lock")).unwrap();

        lock.acquire().unwrap();
        assert!(matches!(lock.acquire(), Err(Error::LockAlreadyHeld)));
        lock.release().unwrap();
    }

    #[test]
    fn test_flock_release_without_acquire_fails() {
        let dir = tempdir().unwrap();
        let lock = FlockLock::open(dir.path().join("test.lock")).unwrap();

        assert!(matches!(lock.release(), Err(Error::LockNotHeld)));
    }

    #[test]
    fn test_flock_drop_releases() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.lock");

        {
            let lock = FlockLock::open(&path).unwrap();
            lock.acquire().unwrap();
            // Dropped while held
        }

        // A fresh handle can acquire immediately; a leaked kernel lock
        // would block here forever.
        let lock = FlockLock::open(&path).unwrap();
        lock.acquire().unwrap();
        lock.release().unwrap();
    }

    #[test]
    fn test_flock_blocks_second_handle() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.lock");

        let first = FlockLock::open(&path).unwrap();
        first.acquire().unwrap();

        let second = Arc::new(FlockLock::open(&path).unwrap());
        let waiter = {
            let second = Arc::clone(&second);
            thread::spawn(move || {
                second.acquire().unwrap();
                second.release().unwrap();
            })
        };

        // Give the waiter time to block on the kernel lock, then hand over.
        thread::sleep(Duration::from_millis(50));
        first.release().unwrap();

        waiter.join().unwrap();
    }

    #[test]
    fn test_held_lock_releases_on_drop() {
        let dir = tempdir().unwrap();
        let lock = FlockLock::open(dir.path().join("test.lock")).unwrap();

        {
            let _held = HeldLock::acquire(&lock).unwrap();
            assert!(matches!(lock.acquire(), Err(Error::LockAlreadyHeld)));
        }

        lock.acquire().unwrap();
        lock.release().unwrap();
    }
}
