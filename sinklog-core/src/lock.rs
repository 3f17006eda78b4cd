//! Mutual exclusion strategies a [`Logger`](crate::Logger) can dispatch under.
//!
//! The logger always protects its own state; a [`LogLock`] additionally
//! serializes whole log calls with other parties sharing the same targets,
//! such as other processes appending to the same file.

use std::{
    io,
    sync::{Arc, Condvar, Mutex, PoisonError},
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LockError {
    /// The previous holder died while holding the lock. The caller now owns
    /// it and must [`mark_consistent`](LogLock::mark_consistent) before relying on it.
    #[error("previous lock owner died while holding the lock")]
    OwnerDead,
    #[error("lock can't be made consistent: {0}")]
    NotRecoverable(#[source] io::Error),
    #[error("failed to acquire lock: {0}")]
    Acquire(#[source] io::Error),
}

/// An acquire/release pair held around each dispatch and around `close`.
pub trait LogLock: Send + Sync {
    fn acquire(&self) -> Result<(), LockError>;

    /// Restores a lock returned with [`LockError::OwnerDead`] to a clean state.
    fn mark_consistent(&self) -> Result<(), LockError> {
        Ok(())
    }

    fn release(&self);
}

/// Wraps a caller callback invoked with `true` to lock and `false` to unlock.
///
/// The callback captures whatever handle it locks.
pub struct FnLock<F>(F);

impl<F> FnLock<F>
where
    F: Fn(bool) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self(callback)
    }
}

impl<F> LogLock for FnLock<F>
where
    F: Fn(bool) + Send + Sync,
{
    fn acquire(&self) -> Result<(), LockError> {
        (self.0)(true);
        Ok(())
    }

    fn release(&self) {
        (self.0)(false)
    }
}

/// In-process binary lock; unlike a mutex guard it may be released from any thread.
#[derive(Default)]
pub struct ThreadLock {
    locked: Mutex<bool>,
    released: Condvar,
}

impl ThreadLock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LogLock for ThreadLock {
    fn acquire(&self) -> Result<(), LockError> {
        let mut locked = self.locked.lock().unwrap_or_else(PoisonError::into_inner);
        while *locked {
            locked = self
                .released
                .wait(locked)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *locked = true;
        Ok(())
    }

    fn release(&self) {
        *self.locked.lock().unwrap_or_else(PoisonError::into_inner) = false;
        self.released.notify_one();
    }
}

/// Releases the held lock on drop, so every exit path of a dispatch unlocks.
pub(crate) struct LockGuard {
    held: Option<Arc<dyn LogLock>>,
}

impl LockGuard {
    pub(crate) fn held(lock: Arc<dyn LogLock>) -> Self {
        Self { held: Some(lock) }
    }

    pub(crate) fn unlocked() -> Self {
        Self { held: None }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Some(lock) = self.held.take() {
            lock.release();
        }
    }
}

#[cfg(target_os = "linux")]
pub use robust::RobustMutex;

#[cfg(target_os = "linux")]
mod robust {
    use std::{io, mem::MaybeUninit, ptr::NonNull};

    use libc::{c_int, pthread_mutex_t};

    use super::{LockError, LogLock};

    /// A pthread robust mutex: when its owner dies mid-hold the next
    /// acquirer gets [`LockError::OwnerDead`] instead of blocking forever.
    ///
    /// [`new_shared`](Self::new_shared) places it in an anonymous shared
    /// mapping, so processes forked afterwards contend on the same lock.
    pub struct RobustMutex {
        raw: NonNull<pthread_mutex_t>,
        shared: bool,
    }

    // SAFETY: the pthread mutex is designed to be used concurrently through a
    // stable address, which the mapping provides until drop.
    unsafe impl Send for RobustMutex {}
    unsafe impl Sync for RobustMutex {}

    impl RobustMutex {
        pub fn new() -> io::Result<Self> {
            Self::map(false)
        }

        pub fn new_shared() -> io::Result<Self> {
            Self::map(true)
        }

        fn map(shared: bool) -> io::Result<Self> {
            let (visibility, pshared) = if shared {
                (libc::MAP_SHARED, libc::PTHREAD_PROCESS_SHARED)
            } else {
                (libc::MAP_PRIVATE, libc::PTHREAD_PROCESS_PRIVATE)
            };
            // SAFETY: anonymous mapping, no file descriptor or fixed address involved.
            let addr = unsafe {
                libc::mmap(
                    std::ptr::null_mut(),
                    size_of::<pthread_mutex_t>(),
                    libc::PROT_READ | libc::PROT_WRITE,
                    visibility | libc::MAP_ANONYMOUS,
                    -1,
                    0,
                )
            };
            if addr == libc::MAP_FAILED {
                return Err(io::Error::last_os_error());
            }
            let raw = NonNull::new(addr.cast::<pthread_mutex_t>())
                .ok_or_else(|| io::Error::other("mmap returned a null mapping"))?;
            // SAFETY: `raw` points to a fresh writable mapping large enough for the mutex.
            if let Err(err) = unsafe { init(raw.as_ptr(), pshared) } {
                // SAFETY: unmapping the region mapped above, never used afterwards.
                unsafe { libc::munmap(addr, size_of::<pthread_mutex_t>()) };
                return Err(err);
            }
            Ok(Self { raw, shared })
        }
    }

    unsafe fn init(raw: *mut pthread_mutex_t, pshared: c_int) -> io::Result<()> {
        let mut attr = MaybeUninit::<libc::pthread_mutexattr_t>::uninit();
        // SAFETY: attr is initialized by pthread_mutexattr_init before any other use.
        unsafe {
            check(libc::pthread_mutexattr_init(attr.as_mut_ptr()))?;
            let result = check(libc::pthread_mutexattr_setrobust(
                attr.as_mut_ptr(),
                libc::PTHREAD_MUTEX_ROBUST,
            ))
            .and_then(|()| check(libc::pthread_mutexattr_setpshared(attr.as_mut_ptr(), pshared)))
            .and_then(|()| check(libc::pthread_mutex_init(raw, attr.as_ptr())));
            libc::pthread_mutexattr_destroy(attr.as_mut_ptr());
            result
        }
    }

    fn check(rc: c_int) -> io::Result<()> {
        if rc == 0 {
            Ok(())
        } else {
            Err(io::Error::from_raw_os_error(rc))
        }
    }

    impl LogLock for RobustMutex {
        fn acquire(&self) -> Result<(), LockError> {
            // SAFETY: `raw` was initialized in `map` and stays mapped until drop.
            match unsafe { libc::pthread_mutex_lock(self.raw.as_ptr()) } {
                0 => Ok(()),
                libc::EOWNERDEAD => Err(LockError::OwnerDead),
                rc => Err(LockError::Acquire(io::Error::from_raw_os_error(rc))),
            }
        }

        fn mark_consistent(&self) -> Result<(), LockError> {
            // SAFETY: as above; only meaningful right after EOWNERDEAD.
            check(unsafe { libc::pthread_mutex_consistent(self.raw.as_ptr()) })
                .map_err(LockError::NotRecoverable)
        }

        fn release(&self) {
            // SAFETY: as above.
            unsafe { libc::pthread_mutex_unlock(self.raw.as_ptr()) };
        }
    }

    impl Drop for RobustMutex {
        fn drop(&mut self) {
            // SAFETY: no other reference can exist once we are dropped. A shared
            // mutex may still be in use by other processes, so it is only unmapped.
            unsafe {
                if !self.shared {
                    libc::pthread_mutex_destroy(self.raw.as_ptr());
                }
                libc::munmap(self.raw.as_ptr().cast(), size_of::<pthread_mutex_t>());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        thread,
    };

    #[test]
    fn test_fn_lock_forwards_both_edges() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let seen = calls.clone();
        let lock = FnLock::new(move |lock| seen.lock().unwrap().push(lock));
        lock.acquire().unwrap();
        lock.release();
        assert_eq!(*calls.lock().unwrap(), vec![true, false]);
    }

    #[test]
    fn test_thread_lock_excludes() {
        let lock = Arc::new(ThreadLock::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let lock = lock.clone();
                let inside = inside.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        lock.acquire().unwrap();
                        assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                        inside.fetch_sub(1, Ordering::SeqCst);
                        lock.release();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let lock: Arc<dyn LogLock> = Arc::new(ThreadLock::new());
        lock.acquire().unwrap();
        drop(LockGuard::held(lock.clone()));
        lock.acquire().unwrap();
        lock.release();
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_robust_mutex_reports_dead_owner() {
        let mutex = Arc::new(RobustMutex::new().unwrap());
        let owner = mutex.clone();
        thread::spawn(move || owner.acquire().unwrap())
            .join()
            .unwrap();

        assert!(matches!(mutex.acquire(), Err(LockError::OwnerDead)));
        mutex.mark_consistent().unwrap();
        mutex.release();

        mutex.acquire().unwrap();
        mutex.release();
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_robust_mutex_unreconciled_becomes_unusable() {
        let mutex = Arc::new(RobustMutex::new().unwrap());
        let owner = mutex.clone();
        thread::spawn(move || owner.acquire().unwrap())
            .join()
            .unwrap();

        assert!(matches!(mutex.acquire(), Err(LockError::OwnerDead)));
        mutex.release();
        assert!(matches!(mutex.acquire(), Err(LockError::Acquire(_))));
    }
}
