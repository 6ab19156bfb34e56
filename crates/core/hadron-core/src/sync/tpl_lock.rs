//! TPL-raising spin lock.
//!
//! Raises the task priority level before acquiring the inner spinlock and
//! restores the previous level on release. Notification callbacks run at or
//! below the lock's level, so they cannot interrupt a holder and deadlock on
//! the same lock.

use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, Ordering};

use uefi::EfiTpl;

use crate::tpl;

/// A spin lock that raises the task priority level while held.
///
/// The lock is not reentrant: acquiring it again from the holder spins
/// forever. Code that may run nested inside a holder should use
/// [`try_lock`](TplLock::try_lock).
pub struct TplLock<T> {
    locked: AtomicBool,
    tpl: EfiTpl,
    name: &'static str,
    data: UnsafeCell<T>,
}

// SAFETY: Same reasoning as a plain spin lock: atomic ops ensure exclusive access.
unsafe impl<T: Send> Send for TplLock<T> {}
unsafe impl<T: Send> Sync for TplLock<T> {}

impl<T> TplLock<T> {
    /// Creates a new unlocked `TplLock` that raises to `tpl` while held.
    pub const fn new(tpl: EfiTpl, value: T) -> Self {
        Self::named("<unnamed>", tpl, value)
    }

    /// Creates a new unlocked `TplLock` with a name for diagnostics.
    pub const fn named(name: &'static str, tpl: EfiTpl, value: T) -> Self {
        Self {
            locked: AtomicBool::new(false),
            tpl,
            name,
            data: UnsafeCell::new(value),
        }
    }

    /// Returns the priority level this lock raises to.
    pub const fn tpl(&self) -> EfiTpl {
        self.tpl
    }

    /// Returns the diagnostic name of this lock.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Acquires the lock, raising the priority level first.
    pub fn lock(&self) -> TplLockGuard<'_, T> {
        let saved_tpl = tpl::raise(self.tpl);

        // TTAS spin to acquire.
        loop {
            if self
                .locked
                .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                return TplLockGuard {
                    lock: self,
                    saved_tpl,
                };
            }
            while self.locked.load(Ordering::Relaxed) {
                core::hint::spin_loop();
            }
        }
    }

    /// Attempts to acquire the lock without blocking.
    ///
    /// Returns `None`, with the priority level unchanged, if the lock is held.
    pub fn try_lock(&self) -> Option<TplLockGuard<'_, T>> {
        let saved_tpl = tpl::raise(self.tpl);
        if self
            .locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            Some(TplLockGuard {
                lock: self,
                saved_tpl,
            })
        } else {
            // Lost the race; restore the level.
            tpl::restore(saved_tpl);
            None
        }
    }

    /// Returns `true` if the lock is currently held.
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }

    /// Returns a mutable reference to the data; no locking is needed with `&mut self`.
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    /// Consumes the lock and returns the protected value.
    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

/// RAII guard that releases the lock and restores the priority level on drop.
pub struct TplLockGuard<'a, T> {
    lock: &'a TplLock<T>,
    saved_tpl: EfiTpl,
}

impl<T> Deref for TplLockGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        // SAFETY: The lock is held, so we have exclusive access to the data.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> DerefMut for TplLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: The lock is held, so we have exclusive access to the data.
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T> Drop for TplLockGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);
        tpl::restore(self.saved_tpl);
    }
}
