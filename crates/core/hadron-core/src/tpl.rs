//! Task priority level (TPL) tracking.
//!
//! Firmware code runs at one of a few priority levels. Raising the level
//! masks notifications registered at or below it, which is how DXE code gets
//! a critical section without a scheduler. The level only ever goes up while
//! something is held and is put back by whoever raised it.

use core::sync::atomic::{AtomicUsize, Ordering};

use uefi::{EfiTpl, tpl};

#[cfg(not(test))]
static CURRENT_TPL: AtomicUsize = AtomicUsize::new(tpl::APPLICATION);

// Host tests run on many threads; each test thread gets its own level so
// tests cannot observe each other's critical sections.
#[cfg(test)]
std::thread_local! {
    static CURRENT_TPL: AtomicUsize = const { AtomicUsize::new(tpl::APPLICATION) };
}

#[inline]
fn with_current<R>(f: impl FnOnce(&AtomicUsize) -> R) -> R {
    #[cfg(not(test))]
    {
        f(&CURRENT_TPL)
    }
    #[cfg(test)]
    {
        CURRENT_TPL.with(f)
    }
}

/// Returns the current task priority level.
#[must_use]
pub fn current() -> EfiTpl {
    with_current(|level| level.load(Ordering::Acquire))
}

/// Raises the task priority level to at least `new` and returns the previous level.
///
/// Raising to a level below the current one leaves the level unchanged.
pub fn raise(new: EfiTpl) -> EfiTpl {
    with_current(|level| level.fetch_max(new, Ordering::AcqRel))
}

/// Restores a level previously returned by [`raise`].
pub fn restore(previous: EfiTpl) {
    with_current(|level| level.store(previous, Ordering::Release));
}
