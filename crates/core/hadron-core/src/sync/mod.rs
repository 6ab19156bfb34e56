//! Synchronization primitives for the DXE phase.
//!
//! Provides [`TplLock`], the critical section guarding state shared between
//! the dispatcher and notification callbacks. Const-constructable so it can
//! be placed in `static` items, and usable before any allocator exists.

mod tpl_lock;

pub use tpl_lock::{TplLock, TplLockGuard};
