//  LOCK.rs
//    by Ray Plante
//
//  Description:
//!   Implements the reentrant lock shared by every queue in a `Blackboard`.
//!   A plain `std::sync::Mutex` cannot be re-acquired by the thread that
//!   already holds it, which breaks as soon as one transactional scope
//!   nests inside another (e.g. a scheduler move that itself calls a
//!   Blackboard convenience helper while already inside one). This wraps a
//!   `Mutex` with a thread-id-and-depth counter so the owning thread can
//!   re-enter freely while every other thread still blocks.

use std::sync::Mutex;
use std::thread::{self, ThreadId};


/***** LIBRARY *****/
/// Tracks which thread currently holds the lock, and how many nested scopes
/// that thread is inside.
struct Owner {
    thread: ThreadId,
    depth: usize,
}

/// A re-entrant mutual-exclusion lock. Construct one per `Blackboard` and
/// share it (via `Arc`) across every `BlackboardQueue` the Blackboard owns,
/// so a transaction spanning multiple queues serializes against every other
/// thread as a single unit.
pub struct BlackboardLock {
    inner: Mutex<Option<Owner>>,
}

impl BlackboardLock {
    pub fn new() -> Self {
        Self { inner: Mutex::new(None) }
    }

    /// Acquires the lock for the calling thread, blocking if another thread
    /// holds it. If the calling thread already holds it, this simply
    /// increments the re-entrancy depth and returns immediately.
    ///
    /// # Returns
    /// A [`BlackboardLockGuard`] that releases one level of re-entrancy (or
    /// the lock itself, at depth 1) when dropped.
    pub fn acquire(&self) -> BlackboardLockGuard<'_> {
        let me = thread::current().id();
        loop {
            let mut owner = self.inner.lock().unwrap_or_else(|poison| poison.into_inner());
            match &mut *owner {
                Some(o) if o.thread == me => {
                    o.depth += 1;
                    return BlackboardLockGuard { lock: self };
                },
                None => {
                    *owner = Some(Owner { thread: me, depth: 1 });
                    return BlackboardLockGuard { lock: self };
                },
                Some(_) => {
                    // Someone else holds it; drop our view of the mutex and spin.
                    // The blackboard is a low-contention, single-process resource
                    // (see the shared-resource policy this crate implements), so
                    // a short yield between attempts is sufficient.
                    drop(owner);
                    thread::yield_now();
                },
            }
        }
    }

    fn release(&self) {
        let mut owner = self.inner.lock().unwrap_or_else(|poison| poison.into_inner());
        let done = match &mut *owner {
            Some(o) => {
                o.depth -= 1;
                o.depth == 0
            },
            None => false,
        };
        if done { *owner = None; }
    }
}

impl Default for BlackboardLock {
    fn default() -> Self { Self::new() }
}

/// An RAII guard returned by [`BlackboardLock::acquire`]. Release happens
/// on drop; the lock type intentionally does not expose a raw `MutexGuard`
/// since the resource it protects (a `Blackboard`'s queues) is accessed
/// through its own `&`/`&mut` methods, not through this guard.
pub struct BlackboardLockGuard<'a> {
    lock: &'a BlackboardLock,
}

impl<'a> Drop for BlackboardLockGuard<'a> {
    fn drop(&mut self) { self.lock.release(); }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn same_thread_can_reenter() {
        let lock = BlackboardLock::new();
        let _outer = lock.acquire();
        let _inner = lock.acquire();
        // Reaching here without deadlocking is the assertion.
    }

    #[test]
    fn releases_fully_only_after_matching_depth() {
        let lock = Arc::new(BlackboardLock::new());
        let outer = lock.acquire();
        let inner = lock.acquire();
        drop(inner);

        let other_lock = Arc::clone(&lock);
        let entered = Arc::new(AtomicUsize::new(0));
        let entered_clone = Arc::clone(&entered);
        let handle = thread::spawn(move || {
            let _g = other_lock.acquire();
            entered_clone.fetch_add(1, Ordering::SeqCst);
        });

        thread::sleep(std::time::Duration::from_millis(50));
        assert_eq!(entered.load(Ordering::SeqCst), 0, "other thread must not enter while outer scope is held");

        drop(outer);
        handle.join().unwrap();
        assert_eq!(entered.load(Ordering::SeqCst), 1);
    }
}
