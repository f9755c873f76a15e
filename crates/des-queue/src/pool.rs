//! `ReusePool<T>` — free-list allocator for short-lived records.
//!
//! # Why this exists
//!
//! A busy scheduler creates and retires one record per delivered event.  At
//! high event rates the allocator round-trip dominates the cost of an
//! enqueue, so retired records go back on a free list and are re-initialized
//! in place by the next `acquire`.
//!
//! The pool grows to the high-water mark of concurrently live records and
//! never shrinks.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

// ── Trait ─────────────────────────────────────────────────────────────────────

/// A record that can be recycled by a [`ReusePool`].
///
/// # Contract
///
/// - `initialize` must overwrite *every* field a caller can observe, so that
///   nothing from a previous use survives.
/// - `reset` must drop every reference the record holds; an idle record must
///   not keep its last handler or event alive.
pub trait Reusable {
    /// Everything needed to bring a record into the initialized state.
    type Args;

    fn initialize(&mut self, args: Self::Args);

    fn reset(&mut self);
}

impl<T: Reusable> Reusable for Box<T> {
    type Args = T::Args;

    #[inline]
    fn initialize(&mut self, args: Self::Args) {
        (**self).initialize(args);
    }

    #[inline]
    fn reset(&mut self) {
        (**self).reset();
    }
}

// ── Pool ──────────────────────────────────────────────────────────────────────

/// Thread-safe free list of `T` plus a factory for fresh records.
///
/// `acquire` and `release` are the only way records enter and leave the
/// pool; both take a single short lock.
pub struct ReusePool<T: Reusable> {
    free:    Mutex<Vec<T>>,
    factory: fn() -> T,
    /// Records ever built by `factory`.
    created: AtomicUsize,
}

impl<T: Reusable> ReusePool<T> {
    /// Create an empty pool that builds new records with `factory`.
    pub fn new(factory: fn() -> T) -> Self {
        Self {
            free: Mutex::new(Vec::new()),
            factory,
            created: AtomicUsize::new(0),
        }
    }

    /// Create a pool pre-filled with `n` idle records.
    pub fn with_capacity(factory: fn() -> T, n: usize) -> Self {
        let free: Vec<T> = (0..n).map(|_| factory()).collect();
        Self {
            free: Mutex::new(free),
            factory,
            created: AtomicUsize::new(n),
        }
    }

    /// Hand out an initialized record, recycled if one is idle.
    pub fn acquire(&self, args: T::Args) -> T {
        let recycled = self.lock_free().pop();
        let mut item = match recycled {
            Some(item) => item,
            None => {
                self.created.fetch_add(1, Ordering::Relaxed);
                (self.factory)()
            }
        };
        item.initialize(args);
        item
    }

    /// Return a record.  The caller gives up ownership; the record is reset
    /// before it becomes idle.
    pub fn release(&self, mut item: T) {
        item.reset();
        self.lock_free().push(item);
    }

    /// Return a batch of records under a single lock.
    pub fn release_all<I: IntoIterator<Item = T>>(&self, items: I) {
        let mut free = self.lock_free();
        for mut item in items {
            item.reset();
            free.push(item);
        }
    }

    /// Records currently idle on the free list.
    pub fn idle(&self) -> usize {
        self.lock_free().len()
    }

    /// Records ever constructed (the pool's high-water mark).
    pub fn created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    fn lock_free(&self) -> MutexGuard<'_, Vec<T>> {
        // A panic inside the two-line critical sections above cannot leave the
        // Vec half-updated, so a poisoned lock is still usable.
        self.free.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Reusable + Default> Default for ReusePool<T> {
    fn default() -> Self {
        Self::new(T::default)
    }
}
