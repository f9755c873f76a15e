//! End conditions — predicates that can stop a scheduler from outside the
//! normal queue-draining path.
//!
//! Two registration classes trade responsiveness against overhead:
//!
//! - **on empty queue** — polled every poll interval while the dispatch
//!   thread has nothing to deliver.  Cheap; reacts within one interval.
//! - **on event delivery** — checked before every single delivery.  Reacts
//!   immediately, but costs one call per registered predicate per event.

use std::sync::atomic::{AtomicBool, Ordering};

/// A termination predicate.
///
/// # Contract
///
/// - May be called very often and from the dispatch thread only.
/// - Should not have side effects and must not block.
/// - It is called without any scheduler lock held, so it may query the
///   scheduler (`queue_length`, `total_events_delivered`, …).
pub trait EndCondition: Send + Sync {
    /// `true` once the scheduler should terminate.
    fn is_complete(&self) -> bool;
}

impl<F> EndCondition for F
where
    F: Fn() -> bool + Send + Sync,
{
    #[inline]
    fn is_complete(&self) -> bool {
        self()
    }
}

// ── StopFlag ──────────────────────────────────────────────────────────────────

/// An end condition that becomes complete once [`raise`][Self::raise] is
/// called, from any thread.
///
/// Unlike `Scheduler::terminate`, raising the flag lets the scheduler finish
/// the delivery in progress and stop at its next check point.
#[derive(Debug, Default)]
pub struct StopFlag(AtomicBool);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

impl EndCondition for StopFlag {
    #[inline]
    fn is_complete(&self) -> bool {
        self.is_raised()
    }
}
