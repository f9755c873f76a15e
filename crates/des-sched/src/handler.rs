//! The `Handler` trait — the main extension point for user code.

use std::sync::Arc;

use des_core::{EventRef, Time};

use crate::Scheduler;

/// Receives events delivered by a [`Scheduler`].
///
/// `handle` runs on the scheduler's dispatch thread, strictly one call at a
/// time per scheduler.  It may schedule further events on `scheduler` (or on
/// any other scheduler) and may block; while it runs, the scheduler delivers
/// nothing else.
///
/// `time` is the delivery time in the scheduler's finest unit: the item's due
/// time, or the scheduler's current time for items scheduled with
/// [`Scheduler::schedule_now`].
///
/// # Thread safety
///
/// The same handler may be registered with several schedulers running on
/// different threads, so implementations must be `Send + Sync`; mutable state
/// goes behind a `Mutex` or atomics.
///
/// # Panics
///
/// A panic inside `handle` is not caught: it unwinds out of
/// [`Scheduler::run`] and ends that dispatch thread.
///
/// # Example
///
/// ```rust
/// use std::sync::atomic::{AtomicU64, Ordering};
/// use des_core::{EventRef, Time};
/// use des_sched::{Handler, Scheduler};
///
/// struct Counter(AtomicU64);
///
/// impl Handler for Counter {
///     fn handle(&self, _event: &EventRef, _es: &Scheduler, _time: Time) {
///         self.0.fetch_add(1, Ordering::Relaxed);
///     }
/// }
/// ```
pub trait Handler: Send + Sync + 'static {
    fn handle(&self, event: &EventRef, scheduler: &Scheduler, time: Time);
}

/// Shared handle to a handler, as stored in queued records.
pub type HandlerRef = Arc<dyn Handler>;

// ── Closure adapter ───────────────────────────────────────────────────────────

/// A [`Handler`] backed by a closure.
pub struct FnHandler<F>(pub F);

impl<F> Handler for FnHandler<F>
where
    F: Fn(&EventRef, &Scheduler, Time) + Send + Sync + 'static,
{
    #[inline]
    fn handle(&self, event: &EventRef, scheduler: &Scheduler, time: Time) {
        (self.0)(event, scheduler, time)
    }
}

/// Wrap a closure as a [`HandlerRef`].
pub fn handler_fn<F>(f: F) -> HandlerRef
where
    F: Fn(&EventRef, &Scheduler, Time) + Send + Sync + 'static,
{
    Arc::new(FnHandler(f))
}
