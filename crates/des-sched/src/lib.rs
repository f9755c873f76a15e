//! `des-sched` — the scheduler and its dispatch loop.
//!
//! # Dispatch loop
//!
//! ```text
//! loop:
//!   ① Idle-empty  — queue empty: exit (exit-on-empty), poll empty-queue end
//!                   conditions every poll interval, or block until an insert.
//!   ② Item-ready  — head past the end time → terminate.  Real-time head due
//!                   in the future → timed wait (an earlier insert or
//!                   terminate() cuts it short), then back to ②.
//!   ③ Check       — every-delivery end conditions, lock released; any true
//!                   → terminate.  Back to ① once they pass for this head.
//!   ④ Pop         — remove the head and advance the clock, under the lock.
//!   ⑤ Deliver     — Handler::handle(event, scheduler, time), outside the lock;
//!                   the record goes back to the pool.
//! ```
//!
//! One thread runs the loop per scheduler, so handlers of one scheduler never
//! run concurrently; any number of schedulers can run side by side.
//!
//! # Quick-start
//!
//! ```rust
//! use des_core::{generic_event, TimeUnit};
//! use des_sched::{handler_fn, Scheduler, SchedulerBuilder};
//!
//! let es = SchedulerBuilder::new().name("demo").exit_on_empty_queue(true).build()?;
//! let tick = handler_fn(|_event, es: &Scheduler, time| {
//!     if time < 30 {
//!         es.schedule_after_ticks(handler_fn(|_, _, _| {}), generic_event(), 10).unwrap();
//!     }
//! });
//! es.schedule_at(tick, generic_event(), 20, TimeUnit::Milliseconds)?;
//! es.run()?;
//! assert_eq!(es.total_events_delivered(), 2);
//! # Ok::<(), des_core::DesError>(())
//! ```

pub mod builder;
pub mod end_condition;
pub mod handler;
pub mod scheduler;


pub use builder::SchedulerBuilder;
pub use end_condition::{EndCondition, StopFlag};
pub use handler::{handler_fn, FnHandler, Handler, HandlerRef};
pub use scheduler::{ExitReason, Scheduler};
