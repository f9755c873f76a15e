//! Kernel error type.
//!
//! Every scheduling-contract violation is reported synchronously at the call
//! site as one of these variants; nothing invalid is ever enqueued.  Faults
//! raised by handlers are *not* represented here; they unwind out of
//! `Scheduler::run` untouched.

use thiserror::Error;

use crate::Time;

/// The top-level error type shared by the `des-*` crates.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DesError {
    #[error("event scheduled for {requested}, current time = {now}")]
    ScheduledInPast { requested: Time, now: Time },

    #[error("events must be scheduled for now or in the future (relative delay {0} < 0)")]
    NegativeDelay(i64),

    #[error("scheduler {0} has been terminated")]
    Terminated(String),

    #[error("scheduler {0} is already running on another thread")]
    AlreadyRunning(String),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Shorthand result type for all `des-*` crates.
pub type DesResult<T> = Result<T, DesError>;
