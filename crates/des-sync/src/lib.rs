//! `des-sync` — keeping several schedulers in lock-step.
//!
//! | Module           | Contents                                          |
//! |------------------|---------------------------------------------------|
//! | [`synchronizer`] | `Synchronizer` barrier handler, `SyncEvent`       |
//! | [`liveness`]     | `Roster`, `Participant`, `AliveGuard`, `Liveness` |
//!
//! Each scheduler runs on its own thread; the barrier blocks the dispatch
//! thread inside `Handler::handle`, which is how a round-based simulation
//! holds fast schedulers back until the slowest one catches up.

pub mod liveness;
pub mod synchronizer;

#[cfg(test)]
mod tests;

pub use liveness::{AliveGuard, Liveness, Participant, Roster};
pub use synchronizer::{sync_event, SyncEvent, Synchronizer, DEFAULT_CHECK_INTERVAL};
