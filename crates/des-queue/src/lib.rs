//! `des-queue` — the data structures under a scheduler's monitor.
//!
//! # Crate layout
//!
//! | Module      | Contents                                                   |
//! |-------------|------------------------------------------------------------|
//! | [`pool`]    | `Reusable` trait, `ReusePool<T>` free-list allocator       |
//! | [`item`]    | `ScheduledItem<H>` — the pooled (handler, event, due) record |
//! | [`queue`]   | `EventQueue<H>` — min-heap on `(due, seq)`, `None` first   |
//!
//! # Ownership model (summary)
//!
//! ```text
//! ReusePool ──acquire──▶ producer ──insert──▶ EventQueue
//!     ▲                                          │
//!     └────────release──── dispatch loop ◀──remove_min
//! ```
//!
//! Records move by value at every arrow, so no record is ever reachable from
//! two owners.  Nothing here is internally synchronized except the pool's
//! free list; the queue lives inside the scheduler's single monitor.

pub mod item;
pub mod pool;
pub mod queue;

#[cfg(test)]
mod tests;

pub use item::ScheduledItem;
pub use pool::{Reusable, ReusePool};
pub use queue::EventQueue;
