//! `des-util` — ready-made handlers built on the scheduler's public surface.
//!
//! | Module       | Contents                                             |
//! |--------------|------------------------------------------------------|
//! | [`pubsub`]   | `PubSub` — exact-type fan-out to subscribed handlers |
//! | [`watchdog`] | `Watchdog`, `StallReport` — dispatch-thread liveness |
//!
//! # Feature flags
//!
//! | Flag      | Effect                                                  |
//! |-----------|---------------------------------------------------------|
//! | `fx-hash` | FxHash instead of SipHash for the subscription index.   |

pub mod pubsub;
pub mod watchdog;

#[cfg(test)]
mod tests;

pub use pubsub::PubSub;
pub use watchdog::{StallReport, Watchdog};
