//! `des-core` — foundational types for the `rust_des` scheduling kernel.
//!
//! This crate is a dependency of every other `des-*` crate.  It intentionally
//! has no `des-*` dependencies and minimal external ones (only `thiserror`,
//! plus optional `serde`).
//!
//! # What lives here
//!
//! | Module        | Contents                                                |
//! |---------------|---------------------------------------------------------|
//! | [`time`]      | `Time`, `TimeUnit` (normalization, wall clock)          |
//! | [`event`]     | `Event` capability, `EventRef`, `GenericEvent` sentinel |
//! | [`config`]    | `SchedulerConfig`                                       |
//! | [`error`]     | `DesError`, `DesResult`                                 |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                       |
//! |---------|--------------------------------------------------------------|
//! | `serde` | Adds `Serialize`/`Deserialize` to `TimeUnit` and             |
//! |         | `SchedulerConfig` so applications can load them from files.  |

pub mod config;
pub mod error;
pub mod event;
pub mod time;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use config::SchedulerConfig;
pub use error::{DesError, DesResult};
pub use event::{generic_event, type_tag_of, AsAny, Event, EventRef, GenericEvent};
pub use time::{Time, TimeUnit};
