//! `des-monitor` — a line-oriented console for a running scheduler.
//!
//! | Module       | Contents                                                |
//! |--------------|---------------------------------------------------------|
//! | [`command`]  | `Command` — the command words and their usage lines     |
//! | [`session`]  | `Session` — prompt/read/execute loop over any I/O pair  |
//! | [`listener`] | terminal and TCP socket attachment                      |
//! | [`error`]    | `MonitorError`, `MonitorResult`                         |
//!
//! ```text
//! market > de
//! 1042
//! market > ql
//! 3
//! market > x
//! Exiting the monitor.
//! EXITING
//! ```

pub mod command;
pub mod error;
pub mod listener;
pub mod session;


pub use command::Command;
pub use error::{MonitorError, MonitorResult};
pub use listener::{spawn_socket_monitor, spawn_terminal_monitor, SocketMonitor};
pub use session::{Session, EXITING};
