//! Error types for des-monitor.

use thiserror::Error;

/// Errors raised while serving a console session.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("console I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unknown command or illegal arguments: {0}")]
    UnknownCommand(String),
}

/// Alias for `Result<T, MonitorError>`.
pub type MonitorResult<T> = Result<T, MonitorError>;
