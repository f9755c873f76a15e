//! Scheduler configuration.

use std::time::Duration;

use crate::{DesError, DesResult, Time, TimeUnit};

/// Default poll interval for empty-queue end conditions.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Settings for one scheduler instance.
///
/// Typically built in code or loaded from a JSON/TOML file by the application
/// crate (enable the `serde` feature) and handed to
/// `des_sched::SchedulerBuilder::from_config`.  Missing fields take their
/// [`Default`] values when deserializing.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SchedulerConfig {
    /// Display name used in logs and by the console prompt.  `None` picks a
    /// unique `scheduler-<n>` name.
    pub name: Option<String>,

    /// Granularity every timestamp is normalized to.  Default: milliseconds.
    pub finest_time_unit: TimeUnit,

    /// Pace delivery against the wall clock instead of running as fast as
    /// possible.  Default: `false` (simulated time).
    pub real_time: bool,

    /// Return from `run()` as soon as the queue is empty instead of waiting
    /// for more work.  Default: `false`.
    pub exit_on_empty_queue: bool,

    /// Absolute cutoff, in `finest_time_unit`.  Items due after it are never
    /// delivered.  Default: none.
    pub end_time: Option<Time>,

    /// How often empty-queue end conditions are re-evaluated while the
    /// dispatch thread waits for work.  Default: 100 ms.
    pub poll_interval_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            name:                None,
            finest_time_unit:    TimeUnit::Milliseconds,
            real_time:           false,
            exit_on_empty_queue: false,
            end_time:            None,
            poll_interval_ms:    DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl SchedulerConfig {
    /// Check the settings for internal consistency.
    pub fn validate(&self) -> DesResult<()> {
        if self.poll_interval_ms == 0 {
            return Err(DesError::Config("poll_interval_ms must be greater than zero".into()));
        }
        if self.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(DesError::Config("scheduler name must not be blank".into()));
        }
        Ok(())
    }

    /// Poll interval as a [`Duration`].
    #[inline]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
