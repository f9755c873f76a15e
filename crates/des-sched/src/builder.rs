//! Fluent builder for constructing a [`Scheduler`].

use std::sync::Arc;
use std::time::Duration;

use des_core::{DesResult, SchedulerConfig, Time, TimeUnit};

use crate::{EndCondition, Scheduler};

/// Fluent builder for [`Scheduler`].
///
/// # Options (all have defaults)
///
/// | Method                               | Default                 |
/// |--------------------------------------|-------------------------|
/// | `.name(s)`                           | `scheduler-<n>`         |
/// | `.finest_time_unit(u)`               | `TimeUnit::Milliseconds`|
/// | `.real_time(b)`                      | `false`                 |
/// | `.exit_on_empty_queue(b)`            | `false`                 |
/// | `.end_time(t)`                       | none                    |
/// | `.poll_interval(d)`                  | 100 ms                  |
/// | `.end_condition_on_empty_queue(c)`   | none                    |
/// | `.end_condition_on_event_delivery(c)`| none                    |
///
/// # Example
///
/// ```rust,ignore
/// let es = SchedulerBuilder::new()
///     .name("market")
///     .finest_time_unit(TimeUnit::Microseconds)
///     .real_time(true)
///     .build()?;
/// ```
#[derive(Default)]
pub struct SchedulerBuilder {
    config:      SchedulerConfig,
    on_empty:    Vec<Arc<dyn EndCondition>>,
    on_delivery: Vec<Arc<dyn EndCondition>>,
}

impl SchedulerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a loaded configuration.
    pub fn from_config(config: SchedulerConfig) -> Self {
        Self { config, ..Self::default() }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = Some(name.into());
        self
    }

    pub fn finest_time_unit(mut self, unit: TimeUnit) -> Self {
        self.config.finest_time_unit = unit;
        self
    }

    /// Pace delivery against the wall clock.
    pub fn real_time(mut self, on: bool) -> Self {
        self.config.real_time = on;
        self
    }

    pub fn exit_on_empty_queue(mut self, on: bool) -> Self {
        self.config.exit_on_empty_queue = on;
        self
    }

    /// Absolute end time in the finest unit.  Set the unit first.
    pub fn end_time(mut self, time: Time) -> Self {
        self.config.end_time = Some(time);
        self
    }

    /// Interval between empty-queue end-condition checks.  Sub-millisecond
    /// values round down and fail validation if they reach zero.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn end_condition_on_empty_queue(mut self, condition: Arc<dyn EndCondition>) -> Self {
        self.on_empty.push(condition);
        self
    }

    pub fn end_condition_on_event_delivery(mut self, condition: Arc<dyn EndCondition>) -> Self {
        self.on_delivery.push(condition);
        self
    }

    /// Validate the settings and return a scheduler ready to `run`.
    pub fn build(self) -> DesResult<Scheduler> {
        self.config.validate()?;
        Ok(Scheduler::from_parts(&self.config, self.on_empty, self.on_delivery))
    }
}
