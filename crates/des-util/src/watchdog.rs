//! `Watchdog` — raises an alert when a scheduler's dispatch thread stops
//! making progress.
//!
//! The watchdog is a self-rescheduling handler: every delivery "touches" it
//! and queues the next delivery `sleep_interval` ticks later.  On its first
//! delivery it also starts a monitor thread that wakes every
//! `alert_interval` and alerts if no touch arrived since the previous check.
//! A handler that blocks, or a flood of earlier work, starves the watchdog's
//! own deliveries and trips the alert.
//!
//! Use it with real-time schedulers; in simulated time the watchdog would
//! re-schedule itself as fast as the loop can spin.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::thread::{self, ThreadId};
use std::time::Duration;

use des_core::{generic_event, DesError, DesResult, EventRef, Time};
use des_sched::{Handler, Scheduler};
use tracing::{debug, error, warn};

/// What a stall alert reports about the monitored thread.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StallReport {
    /// Name of the dispatch thread that first delivered to the watchdog.
    pub thread_name: Option<String>,
    pub thread_id:   ThreadId,
    pub scheduler:   String,
    /// Scheduler time when the alert was raised.
    pub time:        Time,
    /// 1-based alert counter.
    pub alert:       u64,
}

type StallCallback = Box<dyn Fn(&StallReport) + Send + Sync>;

/// Liveness monitor for one scheduler's dispatch thread.
pub struct Watchdog {
    me:             Weak<Watchdog>,
    /// Delay between touches, in the scheduler's finest unit.
    sleep_interval: Time,
    alert_interval: Duration,
    touched:        AtomicBool,
    alerts:         AtomicU64,
    monitoring:     AtomicBool,
    started:        OnceLock<ThreadId>,
    on_stall:       Option<StallCallback>,
}

impl Watchdog {
    /// Alerts are logged with `tracing::error!`.
    pub fn new(sleep_interval: Time, alert_interval: Duration) -> Arc<Self> {
        Self::build(sleep_interval, alert_interval, None)
    }

    /// Alerts go to `on_stall` instead of the log.  The callback runs on the
    /// monitor thread.
    pub fn with_on_stall(
        sleep_interval: Time,
        alert_interval: Duration,
        on_stall:       impl Fn(&StallReport) + Send + Sync + 'static,
    ) -> Arc<Self> {
        Self::build(sleep_interval, alert_interval, Some(Box::new(on_stall)))
    }

    fn build(sleep_interval: Time, alert_interval: Duration, on_stall: Option<StallCallback>) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            sleep_interval,
            alert_interval,
            touched: AtomicBool::new(false),
            alerts: AtomicU64::new(0),
            monitoring: AtomicBool::new(false),
            started: OnceLock::new(),
            on_stall,
        })
    }

    /// Queue the first touch on `scheduler`, for immediate delivery.
    pub fn arm(self: &Arc<Self>, scheduler: &Scheduler) -> DesResult<()> {
        scheduler.schedule_now(Arc::clone(self) as Arc<dyn Handler>, generic_event())
    }

    /// Alerts raised so far.
    pub fn alerts(&self) -> u64 {
        self.alerts.load(Ordering::Acquire)
    }

    /// `true` while the monitor thread is running.
    pub fn is_monitoring(&self) -> bool {
        self.monitoring.load(Ordering::Acquire)
    }

    /// The dispatch thread being watched, once the first touch has arrived.
    pub fn monitored_thread(&self) -> Option<ThreadId> {
        self.started.get().copied()
    }

    fn start_monitor(&self, scheduler: &Scheduler) {
        let current = thread::current();
        let thread_name = current.name().map(str::to_owned);
        let thread_id = current.id();
        if self.started.set(thread_id).is_err() {
            return;
        }

        let me = self.me.clone();
        let scheduler = scheduler.clone();
        let period = self.alert_interval;
        self.monitoring.store(true, Ordering::Release);
        let spawned = thread::Builder::new()
            .name(format!("watchdog-{}", scheduler.name()))
            .spawn(move || monitor_loop(me, scheduler, period, thread_name, thread_id));
        if let Err(e) = spawned {
            self.monitoring.store(false, Ordering::Release);
            error!(error = %e, "failed to start watchdog thread");
        }
    }

    fn check(&self, scheduler: &Scheduler, thread_name: &Option<String>, thread_id: ThreadId) {
        if self.touched.swap(false, Ordering::AcqRel) {
            return;
        }
        let report = StallReport {
            thread_name: thread_name.clone(),
            thread_id,
            scheduler:   scheduler.name().to_owned(),
            time:        scheduler.current_time(),
            alert:       self.alerts.fetch_add(1, Ordering::AcqRel) + 1,
        };
        match &self.on_stall {
            Some(callback) => callback(&report),
            None => error!(
                scheduler = %report.scheduler,
                thread = report.thread_name.as_deref().unwrap_or("<unnamed>"),
                thread_id = ?report.thread_id,
                time = report.time,
                silent_for = ?self.alert_interval,
                "watchdog alert: dispatch thread made no progress"
            ),
        }
    }
}

fn monitor_loop(
    watchdog:    Weak<Watchdog>,
    scheduler:   Scheduler,
    period:      Duration,
    thread_name: Option<String>,
    thread_id:   ThreadId,
) {
    debug!(scheduler = %scheduler, ?period, "watchdog started");
    loop {
        thread::sleep(period);
        let Some(dog) = watchdog.upgrade() else { break };
        if scheduler.is_terminated() {
            dog.monitoring.store(false, Ordering::Release);
            break;
        }
        dog.check(&scheduler, &thread_name, thread_id);
    }
    debug!(scheduler = %scheduler, "watchdog stopped");
}

impl Handler for Watchdog {
    fn handle(&self, event: &EventRef, scheduler: &Scheduler, _time: Time) {
        self.touched.store(true, Ordering::Release);
        if self.started.get().is_none() {
            self.start_monitor(scheduler);
        }
        let Some(me) = self.me.upgrade() else { return };
        match scheduler.schedule_after_ticks(me, Arc::clone(event), self.sleep_interval) {
            Ok(()) => {}
            Err(DesError::Terminated(_)) => debug!(scheduler = %scheduler, "watchdog not re-armed after terminate"),
            Err(e) => warn!(scheduler = %scheduler, error = %e, "watchdog not re-armed; monitoring will report a stall"),
        }
    }
}

impl fmt::Debug for Watchdog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watchdog")
            .field("sleep_interval", &self.sleep_interval)
            .field("alert_interval", &self.alert_interval)
            .field("alerts", &self.alerts())
            .field("monitoring", &self.is_monitoring())
            .finish_non_exhaustive()
    }
}
