//! The `Scheduler` handle and its dispatch loop.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use des_core::{DesError, DesResult, EventRef, SchedulerConfig, Time, TimeUnit};
use des_queue::{EventQueue, ReusePool, ScheduledItem};
use tracing::{debug, info, trace};

use crate::{EndCondition, HandlerRef};

/// A pooled queue record as this crate instantiates it.
type Record = Box<ScheduledItem<HandlerRef>>;

/// Source of default `scheduler-<n>` names.
static NEXT_ID: AtomicU64 = AtomicU64::new(0);

// ── Exit reasons ──────────────────────────────────────────────────────────────

/// Why [`Scheduler::run`] returned.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ExitReason {
    /// The queue emptied while exit-on-empty was set.  The scheduler is not
    /// terminated; `run` may be called again once more work is scheduled.
    QueueDrained,
    /// An end condition reported completion.
    EndCondition,
    /// The next item was due after the end time.
    EndTime,
    /// [`Scheduler::terminate`] was called.
    Terminated,
}

// ── Shared state ──────────────────────────────────────────────────────────────

/// Everything guarded by the scheduler's single monitor.
struct Monitor {
    queue:            EventQueue<HandlerRef>,
    max_queue_length: usize,
    terminated:       bool,
    exit_on_empty:    bool,
    end_time:         Option<Time>,
}

struct Shared {
    name:          String,
    unit:          TimeUnit,
    real_time:     bool,
    poll_interval: Duration,

    monitor: Mutex<Monitor>,
    /// Signalled on every insert that produces a new head, and on terminate.
    ready:   Condvar,

    pool: ReusePool<Record>,

    /// Simulated clock: due time of the last delivered item.  Written only by
    /// the dispatch thread, under the monitor.
    current_time: AtomicI64,
    start_time:   AtomicI64,
    delivered:    AtomicU64,
    running:      AtomicBool,

    on_empty:    RwLock<Vec<Arc<dyn EndCondition>>>,
    on_delivery: RwLock<Vec<Arc<dyn EndCondition>>>,
}

/// When a new record is due, before it is resolved against the clock.
#[derive(Copy, Clone, Debug)]
enum Due {
    Now,
    At(Time),
    After(Time),
}

// ── Scheduler ─────────────────────────────────────────────────────────────────

/// A discrete-event scheduler: one time-ordered queue, one clock, one
/// dispatch loop.
///
/// `Scheduler` is a cheap handle; clones share the same instance, so any
/// number of producer threads can hold one and schedule into it while a
/// dedicated thread sits in [`run`][Self::run].
///
/// Create via [`SchedulerBuilder`][crate::SchedulerBuilder] or
/// [`Scheduler::new`].
#[derive(Clone)]
pub struct Scheduler {
    shared: Arc<Shared>,
}

impl Scheduler {
    /// A simulated-time, millisecond, block-on-empty scheduler.
    pub fn new(name: impl Into<String>) -> Self {
        let config = SchedulerConfig { name: Some(name.into()), ..SchedulerConfig::default() };
        Self::from_parts(&config, Vec::new(), Vec::new())
    }

    /// Validate `config` and build a scheduler from it.
    pub fn from_config(config: &SchedulerConfig) -> DesResult<Self> {
        config.validate()?;
        Ok(Self::from_parts(config, Vec::new(), Vec::new()))
    }

    pub(crate) fn from_parts(
        config:      &SchedulerConfig,
        on_empty:    Vec<Arc<dyn EndCondition>>,
        on_delivery: Vec<Arc<dyn EndCondition>>,
    ) -> Self {
        let name = config
            .name
            .clone()
            .unwrap_or_else(|| format!("scheduler-{}", NEXT_ID.fetch_add(1, Ordering::Relaxed)));

        let shared = Shared {
            name,
            unit:          config.finest_time_unit,
            real_time:     config.real_time,
            poll_interval: config.poll_interval(),
            monitor: Mutex::new(Monitor {
                queue:            EventQueue::new(),
                max_queue_length: 0,
                terminated:       false,
                exit_on_empty:    config.exit_on_empty_queue,
                end_time:         config.end_time,
            }),
            ready:        Condvar::new(),
            pool:         ReusePool::new(Record::default),
            current_time: AtomicI64::new(0),
            start_time:   AtomicI64::new(0),
            delivered:    AtomicU64::new(0),
            running:      AtomicBool::new(false),
            on_empty:     RwLock::new(on_empty),
            on_delivery:  RwLock::new(on_delivery),
        };
        Self { shared: Arc::new(shared) }
    }

    // ── Scheduling ────────────────────────────────────────────────────────

    /// Deliver `event` to `handler` at absolute `time`, given in `unit`.
    ///
    /// # Errors
    ///
    /// [`DesError::ScheduledInPast`] if `time`, normalized to the finest
    /// unit, is earlier than [`current_time`][Self::current_time];
    /// [`DesError::Terminated`] after [`terminate`][Self::terminate].  In
    /// both cases nothing is enqueued.
    pub fn schedule_at(
        &self,
        handler: HandlerRef,
        event:   EventRef,
        time:    Time,
        unit:    TimeUnit,
    ) -> DesResult<()> {
        let due = self.shared.unit.convert(time, unit);
        self.enqueue(handler, event, Due::At(due))
    }

    /// [`schedule_at`][Self::schedule_at] with `time` in the finest unit.
    pub fn schedule_at_ticks(&self, handler: HandlerRef, event: EventRef, time: Time) -> DesResult<()> {
        self.enqueue(handler, event, Due::At(time))
    }

    /// Deliver `event` to `handler` `delay` units after the current time.
    ///
    /// The current time is read at the moment the record is enqueued, so a
    /// relative schedule can never land in the past.
    ///
    /// # Errors
    ///
    /// [`DesError::NegativeDelay`] if `delay < 0`;
    /// [`DesError::Terminated`] after [`terminate`][Self::terminate].
    pub fn schedule_after(
        &self,
        handler: HandlerRef,
        event:   EventRef,
        delay:   i64,
        unit:    TimeUnit,
    ) -> DesResult<()> {
        if delay < 0 {
            return Err(DesError::NegativeDelay(delay));
        }
        let delta = self.shared.unit.convert(delay, unit);
        self.enqueue(handler, event, Due::After(delta))
    }

    /// [`schedule_after`][Self::schedule_after] with `delay` in the finest unit.
    pub fn schedule_after_ticks(&self, handler: HandlerRef, event: EventRef, delay: i64) -> DesResult<()> {
        if delay < 0 {
            return Err(DesError::NegativeDelay(delay));
        }
        self.enqueue(handler, event, Due::After(delay))
    }

    /// Deliver `event` to `handler` ahead of every timestamped item.
    pub fn schedule_now(&self, handler: HandlerRef, event: EventRef) -> DesResult<()> {
        self.enqueue(handler, event, Due::Now)
    }

    fn enqueue(&self, handler: HandlerRef, event: EventRef, due: Due) -> DesResult<()> {
        let shared = &*self.shared;
        let mut m = shared.lock();
        if m.terminated {
            return Err(DesError::Terminated(shared.name.clone()));
        }

        // Resolved under the monitor: the dispatch thread advances the clock
        // under the same lock, so an accepted record can never be behind it.
        let due = match due {
            Due::Now => None,
            Due::At(t) => {
                let now = self.current_time();
                if t < now {
                    return Err(DesError::ScheduledInPast { requested: t, now });
                }
                Some(t)
            }
            Due::After(delta) => Some(self.current_time().saturating_add(delta)),
        };

        let record = shared.pool.acquire((handler, event, due));
        let new_head = m.queue.insert(record);
        let len = m.queue.len();
        m.max_queue_length = m.max_queue_length.max(len);
        if new_head {
            shared.ready.notify_all();
        }
        trace!(scheduler = %shared.name, ?due, queue_length = len, "appended");
        Ok(())
    }

    // ── Clock ─────────────────────────────────────────────────────────────

    /// Current time in the finest unit.
    ///
    /// Real-time mode: the wall clock since the Unix epoch.  Simulated mode:
    /// the due time of the most recently delivered item (0 before the first).
    pub fn current_time(&self) -> Time {
        if self.shared.real_time {
            self.shared.unit.wall_clock()
        } else {
            self.shared.current_time.load(Ordering::Acquire)
        }
    }

    /// Current time converted to `unit`.
    pub fn current_time_in(&self, unit: TimeUnit) -> Time {
        unit.convert(self.current_time(), self.shared.unit)
    }

    /// Time at which the most recent `run` began.
    pub fn start_time(&self) -> Time {
        self.shared.start_time.load(Ordering::Acquire)
    }

    /// `current_time() - start_time()`.
    pub fn elapsed_time(&self) -> Time {
        self.current_time() - self.start_time()
    }

    pub fn finest_time_unit(&self) -> TimeUnit {
        self.shared.unit
    }

    pub fn is_real_time(&self) -> bool {
        self.shared.real_time
    }

    // ── Lifecycle controls ────────────────────────────────────────────────

    /// Stop delivering once the next item is due after `time` (in `unit`).
    pub fn set_end_time(&self, time: Time, unit: TimeUnit) {
        let end = self.shared.unit.convert(time, unit);
        self.shared.lock().end_time = Some(end);
        self.shared.ready.notify_all();
    }

    /// [`set_end_time`][Self::set_end_time] relative to the current time.
    pub fn set_end_time_after(&self, delay: i64, unit: TimeUnit) {
        let end = self.current_time().saturating_add(self.shared.unit.convert(delay, unit));
        self.shared.lock().end_time = Some(end);
        self.shared.ready.notify_all();
    }

    pub fn end_time(&self) -> Option<Time> {
        self.shared.lock().end_time
    }

    /// `true`: `run` returns as soon as the queue is empty.
    /// `false` (default): `run` waits for new work, subject to end conditions.
    pub fn exit_on_empty_queue(&self, on: bool) {
        self.shared.lock().exit_on_empty = on;
        self.shared.ready.notify_all();
    }

    /// Add a predicate polled while the queue is empty.
    pub fn register_end_condition_on_empty_queue(&self, condition: Arc<dyn EndCondition>) {
        write_conditions(&self.shared.on_empty).push(condition);
        // A dispatch thread blocked without a timeout must switch to polling.
        let _m = self.shared.lock();
        self.shared.ready.notify_all();
    }

    /// Add a predicate checked before every delivery.  Each registered
    /// predicate costs one call per delivered event.
    pub fn register_end_condition_on_event_delivery(&self, condition: Arc<dyn EndCondition>) {
        write_conditions(&self.shared.on_delivery).push(condition);
    }

    /// Stop the scheduler for good: discard every queued item, wake the
    /// dispatch thread, and reject all further scheduling.
    ///
    /// Callable from any thread, any number of times.
    pub fn terminate(&self) {
        let m = self.shared.lock();
        if m.terminated {
            return;
        }
        let discarded = self.shut_down(m);
        info!(scheduler = %self.shared.name, discarded, "terminated");
    }

    pub fn is_terminated(&self) -> bool {
        self.shared.lock().terminated
    }

    /// `true` while some thread is inside [`run`][Self::run].
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    // ── Observability ─────────────────────────────────────────────────────

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn queue_length(&self) -> usize {
        self.shared.lock().queue.len()
    }

    /// High-water mark of [`queue_length`][Self::queue_length].
    pub fn max_queue_length(&self) -> usize {
        self.shared.lock().max_queue_length
    }

    pub fn total_events_delivered(&self) -> u64 {
        self.shared.delivered.load(Ordering::Relaxed)
    }

    /// Queue records ever allocated; stays at the peak queue size however many
    /// events flow through.
    pub fn records_allocated(&self) -> usize {
        self.shared.pool.created()
    }

    // ── Dispatch loop ─────────────────────────────────────────────────────

    /// Run the dispatch loop on the calling thread until the scheduler stops.
    ///
    /// Intended to be the body of a dedicated thread:
    ///
    /// ```rust,ignore
    /// let worker = { let es = es.clone(); std::thread::spawn(move || es.run()) };
    /// ```
    ///
    /// # Errors
    ///
    /// [`DesError::AlreadyRunning`] if another thread is already running this
    /// scheduler.
    ///
    /// # Panics
    ///
    /// Propagates any panic raised by a handler.
    pub fn run(&self) -> DesResult<ExitReason> {
        let shared = &*self.shared;
        if shared.running.swap(true, Ordering::AcqRel) {
            return Err(DesError::AlreadyRunning(shared.name.clone()));
        }
        let _running = RunningGuard(&shared.running);

        let start = self.current_time();
        shared.start_time.store(start, Ordering::Release);
        info!(scheduler = %shared.name, start_time = start, real_time = shared.real_time, "dispatch loop started");

        let reason = loop {
            match self.next_record() {
                Ok(record) => self.deliver(record),
                Err(reason) => break reason,
            }
        };

        info!(
            scheduler = %shared.name,
            ?reason,
            delivered = self.total_events_delivered(),
            max_queue_length = self.max_queue_length(),
            "dispatch loop exited"
        );
        Ok(reason)
    }

    /// Block until an item may be delivered and pop it, or say why the loop
    /// must end.
    ///
    /// Every-delivery end conditions are checked against the head before it
    /// is popped, so a stop leaves both the queue head and the clock where the
    /// last delivery put them.
    fn next_record(&self) -> Result<Record, ExitReason> {
        let shared = &*self.shared;
        // Sequence number of the head the delivery conditions last passed.
        let mut cleared: Option<u64> = None;
        let mut m = shared.lock();
        loop {
            if m.terminated {
                return Err(ExitReason::Terminated);
            }

            let (head_due, head_seq) = match m.queue.peek_min() {
                Some(head) => (head.due(), head.seq()),
                None => {
                    m = match self.wait_for_work(m) {
                        Ok(m) => m,
                        Err(reason) => return Err(reason),
                    };
                    continue;
                }
            };

            // End-time cutoff.  In real-time mode immediate items are judged
            // by the wall clock.
            if let Some(end) = m.end_time {
                let at = match head_due {
                    Some(due) => due,
                    None if shared.real_time => self.current_time(),
                    None => Time::MIN,
                };
                if at > end {
                    debug!(scheduler = %shared.name, end_time = end, next_due = at, "end time reached");
                    self.shut_down(m);
                    return Err(ExitReason::EndTime);
                }
            }

            // Real-time pacing: sleep on the monitor until the head is due.
            // An earlier insert or terminate() notifies and cuts the wait short.
            if let Some(due) = head_due.filter(|_| shared.real_time) {
                let now = shared.unit.wall_clock();
                if now < due {
                    let wait = shared.unit.to_duration(due - now);
                    trace!(scheduler = %shared.name, due, wait_us = wait.as_micros() as u64, "pacing");
                    m = shared.wait_timeout(m, wait);
                    continue;
                }
            }

            // Predicates run without the monitor held.  The head may change
            // while it is released, so the loop starts over either way.
            if cleared != Some(head_seq) && has_conditions(&shared.on_delivery) {
                drop(m);
                let complete = any_complete(&shared.on_delivery);
                m = shared.lock();
                if complete {
                    debug!(scheduler = %shared.name, "delivery end condition met");
                    if !m.terminated {
                        self.shut_down(m);
                    }
                    return Err(ExitReason::EndCondition);
                }
                cleared = Some(head_seq);
                continue;
            }

            let Some(record) = m.queue.remove_min() else { continue };
            if let Some(due) = record.due() {
                shared.current_time.fetch_max(due, Ordering::AcqRel);
            }
            return Ok(record);
        }
    }

    /// Queue is empty: exit, poll end conditions, or block for an insert.
    fn wait_for_work<'a>(
        &'a self,
        m: MutexGuard<'a, Monitor>,
    ) -> Result<MutexGuard<'a, Monitor>, ExitReason> {
        let shared = &*self.shared;
        if m.exit_on_empty {
            debug!(scheduler = %shared.name, "queue drained");
            return Err(ExitReason::QueueDrained);
        }

        if !has_conditions(&shared.on_empty) {
            debug!(scheduler = %shared.name, "waiting for the queue to become non-empty");
            return Ok(shared.wait(m));
        }

        // Predicates run without the monitor held so they may query us.
        drop(m);
        let complete = any_complete(&shared.on_empty);
        let m = shared.lock();
        if complete {
            if !m.terminated {
                self.shut_down(m);
            }
            return Err(ExitReason::EndCondition);
        }
        if !m.queue.is_empty() || m.terminated {
            return Ok(m);
        }
        Ok(shared.wait_timeout(m, shared.poll_interval))
    }

    fn deliver(&self, record: Record) {
        let shared = &*self.shared;
        let time = record.due().unwrap_or_else(|| self.current_time());
        shared.delivered.fetch_add(1, Ordering::Relaxed);
        if let (Some(handler), Some(event)) = (record.handler(), record.event()) {
            trace!(scheduler = %shared.name, time, ?event, "delivering");
            handler.handle(event, self, time);
        }
        shared.pool.release(record);
    }

    /// Mark terminated, discard the queue, and wake every waiter.  Consumes
    /// the guard so the records are recycled outside the monitor.
    fn shut_down(&self, mut m: MutexGuard<'_, Monitor>) -> usize {
        m.terminated = true;
        let discarded = m.queue.clear();
        self.shared.ready.notify_all();
        drop(m);
        let n = discarded.len();
        self.shared.pool.release_all(discarded);
        n
    }
}

impl Shared {
    // Handlers never run under the monitor, so a poisoned lock can only come
    // from a panic between two consistent states; keep going with the data.
    fn lock(&self) -> MutexGuard<'_, Monitor> {
        self.monitor.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait<'a>(&self, m: MutexGuard<'a, Monitor>) -> MutexGuard<'a, Monitor> {
        self.ready.wait(m).unwrap_or_else(PoisonError::into_inner)
    }

    fn wait_timeout<'a>(&self, m: MutexGuard<'a, Monitor>, timeout: Duration) -> MutexGuard<'a, Monitor> {
        self.ready
            .wait_timeout(m, timeout)
            .unwrap_or_else(PoisonError::into_inner)
            .0
    }
}

fn write_conditions(
    lock: &RwLock<Vec<Arc<dyn EndCondition>>>,
) -> std::sync::RwLockWriteGuard<'_, Vec<Arc<dyn EndCondition>>> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn has_conditions(lock: &RwLock<Vec<Arc<dyn EndCondition>>>) -> bool {
    !lock.read().unwrap_or_else(PoisonError::into_inner).is_empty()
}

fn any_complete(lock: &RwLock<Vec<Arc<dyn EndCondition>>>) -> bool {
    let conditions = lock.read().unwrap_or_else(PoisonError::into_inner);
    conditions.iter().any(|c| c.is_complete())
}

/// Clears the running flag on every exit path out of `run`, unwinding included.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl fmt::Display for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.shared.name)
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("name", &self.shared.name)
            .field("unit", &self.shared.unit)
            .field("real_time", &self.shared.real_time)
            .field("delivered", &self.total_events_delivered())
            .finish_non_exhaustive()
    }
}
