//! `Synchronizer` — a reusable, round-based barrier across schedulers.
//!
//! # Protocol
//!
//! Every participating scheduler delivers the sync event to the same
//! `Synchronizer` once per round.  Arrivals are counted under the barrier
//! lock:
//!
//! ```text
//! arrive:
//!   arrived += 1
//!   arrived == round_size → arrived = 0, flip generation, wake everyone
//!   otherwise            → wait until the generation flips
//! then: re-schedule the sync event one interval after the current time
//! ```
//!
//! Because each participant re-arms only after release, no scheduler can get
//! more than one interval ahead of the slowest one.
//!
//! # Liveness mode
//!
//! Built with [`Synchronizer::with_roster`], a waiting participant re-checks
//! the roster every check interval.  A sibling that was observed alive and
//! has since finished will never arrive, so the waiter logs it and leaves the
//! barrier without re-arming.  A sibling never observed alive is presumed to
//! be still starting up.
//!
//! In either mode a waiter whose own scheduler has been terminated leaves the
//! barrier at its next check.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, LazyLock, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use des_core::{DesError, DesResult, Event, EventRef, Time};
use des_sched::{Handler, Scheduler};
use tracing::{debug, trace, warn};

use crate::{Liveness, Roster};

/// Default interval between roster checks while waiting.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_millis(500);

/// The event a synchronizer schedules for itself.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncEvent;

impl Event for SyncEvent {}

static SYNC_EVENT: LazyLock<EventRef> = LazyLock::new(|| Arc::new(SyncEvent));

/// The shared sync event.
pub fn sync_event() -> EventRef {
    Arc::clone(&SYNC_EVENT)
}

// ── Round state ───────────────────────────────────────────────────────────────

struct Round {
    arrived:        usize,
    generation:     bool,
    seen_alive:     Vec<bool>,
    check_interval: Duration,
}

/// Outcome of one participant's wait.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Release {
    /// Round complete; re-arm.
    Released,
    /// A previously-alive sibling finished.
    DeadSibling(usize),
    /// The waiting participant's own scheduler was terminated.
    Terminated,
}

// ── Synchronizer ──────────────────────────────────────────────────────────────

/// Barrier handler shared by `round_size` schedulers.
///
/// # Example
///
/// ```rust,ignore
/// let sync = Synchronizer::new(2, 100);
/// sync.arm(&es1)?;
/// sync.arm(&es2)?;
/// let t1 = { let es1 = es1.clone(); std::thread::spawn(move || es1.run()) };
/// let t2 = { let es2 = es2.clone(); std::thread::spawn(move || es2.run()) };
/// ```
///
/// Arm each scheduler exactly once: a scheduler armed twice is counted
/// twice per round and some other participant is never waited for.  A
/// synchronized scheduler always has the next sync event queued, so it stops
/// through an end time, an end condition, or `terminate`, never by draining.
pub struct Synchronizer {
    me:         Weak<Synchronizer>,
    round_size: usize,
    /// Delay between rounds, in each scheduler's finest unit.
    interval:   Time,
    roster:     Option<Roster>,
    state:      Mutex<Round>,
    released:   Condvar,
    rounds:     AtomicU64,
}

impl Synchronizer {
    /// Barrier for `round_size` schedulers, re-armed every `interval` ticks.
    pub fn new(round_size: usize, interval: Time) -> Arc<Self> {
        Self::build(round_size, interval, None)
    }

    /// Barrier for every participant of `roster`, with liveness checks.
    pub fn with_roster(roster: Roster, interval: Time) -> Arc<Self> {
        Self::build(roster.len(), interval, Some(roster))
    }

    fn build(round_size: usize, interval: Time, roster: Option<Roster>) -> Arc<Self> {
        let seen_alive = vec![false; roster.as_ref().map_or(0, Roster::len)];
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            round_size,
            interval,
            roster,
            state: Mutex::new(Round {
                arrived: 0,
                generation: false,
                seen_alive,
                check_interval: DEFAULT_CHECK_INTERVAL,
            }),
            released: Condvar::new(),
            rounds: AtomicU64::new(0),
        })
    }

    /// How often a waiting participant re-checks the roster and its own
    /// scheduler.
    pub fn set_check_interval(&self, interval: Duration) {
        self.lock().check_interval = interval;
    }

    /// Schedule the first sync event on `scheduler`, one interval from now.
    pub fn arm(self: &Arc<Self>, scheduler: &Scheduler) -> DesResult<()> {
        let me: Arc<dyn Handler> = Arc::clone(self) as Arc<dyn Handler>;
        scheduler.schedule_after_ticks(me, sync_event(), self.interval)
    }

    pub fn round_size(&self) -> usize {
        self.round_size
    }

    pub fn interval(&self) -> Time {
        self.interval
    }

    /// Participants currently blocked in the barrier.
    pub fn waiting(&self) -> usize {
        self.lock().arrived
    }

    /// Rounds released so far.
    pub fn rounds_completed(&self) -> u64 {
        self.rounds.load(Ordering::Acquire)
    }

    /// Current generation; flips on every release.
    pub fn generation_toggle(&self) -> bool {
        self.lock().generation
    }

    fn lock(&self) -> MutexGuard<'_, Round> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count this arrival and block until the round is released.
    fn arrive(&self, scheduler: &Scheduler) -> Release {
        let mut round = self.lock();
        round.arrived += 1;
        let generation = round.generation;
        trace!(scheduler = %scheduler, arrived = round.arrived, round_size = self.round_size, "arrived at barrier");

        if round.arrived >= self.round_size {
            round.arrived = 0;
            round.generation = !generation;
            let completed = self.rounds.fetch_add(1, Ordering::AcqRel) + 1;
            self.released.notify_all();
            debug!(scheduler = %scheduler, round = completed, "barrier released");
            return Release::Released;
        }

        while round.generation == generation {
            if let Some(index) = self.dead_sibling(&mut round) {
                round.arrived -= 1;
                return Release::DeadSibling(index);
            }
            if scheduler.is_terminated() {
                round.arrived -= 1;
                return Release::Terminated;
            }
            let timeout = round.check_interval;
            round = self
                .released
                .wait_timeout(round, timeout)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        Release::Released
    }

    /// First roster slot that was seen alive and is now finished.
    fn dead_sibling(&self, round: &mut Round) -> Option<usize> {
        let roster = self.roster.as_ref()?;
        for (index, state) in roster.states().enumerate() {
            match state {
                Liveness::Alive => round.seen_alive[index] = true,
                Liveness::Finished if round.seen_alive[index] => return Some(index),
                Liveness::Finished | Liveness::NotStarted => {}
            }
        }
        None
    }
}

impl Handler for Synchronizer {
    fn handle(&self, event: &EventRef, scheduler: &Scheduler, time: Time) {
        match self.arrive(scheduler) {
            Release::Released => {
                // Being delivered means a queued record held a strong reference.
                let Some(me) = self.me.upgrade() else { return };
                // Relative to now: in real time a long wait at the barrier
                // may already be past `time + interval`.
                match scheduler.schedule_after_ticks(me, Arc::clone(event), self.interval) {
                    Ok(()) => {}
                    Err(DesError::Terminated(_)) => {
                        debug!(scheduler = %scheduler, "scheduler terminated; sync event not re-armed");
                    }
                    Err(e) => {
                        warn!(scheduler = %scheduler, error = %e, "sync event not re-armed; leaving the barrier");
                    }
                }
            }
            Release::DeadSibling(index) => {
                warn!(
                    scheduler = %scheduler,
                    participant = index,
                    time,
                    "barrier participant is no longer alive; abandoning the barrier"
                );
            }
            Release::Terminated => {
                debug!(scheduler = %scheduler, "scheduler terminated while waiting at the barrier");
            }
        }
    }
}

impl fmt::Display for Synchronizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Synchronizer ({} of {} waiting)", self.waiting(), self.round_size)
    }
}

impl fmt::Debug for Synchronizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Synchronizer")
            .field("round_size", &self.round_size)
            .field("interval", &self.interval)
            .field("waiting", &self.waiting())
            .field("rounds", &self.rounds_completed())
            .field("roster", &self.roster)
            .finish()
    }
}
