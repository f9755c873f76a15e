//! Liveness roster for barrier participants.
//!
//! Each participating worker owns one slot.  A slot moves
//! `NotStarted → Alive → Finished` and never back: the worker calls
//! [`Participant::enter`] when it starts and the returned [`AliveGuard`]
//! marks the slot finished when dropped, which also happens while unwinding
//! from a panic.
//!
//! ```rust,ignore
//! let roster = Roster::new(2);
//! let worker = {
//!     let me = roster.participant(0);
//!     std::thread::spawn(move || {
//!         let _alive = me.enter();
//!         es.run()
//!     })
//! };
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

const NOT_STARTED: u8 = 0;
const ALIVE: u8 = 1;
const FINISHED: u8 = 2;

/// Observable state of one roster slot.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Liveness {
    NotStarted,
    Alive,
    Finished,
}

impl Liveness {
    fn from_raw(raw: u8) -> Self {
        match raw {
            NOT_STARTED => Liveness::NotStarted,
            ALIVE => Liveness::Alive,
            _ => Liveness::Finished,
        }
    }
}

// ── Roster ────────────────────────────────────────────────────────────────────

/// A fixed set of participant slots.  Cloning shares the slots.
#[derive(Clone)]
pub struct Roster {
    slots: Arc<[AtomicU8]>,
}

impl Roster {
    /// `n` slots, all `NotStarted`.
    pub fn new(n: usize) -> Self {
        Self { slots: (0..n).map(|_| AtomicU8::new(NOT_STARTED)).collect() }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Handle for slot `index`, to be moved into the worker thread.
    ///
    /// # Panics
    ///
    /// If `index >= self.len()`.
    pub fn participant(&self, index: usize) -> Participant {
        assert!(index < self.len(), "participant {index} out of range for a roster of {}", self.len());
        Participant { roster: self.clone(), index }
    }

    /// Current state of slot `index`.
    ///
    /// # Panics
    ///
    /// If `index >= self.len()`.
    pub fn state(&self, index: usize) -> Liveness {
        Liveness::from_raw(self.slots[index].load(Ordering::Acquire))
    }

    /// All slot states, in slot order.
    pub fn states(&self) -> impl Iterator<Item = Liveness> + '_ {
        self.slots.iter().map(|s| Liveness::from_raw(s.load(Ordering::Acquire)))
    }
}

impl fmt::Debug for Roster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.states()).finish()
    }
}

// ── Participant ───────────────────────────────────────────────────────────────

/// One slot of a [`Roster`].
#[derive(Clone, Debug)]
pub struct Participant {
    roster: Roster,
    index:  usize,
}

impl Participant {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn state(&self) -> Liveness {
        self.roster.state(self.index)
    }

    /// Mark the slot alive for as long as the returned guard lives.
    pub fn enter(self) -> AliveGuard {
        self.roster.slots[self.index].store(ALIVE, Ordering::Release);
        AliveGuard { participant: self }
    }
}

/// Keeps a roster slot `Alive`; dropping it marks the slot `Finished`.
#[must_use = "the slot is marked finished as soon as the guard is dropped"]
#[derive(Debug)]
pub struct AliveGuard {
    participant: Participant,
}

impl AliveGuard {
    pub fn index(&self) -> usize {
        self.participant.index
    }
}

impl Drop for AliveGuard {
    fn drop(&mut self) {
        let Participant { roster, index } = &self.participant;
        roster.slots[*index].store(FINISHED, Ordering::Release);
    }
}
