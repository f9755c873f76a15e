//! `ScheduledItem<H>` — one queued delivery.

use std::fmt;

use des_core::{EventRef, Time};

use crate::Reusable;

/// A (handler, event, due-time) record.
///
/// Generic over the handler reference type `H` so this crate need not know
/// what a handler is; `des-sched` instantiates it with `Arc<dyn Handler>`.
///
/// `due == None` means "deliver at the front of the queue".  `seq` is
/// stamped by [`EventQueue::insert`][crate::EventQueue::insert] and breaks
/// ties between equal due times in insertion order.
pub struct ScheduledItem<H> {
    handler: Option<H>,
    event:   Option<EventRef>,
    due:     Option<Time>,
    seq:     u64,
}

impl<H> ScheduledItem<H> {
    /// The target handler.  `None` only while the record is idle in a pool.
    #[inline]
    pub fn handler(&self) -> Option<&H> {
        self.handler.as_ref()
    }

    /// The event to deliver.  `None` only while idle.
    #[inline]
    pub fn event(&self) -> Option<&EventRef> {
        self.event.as_ref()
    }

    #[inline]
    pub fn due(&self) -> Option<Time> {
        self.due
    }

    #[inline]
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// `true` once `initialize` has run and until `reset`.
    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.handler.is_some() && self.event.is_some()
    }

    #[inline]
    pub(crate) fn set_seq(&mut self, seq: u64) {
        self.seq = seq;
    }

    /// Ordering key: immediate items first, then by due time, then FIFO.
    #[inline]
    pub(crate) fn sort_key(&self) -> (bool, Time, u64) {
        match self.due {
            None    => (false, Time::MIN, self.seq),
            Some(t) => (true, t, self.seq),
        }
    }
}

impl<H> Default for ScheduledItem<H> {
    fn default() -> Self {
        Self { handler: None, event: None, due: None, seq: 0 }
    }
}

impl<H> Reusable for ScheduledItem<H> {
    type Args = (H, EventRef, Option<Time>);

    fn initialize(&mut self, (handler, event, due): Self::Args) {
        self.handler = Some(handler);
        self.event = Some(event);
        self.due = due;
        self.seq = 0;
    }

    fn reset(&mut self) {
        self.handler = None;
        self.event = None;
        self.due = None;
        self.seq = 0;
    }
}

impl<H> fmt::Debug for ScheduledItem<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledItem")
            .field("event", &self.event)
            .field("due", &self.due)
            .field("seq", &self.seq)
            .finish_non_exhaustive()
    }
}
