//! `EventQueue<H>` — time-ordered queue of boxed scheduled items.
//!
//! # Ordering
//!
//! Items with no due time sort ahead of every timestamped item; timestamped
//! items sort by due time ascending.  Equal keys come out in insertion order
//! because each insert stamps a monotonically increasing sequence number.
//! Handlers should still not depend on the order of equal-time deliveries.
//!
//! # Performance note
//!
//! `BinaryHeap` gives O(log n) insert and pop and O(1) peek.  Items are
//! boxed so the heap shuffles pointers, and the boxes themselves are what the
//! scheduler's [`ReusePool`][crate::ReusePool] recycles.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::ScheduledItem;

/// Heap entry.  `BinaryHeap` is a max-heap, so the ordering is reversed.
struct Entry<H>(Box<ScheduledItem<H>>);

impl<H> PartialEq for Entry<H> {
    fn eq(&self, other: &Self) -> bool {
        self.0.sort_key() == other.0.sort_key()
    }
}

impl<H> Eq for Entry<H> {}

impl<H> PartialOrd for Entry<H> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<H> Ord for Entry<H> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.sort_key().cmp(&other.0.sort_key()).reverse()
    }
}

/// A min-priority queue of scheduled items.
///
/// Not synchronized: the owning scheduler keeps it behind its monitor.
pub struct EventQueue<H> {
    heap:     BinaryHeap<Entry<H>>,
    next_seq: u64,
}

impl<H> Default for EventQueue<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> EventQueue<H> {
    pub fn new() -> Self {
        Self { heap: BinaryHeap::new(), next_seq: 0 }
    }

    /// Add `item`.  Returns `true` if it is now the queue minimum, i.e. the
    /// dispatch thread may need waking.
    pub fn insert(&mut self, mut item: Box<ScheduledItem<H>>) -> bool {
        item.set_seq(self.next_seq);
        self.next_seq += 1;
        let key = item.sort_key();
        self.heap.push(Entry(item));
        self.heap.peek().is_some_and(|head| head.0.sort_key() == key)
    }

    /// The next item to deliver, without removing it.
    pub fn peek_min(&self) -> Option<&ScheduledItem<H>> {
        self.heap.peek().map(|e| &*e.0)
    }

    /// Remove and return the next item to deliver.
    pub fn remove_min(&mut self) -> Option<Box<ScheduledItem<H>>> {
        self.heap.pop().map(|e| e.0)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Remove every item, returning them so the caller can recycle them.
    pub fn clear(&mut self) -> Vec<Box<ScheduledItem<H>>> {
        self.heap.drain().map(|e| e.0).collect()
    }
}
