//! Unit tests for des-queue.

use std::sync::Arc;

use des_core::{generic_event, Event, EventRef, Time};

use crate::{EventQueue, ReusePool, Reusable, ScheduledItem};

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Handler stand-in: a shared label, so tests can check identity and drops.
type Label = Arc<&'static str>;

type Record = Box<ScheduledItem<Label>>;

#[derive(Debug)]
struct Numbered(u32);
impl Event for Numbered {}

fn pool() -> ReusePool<Record> {
    ReusePool::new(Record::default)
}

fn record(pool: &ReusePool<Record>, label: &'static str, due: Option<Time>) -> Record {
    pool.acquire((Arc::new(label), generic_event(), due))
}

fn drain_dues(queue: &mut EventQueue<Label>) -> Vec<Option<Time>> {
    std::iter::from_fn(|| queue.remove_min()).map(|r| r.due()).collect()
}

// ── ReusePool ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod pool_tests {
    use super::*;

    #[test]
    fn acquire_builds_then_recycles() {
        let pool = pool();
        let a = record(&pool, "a", Some(1));
        assert_eq!(pool.created(), 1);
        pool.release(a);
        assert_eq!(pool.idle(), 1);

        let b = record(&pool, "b", Some(2));
        assert_eq!(pool.created(), 1, "second acquire must reuse the idle record");
        assert_eq!(pool.idle(), 0);
        assert_eq!(b.handler().map(|l| **l), Some("b"));
    }

    #[test]
    fn grows_to_high_water_mark_and_never_shrinks() {
        let pool = pool();
        let live: Vec<Record> = (0..5).map(|i| record(&pool, "x", Some(i))).collect();
        assert_eq!(pool.created(), 5);
        pool.release_all(live);
        assert_eq!(pool.idle(), 5);

        let again: Vec<Record> = (0..3).map(|i| record(&pool, "y", Some(i))).collect();
        assert_eq!(pool.created(), 5);
        assert_eq!(pool.idle(), 2);
        pool.release_all(again);
        assert_eq!(pool.idle(), 5);
    }

    #[test]
    fn round_trip_leaves_no_residual_state() {
        let pool = pool();
        let specific: EventRef = Arc::new(Numbered(7));
        let first: Vec<Record> = (0..4)
            .map(|i| pool.acquire((Arc::new("old"), Arc::clone(&specific), Some(100 + i))))
            .collect();
        pool.release_all(first);

        // The old event is only referenced by `specific` now: released
        // records dropped their clones.
        assert_eq!(Arc::strong_count(&specific), 1);

        for _ in 0..4 {
            let r = pool.acquire((Arc::new("new"), generic_event(), None));
            assert!(r.is_initialized());
            assert_eq!(r.handler().map(|l| **l), Some("new"));
            assert_eq!(r.due(), None);
            assert_eq!(r.seq(), 0);
            assert!(r.event().is_some_and(|e| e.downcast_ref::<Numbered>().is_none()));
        }
    }

    #[test]
    fn reset_clears_every_field() {
        let mut item: ScheduledItem<Label> = ScheduledItem::default();
        item.initialize((Arc::new("h"), generic_event(), Some(3)));
        assert!(item.is_initialized());
        item.reset();
        assert!(!item.is_initialized());
        assert!(item.handler().is_none());
        assert!(item.event().is_none());
        assert_eq!(item.due(), None);
    }

    #[test]
    fn concurrent_acquire_release() {
        let pool = Arc::new(pool());
        let threads: Vec<_> = (0..4)
            .map(|_| {
                let pool = Arc::clone(&pool);
                std::thread::spawn(move || {
                    for i in 0..1_000 {
                        let r = record(&pool, "t", Some(i));
                        pool.release(r);
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert!(pool.created() <= 4);
        assert_eq!(pool.idle(), pool.created());
    }

    #[test]
    fn with_capacity_prefills() {
        let pool: ReusePool<Record> = ReusePool::with_capacity(Record::default, 8);
        assert_eq!(pool.idle(), 8);
        assert_eq!(pool.created(), 8);
        let _r = record(&pool, "z", None);
        assert_eq!(pool.created(), 8);
    }
}

// ── EventQueue ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod queue_tests {
    use super::*;

    #[test]
    fn empty_queue() {
        let mut q: EventQueue<Label> = EventQueue::new();
        assert!(q.is_empty());
        assert_eq!(q.len(), 0);
        assert!(q.peek_min().is_none());
        assert!(q.remove_min().is_none());
    }

    #[test]
    fn orders_by_due_time() {
        let pool = pool();
        let mut q = EventQueue::new();
        for due in [30, 10, 20, 10, 40] {
            q.insert(record(&pool, "x", Some(due)));
        }
        assert_eq!(q.len(), 5);
        assert_eq!(drain_dues(&mut q), vec![Some(10), Some(10), Some(20), Some(30), Some(40)]);
    }

    #[test]
    fn immediate_items_come_first() {
        let pool = pool();
        let mut q = EventQueue::new();
        q.insert(record(&pool, "x", Some(Time::MIN)));
        q.insert(record(&pool, "x", Some(5)));
        q.insert(record(&pool, "x", None));
        assert_eq!(drain_dues(&mut q), vec![None, Some(Time::MIN), Some(5)]);
    }

    #[test]
    fn equal_keys_are_fifo() {
        let pool = pool();
        let mut q = EventQueue::new();
        for label in ["first", "second", "third"] {
            q.insert(record(&pool, label, Some(7)));
        }
        let order: Vec<&str> = std::iter::from_fn(|| q.remove_min())
            .map(|r| **r.handler().unwrap())
            .collect();
        assert_eq!(order, vec!["first", "second", "third"]);
    }

    #[test]
    fn insert_reports_new_minimum() {
        let pool = pool();
        let mut q = EventQueue::new();
        assert!(q.insert(record(&pool, "x", Some(50))));
        assert!(!q.insert(record(&pool, "x", Some(60))));
        assert!(!q.insert(record(&pool, "x", Some(50))), "tie goes behind the existing head");
        assert!(q.insert(record(&pool, "x", Some(10))));
        assert!(q.insert(record(&pool, "x", None)));
        assert!(!q.insert(record(&pool, "x", None)));
    }

    #[test]
    fn peek_does_not_remove() {
        let pool = pool();
        let mut q = EventQueue::new();
        q.insert(record(&pool, "x", Some(3)));
        assert_eq!(q.peek_min().and_then(|r| r.due()), Some(3));
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn clear_returns_every_record() {
        let pool = pool();
        let mut q = EventQueue::new();
        for due in 0..6 {
            q.insert(record(&pool, "x", Some(due)));
        }
        let drained = q.clear();
        assert_eq!(drained.len(), 6);
        assert!(q.is_empty());
        pool.release_all(drained);
        assert_eq!(pool.idle(), 6);
    }

    #[test]
    fn random_schedule_pops_sorted() {
        use rand::rngs::SmallRng;
        use rand::{Rng, SeedableRng};

        let pool = pool();
        let mut rng = SmallRng::seed_from_u64(42);
        let mut q = EventQueue::new();
        for _ in 0..500 {
            let due = if rng.gen_bool(0.1) { None } else { Some(rng.gen_range(0..100)) };
            q.insert(record(&pool, "x", due));
        }
        let popped = drain_dues(&mut q);
        assert!(popped.windows(2).all(|w| w[0] <= w[1]), "Option<i64> orders None first");
    }
}

// ── Properties ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod properties {
    use proptest::prelude::*;

    use super::*;

    proptest! {
        #[test]
        fn pops_are_sorted_and_stable(dues in proptest::collection::vec(proptest::option::of(-50i64..50), 0..200)) {
            let pool = pool();
            let mut q: EventQueue<Label> = EventQueue::new();
            for due in &dues {
                q.insert(record(&pool, "x", *due));
            }
            prop_assert_eq!(q.len(), dues.len());

            let mut popped: Vec<(Option<Time>, u64)> = Vec::new();
            while let Some(r) = q.remove_min() {
                popped.push((r.due(), r.seq()));
                pool.release(r);
            }
            // Sorted by due (None first), FIFO among equal dues.
            prop_assert!(popped.windows(2).all(|w| w[0] < w[1]));
            prop_assert_eq!(pool.idle(), dues.len());
        }
    }
}
