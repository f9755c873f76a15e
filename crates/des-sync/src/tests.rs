//! Unit tests for des-sync.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use des_core::{generic_event, Time};
use des_sched::{handler_fn, ExitReason, Scheduler, SchedulerBuilder};

use crate::{Liveness, Roster, Synchronizer};

// ── Helpers ───────────────────────────────────────────────────────────────────

fn bounded(name: &str, end_time: Time) -> Scheduler {
    SchedulerBuilder::new().name(name).end_time(end_time).build().unwrap()
}

fn wait_for(mut done: impl FnMut() -> bool) {
    while !done() {
        thread::sleep(Duration::from_millis(1));
    }
}

// ── Roster ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod roster_tests {
    use super::*;

    #[test]
    fn slots_move_from_not_started_to_finished() {
        let roster = Roster::new(2);
        assert_eq!(roster.len(), 2);
        assert!(roster.states().all(|s| s == Liveness::NotStarted));

        let guard = roster.participant(1).enter();
        assert_eq!(guard.index(), 1);
        assert_eq!(roster.state(0), Liveness::NotStarted);
        assert_eq!(roster.state(1), Liveness::Alive);

        drop(guard);
        assert_eq!(roster.state(1), Liveness::Finished);
    }

    #[test]
    fn panicking_worker_is_marked_finished() {
        let roster = Roster::new(1);
        let me = roster.participant(0);
        let result = thread::spawn(move || {
            let _alive = me.enter();
            panic!("worker crashed");
        })
        .join();
        assert!(result.is_err());
        assert_eq!(roster.state(0), Liveness::Finished);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn participant_index_is_bounds_checked() {
        let _ = Roster::new(2).participant(2);
    }
}

// ── Barrier ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod barrier_tests {
    use super::*;

    #[test]
    fn single_participant_releases_every_round() {
        let sync = Synchronizer::new(1, 5);
        let es = bounded("solo", 10);
        sync.arm(&es).unwrap();
        assert_eq!(es.run().unwrap(), ExitReason::EndTime);
        assert_eq!(sync.rounds_completed(), 2);
        assert!(!sync.generation_toggle(), "two flips bring the toggle back");
        assert_eq!(es.total_events_delivered(), 2);
    }

    #[test]
    fn three_schedulers_advance_in_lock_step() {
        const K: usize = 3;
        const INTERVAL: Time = 50;
        const END: Time = 500;

        let sync = Synchronizer::new(K, INTERVAL);
        let mismatches = Arc::new(Mutex::new(Vec::new()));
        let schedulers: Vec<Scheduler> = (0..K).map(|i| bounded(&format!("es-{i}"), END)).collect();

        for es in &schedulers {
            sync.arm(es).unwrap();
            // Halfway through round k every scheduler must see exactly k
            // completed rounds: it has passed barrier k and cannot pass k+1.
            for k in 0..10 {
                let sync = Arc::clone(&sync);
                let mismatches = Arc::clone(&mismatches);
                let checkpoint = handler_fn(move |_, es: &Scheduler, time| {
                    let seen = sync.rounds_completed();
                    if seen != k {
                        mismatches.lock().unwrap().push((es.name().to_owned(), time, seen));
                    }
                });
                es.schedule_at_ticks(checkpoint, generic_event(), INTERVAL * k as Time + INTERVAL / 2).unwrap();
            }
        }

        let workers: Vec<_> = schedulers
            .iter()
            .cloned()
            .map(|es| thread::spawn(move || es.run()))
            .collect();
        for w in workers {
            assert_eq!(w.join().unwrap().unwrap(), ExitReason::EndTime);
        }

        assert!(mismatches.lock().unwrap().is_empty(), "{:?}", mismatches.lock().unwrap());
        assert_eq!(sync.rounds_completed(), 10);
        assert_eq!(sync.waiting(), 0);
        for es in &schedulers {
            // 10 sync deliveries plus 10 checkpoints.
            assert_eq!(es.total_events_delivered(), 20, "{es}");
            assert_eq!(es.current_time(), END);
        }
    }

    #[test]
    fn display_reports_waiting_participants() {
        let sync = Synchronizer::new(3, 10);
        assert_eq!(sync.to_string(), "Synchronizer (0 of 3 waiting)");
        assert_eq!(sync.round_size(), 3);
        assert_eq!(sync.interval(), 10);
    }

    #[test]
    fn terminated_scheduler_leaves_the_barrier() {
        let sync = Synchronizer::new(2, 10);
        sync.set_check_interval(Duration::from_millis(10));
        let es = Scheduler::new("abandoned");
        sync.arm(&es).unwrap();
        let worker = {
            let es = es.clone();
            thread::spawn(move || es.run())
        };

        wait_for(|| sync.waiting() == 1);
        es.terminate();
        assert_eq!(worker.join().unwrap().unwrap(), ExitReason::Terminated);
        assert_eq!(sync.waiting(), 0);
        assert_eq!(sync.rounds_completed(), 0);
    }
}

// ── Liveness mode ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod liveness_tests {
    use super::*;

    #[test]
    fn dead_sibling_aborts_the_wait() {
        let roster = Roster::new(2);
        let sync = Synchronizer::with_roster(roster.clone(), 50);
        sync.set_check_interval(Duration::from_millis(10));
        assert_eq!(sync.round_size(), 2);

        let es = SchedulerBuilder::new().name("survivor").exit_on_empty_queue(true).build().unwrap();
        sync.arm(&es).unwrap();

        // The sibling is alive before the survivor first checks the roster.
        let sibling = roster.participant(1).enter();
        let worker = {
            let es = es.clone();
            let me = roster.participant(0);
            thread::spawn(move || {
                let _alive = me.enter();
                es.run()
            })
        };

        wait_for(|| sync.waiting() == 1);
        thread::sleep(Duration::from_millis(30));
        drop(sibling);

        // No re-arm after abandoning the barrier, so the queue drains.
        assert_eq!(worker.join().unwrap().unwrap(), ExitReason::QueueDrained);
        assert_eq!(es.total_events_delivered(), 1);
        assert_eq!(sync.waiting(), 0);
        assert_eq!(sync.rounds_completed(), 0);
        assert_eq!(roster.state(0), Liveness::Finished);
    }

    #[test]
    fn sibling_never_seen_alive_is_still_waited_for() {
        let roster = Roster::new(2);
        let sync = Synchronizer::with_roster(roster.clone(), 50);
        sync.set_check_interval(Duration::from_millis(5));

        let es = SchedulerBuilder::new().name("patient").exit_on_empty_queue(true).build().unwrap();
        sync.arm(&es).unwrap();
        let worker = {
            let es = es.clone();
            let me = roster.participant(0);
            thread::spawn(move || {
                let _alive = me.enter();
                es.run()
            })
        };

        wait_for(|| sync.waiting() == 1);
        thread::sleep(Duration::from_millis(40));
        assert_eq!(sync.waiting(), 1, "a sibling that never started is not dead");

        es.terminate();
        assert_eq!(worker.join().unwrap().unwrap(), ExitReason::Terminated);
    }
}

// ── Real time ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod real_time_tests {
    use super::*;

    const K:        usize    = 3;
    const INTERVAL: Time     = 20; // ms
    const STALL:    Duration = Duration::from_millis(300);
    const ROUNDS:   u64      = 25;

    fn real_time(name: String) -> Scheduler {
        SchedulerBuilder::new().name(name).real_time(true).build().unwrap()
    }

    #[test]
    fn rounds_keep_pace_and_survive_a_stalled_participant() {
        let sync = Synchronizer::new(K, INTERVAL);
        sync.set_check_interval(Duration::from_millis(10));
        let schedulers: Vec<Scheduler> = (0..K).map(|i| real_time(format!("rt-{i}"))).collect();
        for es in &schedulers {
            sync.arm(es).unwrap();
        }
        // One dispatch thread blocks for many intervals; the others wait at
        // the barrier well past their next nominal sync time.
        schedulers[K - 1]
            .schedule_after_ticks(handler_fn(|_, _, _| thread::sleep(STALL)), generic_event(), 5 * INTERVAL)
            .unwrap();

        let workers: Vec<_> = schedulers
            .iter()
            .cloned()
            .map(|es| thread::spawn(move || es.run()))
            .collect();

        // Wall-clock instant at which each new round count was first seen.
        let deadline = Instant::now() + Duration::from_secs(10);
        let mut seen = vec![(sync.rounds_completed(), Instant::now())];
        while sync.rounds_completed() < ROUNDS && Instant::now() < deadline {
            let rounds = sync.rounds_completed();
            if rounds != seen[seen.len() - 1].0 {
                seen.push((rounds, Instant::now()));
            }
            thread::sleep(Duration::from_millis(1));
        }
        let reached = sync.rounds_completed();

        for es in &schedulers {
            es.terminate();
        }
        for w in workers {
            assert_eq!(w.join().unwrap().unwrap(), ExitReason::Terminated);
        }
        assert!(reached >= ROUNDS, "barrier stopped after {reached} rounds");

        // Lock-step: each participant passed every completed round and is at
        // most one arrival ahead.
        let rounds = sync.rounds_completed();
        for (i, es) in schedulers.iter().enumerate() {
            let stalls = u64::from(i == K - 1);
            let syncs = es.total_events_delivered() - stalls;
            assert!(syncs == rounds || syncs == rounds + 1, "{es}: {syncs} sync deliveries, {rounds} rounds");
        }

        // Every round spans one interval plus scheduling jitter, except the
        // one held open by the stall.
        let spans: Vec<Duration> = seen.windows(2).map(|w| w[1].1 - w[0].1).collect();
        let long = spans.iter().filter(|s| **s >= Duration::from_millis(250)).count();
        assert_eq!(long, 1, "{spans:?}");
        assert!(
            spans.iter().all(|s| *s < Duration::from_millis(200) || *s >= Duration::from_millis(250)),
            "{spans:?}"
        );
    }
}
