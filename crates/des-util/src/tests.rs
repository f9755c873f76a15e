//! Unit tests for des-util.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use des_core::{type_tag_of, Event, EventRef, Time};
use des_sched::{handler_fn, Handler, HandlerRef, Scheduler, SchedulerBuilder};

use crate::{PubSub, StallReport, Watchdog};

// ── Helpers ───────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct Quote(u32);
impl Event for Quote {}

#[derive(Debug)]
struct Trade(u32);
impl Event for Trade {}

/// Same shape as `Quote`, different type.
#[derive(Debug)]
struct Wrapped(Quote);
impl Event for Wrapped {}

/// Collects the `Debug` text and delivery time of everything it receives.
#[derive(Default)]
struct Inbox {
    got: Mutex<Vec<(String, Time)>>,
}

impl Handler for Inbox {
    fn handle(&self, event: &EventRef, _es: &Scheduler, time: Time) {
        self.got.lock().unwrap().push((format!("{event:?}"), time));
    }
}

impl Inbox {
    fn received(&self) -> Vec<String> {
        self.got.lock().unwrap().iter().map(|(e, _)| e.clone()).collect()
    }
}

fn draining() -> Scheduler {
    SchedulerBuilder::new().exit_on_empty_queue(true).build().unwrap()
}

fn wait_until(deadline: Duration, mut done: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while !done() {
        if start.elapsed() > deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(5));
    }
    true
}

// ── PubSub ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod pubsub_tests {
    use super::*;

    #[test]
    fn routes_by_exact_type() {
        let router = PubSub::new();
        let quotes = Arc::new(Inbox::default());
        let trades = Arc::new(Inbox::default());
        assert!(router.subscribe::<Quote>(quotes.clone()));
        assert!(router.subscribe::<Trade>(trades.clone()));

        let es = draining();
        es.schedule_at_ticks(router.clone(), Arc::new(Quote(1)), 10).unwrap();
        es.schedule_at_ticks(router.clone(), Arc::new(Trade(2)), 20).unwrap();
        es.schedule_at_ticks(router.clone(), Arc::new(Wrapped(Quote(3))), 30).unwrap();
        es.run().unwrap();

        assert_eq!(quotes.received(), vec!["Quote(1)"]);
        assert_eq!(trades.received(), vec!["Trade(2)"]);
        assert_eq!(*quotes.got.lock().unwrap(), vec![("Quote(1)".to_owned(), 10)]);
    }

    #[test]
    fn every_subscriber_gets_the_event() {
        let router = PubSub::new();
        let a = Arc::new(Inbox::default());
        let b = Arc::new(Inbox::default());
        router.subscribe::<Quote>(a.clone());
        router.subscribe::<Quote>(b.clone());
        assert_eq!(router.subscriber_count::<Quote>(), 2);

        let es = draining();
        es.schedule_now(router.clone(), Arc::new(Quote(9))).unwrap();
        es.run().unwrap();
        assert_eq!(a.received(), vec!["Quote(9)"]);
        assert_eq!(b.received(), vec!["Quote(9)"]);
    }

    #[test]
    fn duplicate_subscription_is_ignored() {
        let router = PubSub::new();
        let inbox: HandlerRef = Arc::new(Inbox::default());
        assert!(router.subscribe::<Quote>(inbox.clone()));
        assert!(!router.subscribe::<Quote>(inbox.clone()));
        assert_eq!(router.subscriber_count::<Quote>(), 1);
    }

    #[test]
    fn unsubscribe_matches_by_identity() {
        let router = PubSub::new();
        let inbox: HandlerRef = Arc::new(Inbox::default());
        let other: HandlerRef = Arc::new(Inbox::default());
        router.subscribe::<Quote>(inbox.clone());

        assert!(!router.unsubscribe::<Quote>(&other));
        assert!(!router.unsubscribe::<Trade>(&inbox));
        assert!(router.unsubscribe::<Quote>(&inbox));
        assert!(!router.unsubscribe::<Quote>(&inbox));
        assert_eq!(router.subscriber_count::<Quote>(), 0);
    }

    #[test]
    fn runtime_tags_address_the_same_subscriptions() {
        let router = PubSub::new();
        let inbox: HandlerRef = Arc::new(Inbox::default());
        assert!(router.subscribe_tag(type_tag_of::<Trade>(), inbox.clone()));
        assert_eq!(router.subscriber_count::<Trade>(), 1);

        let sample: EventRef = Arc::new(Trade(0));
        assert_eq!(router.subscriber_count_tag(sample.type_tag()), 1);
        assert!(router.unsubscribe_tag(sample.type_tag(), &inbox));
        assert_eq!(router.subscriber_count::<Trade>(), 0);
        assert!(!router.unsubscribe::<Trade>(&inbox));
    }

    #[test]
    fn unsubscribed_types_are_dropped() {
        let router = PubSub::new();
        let es = draining();
        es.schedule_now(router.clone(), Arc::new(Quote(1))).unwrap();
        es.run().unwrap();
        assert_eq!(es.total_events_delivered(), 1);
    }

    #[test]
    fn subscriber_may_change_subscriptions_during_fan_out() {
        let router = PubSub::new();
        let late = Arc::new(Inbox::default());
        let registrar = {
            let router = Arc::clone(&router);
            let late: HandlerRef = late.clone();
            handler_fn(move |_, _, _| {
                router.subscribe::<Quote>(late.clone());
            })
        };
        router.subscribe::<Quote>(registrar);

        let es = draining();
        es.schedule_at_ticks(router.clone(), Arc::new(Quote(1)), 1).unwrap();
        es.schedule_at_ticks(router.clone(), Arc::new(Quote(2)), 2).unwrap();
        es.run().unwrap();

        // Joined during the first fan-out, so only the second reaches it.
        assert_eq!(late.received(), vec!["Quote(2)"]);
    }
}

// ── Watchdog ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod watchdog_tests {
    use super::*;

    fn real_time(name: &str) -> Scheduler {
        SchedulerBuilder::new().name(name).real_time(true).build().unwrap()
    }

    fn spawn_dispatch(es: &Scheduler) -> thread::JoinHandle<des_core::DesResult<des_sched::ExitReason>> {
        let es = es.clone();
        thread::Builder::new()
            .name("dispatch".into())
            .spawn(move || es.run())
            .unwrap()
    }

    #[test]
    fn steady_touches_raise_no_alert() {
        let es = real_time("healthy");
        let dog = Watchdog::new(10, Duration::from_millis(100));
        dog.arm(&es).unwrap();
        let worker = spawn_dispatch(&es);

        thread::sleep(Duration::from_millis(350));
        assert!(dog.is_monitoring());
        assert_eq!(dog.monitored_thread(), Some(worker.thread().id()));
        assert_eq!(dog.alerts(), 0);

        es.terminate();
        worker.join().unwrap().unwrap();
        assert!(wait_until(Duration::from_secs(2), || !dog.is_monitoring()));
    }

    #[test]
    fn blocked_dispatch_thread_raises_alerts() {
        let reports: Arc<Mutex<Vec<StallReport>>> = Arc::default();
        let dog = {
            let reports = Arc::clone(&reports);
            Watchdog::with_on_stall(10, Duration::from_millis(100), move |r| reports.lock().unwrap().push(r.clone()))
        };

        let es = real_time("stalled");
        dog.arm(&es).unwrap();
        let blocker = handler_fn(|_, _, _| thread::sleep(Duration::from_millis(450)));
        es.schedule_after(blocker, des_core::generic_event(), 50, des_core::TimeUnit::Milliseconds).unwrap();
        let worker = spawn_dispatch(&es);

        assert!(wait_until(Duration::from_secs(2), || dog.alerts() > 0));
        es.terminate();
        worker.join().unwrap().unwrap();
        assert!(wait_until(Duration::from_secs(2), || !dog.is_monitoring()));

        let reports = reports.lock().unwrap();
        assert!(!reports.is_empty());
        assert_eq!(reports.len() as u64, dog.alerts());
        assert_eq!(reports[0].alert, 1);
        assert_eq!(reports[0].scheduler, "stalled");
        assert_eq!(reports[0].thread_name.as_deref(), Some("dispatch"));
    }

    #[test]
    fn failed_rearm_is_reported_as_a_stall() {
        let dog = Watchdog::with_on_stall(-1, Duration::from_millis(30), |_| {});
        let es = draining();
        dog.arm(&es).unwrap();

        // The only touch cannot re-schedule itself (negative delay), so the
        // queue drains while the monitor thread keeps watching.
        assert_eq!(es.run().unwrap(), des_sched::ExitReason::QueueDrained);
        assert_eq!(es.total_events_delivered(), 1);
        assert_eq!(es.queue_length(), 0);
        assert!(wait_until(Duration::from_secs(2), || dog.alerts() > 0));

        es.terminate();
        assert!(wait_until(Duration::from_secs(2), || !dog.is_monitoring()));
    }

    #[test]
    fn unarmed_watchdog_never_monitors() {
        let dog = Watchdog::new(10, Duration::from_millis(10));
        thread::sleep(Duration::from_millis(30));
        assert!(!dog.is_monitoring());
        assert_eq!(dog.monitored_thread(), None);
        assert_eq!(dog.alerts(), 0);
    }
}
