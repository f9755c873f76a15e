//! console — a real-time scheduler you can poke at from a terminal.
//!
//! Customers arrive at random and leave after a random service time, so the
//! queue length drifts up and down.  A watchdog guards the dispatch thread,
//! and the command console is attached to stdin/stdout and, when a port is
//! given, to a TCP socket as well:
//!
//! ```text
//! cargo run -p console -- 7070
//! nc 127.0.0.1 7070
//! console > ql
//! ```
//!
//! `terminate` in any session stops the scheduler and ends the program.

use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use anyhow::{Context, Result};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::{info, warn};

use des_core::{generic_event, EventRef, Time, TimeUnit};
use des_monitor::{spawn_socket_monitor, spawn_terminal_monitor};
use des_sched::{handler_fn, Handler, Scheduler, SchedulerBuilder};
use des_util::Watchdog;

// ── Constants ─────────────────────────────────────────────────────────────────

const SEED:             u64  = 7;
const MAX_ARRIVAL_GAP:  Time = 400;   // ms
const MAX_SERVICE_TIME: Time = 3_000; // ms
const WATCHDOG_TOUCH:   Time = 250;   // ms
const WATCHDOG_ALERT:   Duration = Duration::from_secs(2);

// ── Arrival process ───────────────────────────────────────────────────────────

/// Each delivery is one arrival: it books that customer's departure and the
/// next arrival.
struct Arrivals {
    me:  Weak<Arrivals>,
    rng: Mutex<SmallRng>,
}

impl Arrivals {
    fn new(seed: u64) -> Arc<Self> {
        Arc::new_cyclic(|me| Self { me: me.clone(), rng: Mutex::new(SmallRng::seed_from_u64(seed)) })
    }
}

impl Handler for Arrivals {
    fn handle(&self, event: &EventRef, es: &Scheduler, time: Time) {
        let (gap, service) = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            (rng.gen_range(0..=MAX_ARRIVAL_GAP), rng.gen_range(0..=MAX_SERVICE_TIME))
        };
        let Some(me) = self.me.upgrade() else { return };
        let departure = handler_fn(move |_, _, left| {
            tracing::debug!(arrived = time, left, "customer departed");
        });
        let booked = es
            .schedule_after(departure, generic_event(), service, TimeUnit::Milliseconds)
            .and_then(|()| es.schedule_after(me, Arc::clone(event), gap, TimeUnit::Milliseconds));
        if let Err(e) = booked {
            warn!(error = %e, "arrival process stopped");
        }
    }
}

// ── Main ──────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let port = std::env::args()
        .nth(1)
        .map(|p| p.parse::<u16>().with_context(|| format!("invalid port {p:?}")))
        .transpose()?;

    let es = SchedulerBuilder::new().name("console").real_time(true).build()?;

    let watchdog = Watchdog::new(WATCHDOG_TOUCH, WATCHDOG_ALERT);
    watchdog.arm(&es)?;
    es.schedule_now(Arrivals::new(SEED), generic_event())?;

    // The terminal session blocks on stdin; it is never joined.
    let _terminal = spawn_terminal_monitor(es.clone())?;
    let socket = match port {
        Some(port) => Some(spawn_socket_monitor(es.clone(), ("127.0.0.1", port))?),
        None => None,
    };
    println!("Type ? for the command list, terminate to stop.");

    let reason = es.run()?;
    info!(?reason, delivered = es.total_events_delivered(), "scheduler stopped");

    if let Some(socket) = socket {
        if socket.join().is_err() {
            warn!("socket console thread panicked");
        }
    }
    println!(
        "Delivered {} events  |  max queue {}  |  watchdog alerts {}",
        es.total_events_delivered(),
        es.max_queue_length(),
        watchdog.alerts()
    );
    Ok(())
}
