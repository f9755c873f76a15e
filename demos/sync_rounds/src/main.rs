//! sync_rounds — several schedulers held in lock-step by a barrier.
//!
//! Each scheduler runs on its own thread and works through a random batch of
//! work items per round.  The items burn real CPU time, so some schedulers
//! finish a round well before others; the `Synchronizer` holds the fast ones
//! at the round boundary until the slowest arrives.
//!
//! Usage: `sync_rounds [config.json]`.  Without a path the embedded default
//! configuration below is used.  `RUST_LOG=debug` shows every barrier
//! release.

use std::fs;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, ensure, Context, Result};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use tracing::info;

use des_core::{Event, EventRef, SchedulerConfig, Time};
use des_sched::{Handler, Scheduler, SchedulerBuilder};
use des_sync::{Roster, Synchronizer};
use des_util::PubSub;

// ── Configuration ─────────────────────────────────────────────────────────────

const DEFAULT_CONFIG: &str = r#"{
    "schedulers":      4,
    "rounds":          20,
    "interval":        50,
    "work_per_round":  8,
    "max_work_micros": 2000,
    "seed":            42,
    "scheduler": {
        "finest_time_unit": "milliseconds",
        "poll_interval_ms": 100
    }
}"#;

#[derive(Debug, Deserialize)]
#[serde(default)]
struct DemoConfig {
    schedulers:      usize,
    rounds:          u32,
    /// Round length in the scheduler's finest unit.
    interval:        Time,
    work_per_round:  u32,
    max_work_micros: u64,
    seed:            u64,
    /// Template for every scheduler; names and end times are filled in.
    scheduler:       SchedulerConfig,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            schedulers:      2,
            rounds:          10,
            interval:        50,
            work_per_round:  4,
            max_work_micros: 1_000,
            seed:            0,
            scheduler:       SchedulerConfig::default(),
        }
    }
}

fn load_config() -> Result<DemoConfig> {
    let config: DemoConfig = match std::env::args().nth(1) {
        Some(path) => {
            let text = fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
            serde_json::from_str(&text).with_context(|| format!("parsing {path}"))?
        }
        None => serde_json::from_str(DEFAULT_CONFIG)?,
    };
    ensure!(config.schedulers > 0, "at least one scheduler is required");
    ensure!(config.interval > 0, "interval must be positive");
    config.scheduler.validate()?;
    Ok(config)
}

// ── Work items ────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct Work {
    round:       u32,
    cost_micros: u64,
}

impl Event for Work {}

/// Burns each item's cost and keeps totals across every scheduler.
#[derive(Default)]
struct Tally {
    items:       AtomicU64,
    busy_micros: AtomicU64,
}

impl Handler for Tally {
    fn handle(&self, event: &EventRef, scheduler: &Scheduler, time: Time) {
        let Some(work) = event.downcast_ref::<Work>() else { return };
        let started = Instant::now();
        while started.elapsed() < Duration::from_micros(work.cost_micros) {
            std::hint::spin_loop();
        }
        self.items.fetch_add(1, Ordering::Relaxed);
        self.busy_micros.fetch_add(work.cost_micros, Ordering::Relaxed);
        tracing::trace!(scheduler = %scheduler, time, round = work.round, "work item done");
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

    let config = load_config()?;
    let end_time = config.interval * Time::from(config.rounds);
    println!("=== sync_rounds — rust_des barrier demo ===");
    println!(
        "Schedulers: {}  |  Rounds: {}  |  Interval: {}{}  |  Work/round: {}",
        config.schedulers,
        config.rounds,
        config.interval,
        config.scheduler.finest_time_unit,
        config.work_per_round
    );
    println!();

    // 1. Barrier with a liveness roster, so a crashed worker cannot hang the rest.
    let roster = Roster::new(config.schedulers);
    let sync = Synchronizer::with_roster(roster.clone(), config.interval);

    // 2. Work items reach the tally through a type-keyed router.
    let router = PubSub::new();
    let tally = Arc::new(Tally::default());
    router.subscribe::<Work>(tally.clone());

    // 3. One scheduler per worker, pre-loaded with every round's work.
    let mut rng = SmallRng::seed_from_u64(config.seed);
    let mut schedulers = Vec::with_capacity(config.schedulers);
    for i in 0..config.schedulers {
        let es = SchedulerBuilder::from_config(config.scheduler.clone())
            .name(format!("es-{i}"))
            .end_time(end_time)
            .build()?;
        sync.arm(&es)?;
        for round in 0..config.rounds {
            let base = config.interval * Time::from(round);
            for _ in 0..config.work_per_round {
                let work = Work { round, cost_micros: rng.gen_range(0..=config.max_work_micros) };
                let at = base + rng.gen_range(0..config.interval);
                es.schedule_at_ticks(router.clone(), Arc::new(work), at)?;
            }
        }
        schedulers.push(es);
    }

    // 4. Run every scheduler on its own thread.
    let t0 = Instant::now();
    let workers = schedulers
        .iter()
        .enumerate()
        .map(|(i, es)| {
            let es = es.clone();
            let me = roster.participant(i);
            thread::Builder::new().name(es.name().to_owned()).spawn(move || {
                let _alive = me.enter();
                es.run()
            })
        })
        .collect::<io::Result<Vec<_>>>()?;

    for worker in workers {
        let name = worker.thread().name().unwrap_or("worker").to_owned();
        let reason = worker.join().map_err(|_| anyhow!("{name} panicked"))??;
        info!(scheduler = %name, ?reason, "scheduler finished");
    }
    let elapsed = t0.elapsed();

    // 5. Report.
    println!();
    println!("Rounds completed: {}  ({sync})", sync.rounds_completed());
    for es in &schedulers {
        println!(
            "  {:<6} delivered {:>5}  max queue {:>4}  clock {}",
            es.name(),
            es.total_events_delivered(),
            es.max_queue_length(),
            es.current_time()
        );
    }
    println!(
        "Work items: {}  |  busy {:.1} ms  |  wall {:.1} ms",
        tally.items.load(Ordering::Relaxed),
        tally.busy_micros.load(Ordering::Relaxed) as f64 / 1_000.0,
        elapsed.as_secs_f64() * 1_000.0
    );
    Ok(())
}
