//! Mutual exclusion and deadlock freedom of every acquisition strategy.
//!
//! Actors are driven directly on plain threads so a deadlock shows up as
//! the cycle counter stalling, not as a hung test harness.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use philosophers::actor::{CycleOutcome, ExclusionProbe};
use philosophers::prelude::*;

const TARGET_CYCLES: u64 = 10_000;
const DEADLINE: Duration = Duration::from_secs(60);

struct Outcome {
    cycles: u64,
    violations: u64,
    max_occupancy: u32,
    timed_out: bool,
}

/// Run `count` actors of `kind` until the table as a whole completes
/// `target` cycles or the deadline passes.
fn drive(kind: StrategyKind, count: u32, config: ActorConfig, target: u64) -> Outcome {
    let ctx = SimContext::new();
    let mut actors = kind
        .factory()
        .create_actors(&ctx, count, &config)
        .expect("create actors");
    let probe = ExclusionProbe::new(actors.iter().flat_map(|a| a.resources().to_vec()));
    for actor in &mut actors {
        actor.attach_probe(Arc::clone(&probe));
    }

    let cycles = Arc::new(AtomicU64::new(0));
    let stop = Arc::new(AtomicBool::new(false));
    let active = Arc::new(AtomicU64::new(u64::from(count)));
    let handles: Vec<_> = actors
        .into_iter()
        .map(|mut actor| {
            let cycles = Arc::clone(&cycles);
            let stop = Arc::clone(&stop);
            let active = Arc::clone(&active);
            thread::spawn(move || {
                while !stop.load(Ordering::SeqCst) {
                    match actor.run_cycle().expect("strategy fault") {
                        CycleOutcome::Completed(_) => {
                            cycles.fetch_add(1, Ordering::SeqCst);
                        }
                        CycleOutcome::PossibleDeadlock { .. } => break,
                    }
                }
                active.fetch_sub(1, Ordering::SeqCst);
            })
        })
        .collect();

    let started = Instant::now();
    let mut timed_out = false;
    while cycles.load(Ordering::SeqCst) < target && active.load(Ordering::SeqCst) > 0 {
        if started.elapsed() > DEADLINE {
            timed_out = true;
            break;
        }
        thread::sleep(Duration::from_millis(5));
    }
    stop.store(true, Ordering::SeqCst);

    if !timed_out {
        for handle in handles {
            handle.join().expect("actor panicked");
        }
    }

    Outcome {
        cycles: cycles.load(Ordering::SeqCst),
        violations: probe.violations(),
        max_occupancy: probe.max_occupancy(),
        timed_out,
    }
}

fn assert_deadlock_free(kind: StrategyKind) {
    let _ = tracing_subscriber::fmt().with_max_level(tracing::Level::WARN).try_init();

    for count in [2, 5, 30] {
        let outcome = drive(kind, count, ActorConfig::default(), TARGET_CYCLES);
        assert!(
            !outcome.timed_out,
            "{kind} with {count} actors stalled after {} cycles",
            outcome.cycles
        );
        assert!(outcome.cycles >= TARGET_CYCLES);
        assert_eq!(outcome.violations, 0, "{kind} with {count} actors");
        assert_eq!(outcome.max_occupancy, 1, "{kind} with {count} actors");
    }
}

// ============================================================================
// Deadlock-free strategies
// ============================================================================

#[test]
fn test_hierarchy_is_exclusive_and_deadlock_free() {
    assert_deadlock_free(StrategyKind::Hierarchy);
}

#[test]
fn test_arbitrated_is_exclusive_and_deadlock_free() {
    assert_deadlock_free(StrategyKind::Arbitrated);
}

#[test]
fn test_optimistic_is_exclusive_and_deadlock_free() {
    assert_deadlock_free(StrategyKind::Optimistic);
}

#[test]
fn test_token_passing_is_exclusive_and_deadlock_free() {
    assert_deadlock_free(StrategyKind::TokenPassing);
}

// ============================================================================
// Naive strategy
// ============================================================================

#[test]
fn test_naive_is_exclusive_while_it_runs() {
    let config = ActorConfig {
        naive_lock_timeout: Duration::from_millis(200),
        ..ActorConfig::default()
    };
    let outcome = drive(StrategyKind::Naive, 5, config, 2_000);
    assert_eq!(outcome.violations, 0);
    assert!(outcome.max_occupancy <= 1);
}

#[test]
fn test_naive_deadlocks_when_everyone_reaches_at_once() {
    let _ = tracing_subscriber::fmt().with_max_level(tracing::Level::WARN).try_init();

    let ctx = SimContext::new();
    let config = ActorConfig {
        reach_delay: Duration::from_millis(50),
        naive_lock_timeout: Duration::from_millis(300),
        ..ActorConfig::default()
    };
    let actors = StrategyKind::Naive
        .factory()
        .create_actors(&ctx, 5, &config)
        .expect("create actors");

    let start = Arc::new(std::sync::Barrier::new(actors.len()));
    let handles: Vec<_> = actors
        .into_iter()
        .map(|mut actor| {
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                actor.run_cycle().expect("strategy fault")
            })
        })
        .collect();

    let outcomes: Vec<CycleOutcome> = handles
        .into_iter()
        .map(|h| h.join().expect("actor panicked"))
        .collect();

    let timed_out = outcomes
        .iter()
        .filter(|o| matches!(o, CycleOutcome::PossibleDeadlock { .. }))
        .count();
    assert!(timed_out >= 1, "no actor hit the circular wait: {outcomes:?}");
    for outcome in &outcomes {
        if let CycleOutcome::PossibleDeadlock { waited, .. } = outcome {
            assert!(*waited >= Duration::from_millis(300));
        }
    }
}
