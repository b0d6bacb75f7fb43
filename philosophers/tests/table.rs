//! End-to-end table runs through the orchestrator.

use std::sync::Arc;
use std::time::Duration;

use philosophers::prelude::*;
use philosophers::table::ActorExit;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_max_level(tracing::Level::WARN).try_init();
}

fn quick_config() -> TableConfig {
    TableConfig::standalone()
        .with_snapshot_interval(Duration::from_millis(50))
        .with_watchdog_tick(Duration::from_millis(20))
        .with_buffer_capacity(256)
}

async fn run_for(
    orchestrator: &TableOrchestrator,
    table_id: TableId,
    strategy: StrategyKind,
    count: u32,
    duration: Duration,
) -> Result<TableReport> {
    let cancellation = CancellationToken::new();
    let timer = {
        let cancellation = cancellation.clone();
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            cancellation.cancel();
        })
    };
    let result = orchestrator.run(table_id, strategy, count, cancellation).await;
    timer.abort();
    result
}

#[tokio::test(flavor = "multi_thread")]
async fn test_deadlock_free_tables_run_until_cancelled() {
    init_tracing();

    for strategy in [
        StrategyKind::Hierarchy,
        StrategyKind::Arbitrated,
        StrategyKind::Optimistic,
        StrategyKind::TokenPassing,
    ] {
        let repo = Arc::new(InMemoryStateRepository::new());
        let orchestrator =
            TableOrchestrator::new(quick_config(), repo.clone()).with_exclusion_probe();

        let report = run_for(&orchestrator, TableId(1), strategy, 5, Duration::from_millis(300))
            .await
            .expect("table run");

        assert!(!report.deadlock_detected, "{strategy}\n{report}");
        assert_eq!(report.exclusion_violations, Some(0), "{strategy}");
        assert_eq!(report.exits.len(), 5);
        assert!(report.exits.iter().all(|(_, e)| *e == ActorExit::Cancelled));
        assert!(report.total_cycles() > 0, "{strategy}");
    }
}

/// Run a table with the stock standalone configuration until the state
/// sink has seen `target` cycles, then cancel it.
async fn run_until_cycles(strategy: StrategyKind, count: u32, target: u64) -> TableReport {
    let repo = Arc::new(InMemoryStateRepository::new());
    let orchestrator = TableOrchestrator::new(TableConfig::standalone(), repo.clone());
    let table_id = TableId(u64::from(count));
    let cancellation = CancellationToken::new();

    let driver = {
        let cancellation = cancellation.clone();
        tokio::spawn(async move {
            let deadline = tokio::time::Instant::now() + Duration::from_secs(60);
            while tokio::time::Instant::now() < deadline {
                let seen: u64 = repo.get(table_id).iter().map(|r| r.stats.cycles).sum();
                if seen >= target {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            cancellation.cancel();
        })
    };

    let report = orchestrator
        .run(table_id, strategy, count, cancellation)
        .await
        .expect("table run");
    driver.abort();
    report
}

#[tokio::test(flavor = "multi_thread")]
async fn test_watchdog_stays_quiet_for_deadlock_free_strategies() {
    init_tracing();

    for strategy in StrategyKind::ALL.into_iter().filter(StrategyKind::is_deadlock_free) {
        for count in [2, 5, 30] {
            let report = run_until_cycles(strategy, count, 10_000).await;

            assert!(!report.deadlock_detected, "{strategy} x{count}\n{report}");
            assert!(report.total_cycles() >= 10_000, "{strategy} x{count}\n{report}");
            assert_eq!(report.exits.len(), count as usize);
            assert!(report.exits.iter().all(|(_, e)| *e == ActorExit::Cancelled));
        }
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_report_and_repository_agree() {
    init_tracing();

    let repo = Arc::new(InMemoryStateRepository::new());
    let orchestrator = TableOrchestrator::new(quick_config(), repo.clone());
    let report = run_for(
        &orchestrator,
        TableId(42),
        StrategyKind::Hierarchy,
        4,
        Duration::from_millis(250),
    )
    .await
    .expect("table run");

    let records = repo.get(TableId(42));
    assert_eq!(records.len(), report.totals.len());
    assert!(records.iter().all(|r| r.end_time.is_some()));
    assert!(records.iter().all(|r| r.strategy == StrategyKind::Hierarchy));

    for ((actor_id, stats), record) in report.totals.iter().zip(&records) {
        assert_eq!(*actor_id, record.actor_id);
        assert_eq!(stats.cycles, record.stats.cycles);
        assert_eq!(stats.phases.iter().sum::<Duration>(), stats.total);
    }

    let grand = report.grand_total();
    assert_eq!(grand.cycles, records.iter().map(|r| r.stats.cycles).sum::<u64>());
    let text = report.to_string();
    assert!(text.lines().any(|l| l.starts_with("TOTAL")), "{text}");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_watchdog_declares_naive_deadlock() {
    init_tracing();

    let config = quick_config()
        .with_deadlock_timeout(Duration::from_millis(200))
        .with_reach_delay(Duration::from_millis(50))
        .with_naive_lock_timeout(Duration::from_millis(1500));
    let repo = Arc::new(InMemoryStateRepository::new());
    let orchestrator = TableOrchestrator::new(config, repo.clone());

    let report = run_for(
        &orchestrator,
        TableId(7),
        StrategyKind::Naive,
        5,
        Duration::from_secs(30),
    )
    .await
    .expect("a deadlock is not an error");

    assert!(report.deadlock_detected, "{report}");
    assert!(report.possible_deadlocks() >= 1, "{report}");
    assert!(report.to_string().starts_with("!!! DEADLOCK DETECTED !!!"));
    assert!(report.elapsed < Duration::from_secs(30));
    assert!(repo.get(TableId(7)).iter().all(|r| r.deadlock_detected));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_single_actor_table_is_rejected() {
    let orchestrator =
        TableOrchestrator::new(quick_config(), Arc::new(InMemoryStateRepository::new()));
    let err = orchestrator
        .run(TableId(1), StrategyKind::Optimistic, 1, CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, TableError::InvalidActorCount { count: 1, .. }));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_parent_cancellation_before_start_still_reports() {
    let repo = Arc::new(InMemoryStateRepository::new());
    let orchestrator = TableOrchestrator::new(quick_config(), repo.clone());
    let cancellation = CancellationToken::new();
    cancellation.cancel();

    let report = orchestrator
        .run(TableId(3), StrategyKind::TokenPassing, 3, cancellation)
        .await
        .expect("table run");

    assert!(!report.deadlock_detected);
    assert_eq!(report.exits.len(), 3);
}
