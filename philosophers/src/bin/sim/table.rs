//! Binary target running one dining table.
//!
//! ```text
//! sim-table --strategy hierarchy --actors 30 --seconds 10
//! ```

use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use clap::Parser;
use philosophers::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sim-table")]
#[command(about = "Run dining philosophers under one acquisition strategy", long_about = None)]
struct Args {
    /// Acquisition strategy (naive, hierarchy, arbitrated, optimistic, tokenpassing)
    #[arg(short, long, default_value = "naive")]
    strategy: StrategyKind,

    /// Number of actors at the table
    #[arg(short, long, default_value = "30")]
    actors: u32,

    /// Seconds to run before cancelling the table
    #[arg(long, default_value = "10")]
    seconds: u64,

    /// Watchdog deadlock timeout in milliseconds
    #[arg(long, default_value = "500")]
    deadlock_timeout_ms: u64,

    /// Naive strategy per-resource lock timeout in milliseconds
    #[arg(long, default_value = "5000")]
    lock_timeout_ms: u64,

    /// Pause between successive resource locks in milliseconds
    #[arg(long, default_value = "0")]
    reach_delay_ms: u64,

    /// Print the stored state records as JSON after the report
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    let args = Args::parse();
    let config = TableConfig::standalone()
        .with_deadlock_timeout(Duration::from_millis(args.deadlock_timeout_ms))
        .with_naive_lock_timeout(Duration::from_millis(args.lock_timeout_ms))
        .with_reach_delay(Duration::from_millis(args.reach_delay_ms));

    let repo = Arc::new(InMemoryStateRepository::new());
    let orchestrator = TableOrchestrator::new(config, Arc::clone(&repo) as Arc<dyn StateSink>);

    let table_id = TableId(
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default(),
    );
    let cancellation = CancellationToken::new();
    let timer = {
        let cancellation = cancellation.clone();
        let seconds = args.seconds;
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(seconds)).await;
            cancellation.cancel();
        })
    };

    eprintln!(
        "Running {} actors with the {} strategy for {}s...",
        args.actors, args.strategy, args.seconds
    );
    let result = orchestrator
        .run(table_id, args.strategy, args.actors, cancellation)
        .await;
    timer.abort();

    match result {
        Ok(report) => {
            println!("{report}");
            if args.json {
                match serde_json::to_string_pretty(&repo.get(table_id)) {
                    Ok(json) => println!("{json}"),
                    Err(err) => eprintln!("failed to encode state records: {err}"),
                }
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            if let Some(report) = err.report() {
                println!("{report}");
            }
            eprintln!("table failed: {err}");
            ExitCode::FAILURE
        }
    }
}
