// SPDX-License-Identifier: MIT

//! `carrel upload` / `carrel backfill` - drive files to a terminal state

use crate::config::Config;
use crate::exit_error::ExitError;
use carrel_adapters::RemoteIndex;
use carrel_core::SystemClock;
use carrel_engine::{
    BreakerConfig, CircuitBreaker, IngestPool, PoolConfig, RateLimiter, RateLimiterConfig,
    TransitionManager,
};
use carrel_search::ActiveSession;
use carrel_store::Store;
use clap::Args;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Args)]
pub struct UploadArgs {
    /// Concurrent workers (1..=16)
    #[arg(long, default_value_t = 4)]
    pub concurrency: usize,

    /// Requests per minute against the index service
    #[arg(long, default_value_t = 60)]
    pub rpm: u32,
}

pub async fn run(args: UploadArgs, config: &Config, backfill: bool) -> Result<(), ExitError> {
    config.prepare()?;
    let store = Store::open(&config.db_path)
        .map_err(|e| ExitError::pipeline(format!("cannot open store: {e}")))?;

    let counts = store
        .ingest_counts()
        .map_err(|e| ExitError::pipeline(e.to_string()))?;
    let pending = counts.untracked + counts.uploading + counts.processing;
    if pending == 0 {
        println!(
            "nothing to do: {} indexed, {} failed",
            counts.indexed, counts.failed
        );
        return Ok(());
    }
    if backfill {
        println!(
            "backfill: re-driving {} interrupted files ({} already terminal)",
            pending,
            counts.indexed + counts.failed
        );
    }

    let adapter = Arc::new(RemoteIndex::new(config.remote()?));
    let clock = SystemClock;
    let manager = Arc::new(TransitionManager::new(store.clone(), clock.clone()));
    let limiter = Arc::new(RateLimiter::new(
        RateLimiterConfig {
            requests_per_minute: args.rpm,
            ..RateLimiterConfig::default()
        },
        clock.clone(),
    ));
    let breaker = Arc::new(CircuitBreaker::new(BreakerConfig::default(), clock.clone()));

    let mut pool_config = PoolConfig::with_workers(args.concurrency)
        .map_err(|e| ExitError::config(e.to_string()))?;
    pool_config.session_id = ActiveSession::new(&config.data_dir).current();

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received; finishing in-flight transitions");
            signal_cancel.cancel();
        }
    });

    let pool = Arc::new(IngestPool::new(
        store.clone(),
        adapter,
        manager,
        limiter,
        breaker,
        clock,
        pool_config,
        cancel,
    ));
    let report = pool
        .run()
        .await
        .map_err(|e| ExitError::pipeline(e.to_string()))?;

    let counts = store
        .ingest_counts()
        .map_err(|e| ExitError::pipeline(e.to_string()))?;
    println!(
        "run finished: {} transitions, {} newly indexed, {} newly failed",
        report.transitions, report.indexed, report.failed
    );
    println!(
        "corpus: {} indexed, {} failed, {} pending",
        counts.indexed,
        counts.failed,
        counts.untracked + counts.uploading + counts.processing
    );

    if report.credit_paused {
        // Clean pause, not an error: the checkpoint marker records the spot.
        println!("index service credits exhausted; checkpoint written, re-run to resume");
        return Ok(());
    }
    if report.halted {
        return Err(ExitError::pipeline(
            "circuit breaker halted the pool; inspect failures and re-run",
        ));
    }
    Ok(())
}
