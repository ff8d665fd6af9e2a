// dumploader/src/restore/logic.rs
use anyhow::{Context, Result};
use rand::Rng;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::restore::catalog::DumpFileSet;
use crate::restore::db_restore;
use crate::restore::progress::{ProgressReporter, ProgressSnapshot};
use crate::utils::connection::Connection;
use crate::utils::pool::ConnectionPool;

/// Totals for a finished row-data phase.
pub type RestoreSummary = ProgressSnapshot;

/// In-place uniform shuffle: element `i` trades places with one drawn from `[0, i]`.
///
/// Dumpers write a big table's shards next to each other; spreading them out
/// keeps workers from all grinding on the same table at once.
pub fn shuffle_tables<T, R: Rng + ?Sized>(tables: &mut [T], rng: &mut R) {
    for i in 1..tables.len() {
        let j = rng.random_range(0..=i);
        tables.swap(i, j);
    }
}

/// Runs the three restore phases against `pool`.
///
/// Databases and table definitions are replayed on a single connection
/// before any row data is dispatched. Row-data files then run one per pooled
/// connection; the first failure stops dispatch and is returned.
pub async fn perform_restore_orchestration<C: Connection>(
    pool: &Arc<ConnectionPool<C>>,
    files: DumpFileSet,
    progress_interval: Duration,
) -> Result<RestoreSummary> {
    let DumpFileSet {
        databases,
        schemas,
        mut tables,
    } = files;

    {
        let mut conn = pool.acquire().await?;
        db_restore::restore_database_schemas(&mut *conn, &databases)
            .await
            .context("Database creation phase failed")?;
    }
    {
        let mut conn = pool.acquire().await?;
        db_restore::restore_table_schemas(&mut *conn, &schemas)
            .await
            .context("Table definition phase failed")?;
    }

    shuffle_tables(&mut tables, &mut rand::rng());
    info!(tables = tables.len(), workers = pool.size(), "Dispatching row data");

    let bytes = Arc::new(AtomicU64::new(0));
    let started = Instant::now();
    let reporter = ProgressReporter::start(Arc::clone(&bytes), started, progress_interval);

    let mut workers = JoinSet::new();
    let outcome = dispatch_tables(pool, tables, &bytes, &mut workers).await;
    if outcome.is_err() {
        // Abort in-flight work; dropped tasks hand their connections back.
        workers.shutdown().await;
    }
    reporter.stop().await;
    outcome.context("Row data phase failed")?;

    let summary = ProgressSnapshot::sample(&bytes, started);
    info!(
        cost_secs = format_args!("{:.2}", summary.elapsed.as_secs_f64()),
        all_mb = format_args!("{:.2}", summary.megabytes()),
        rate_mb_per_sec = format_args!("{:.2}", summary.rate()),
        "Restore finished"
    );
    Ok(summary)
}

async fn dispatch_tables<C: Connection>(
    pool: &Arc<ConnectionPool<C>>,
    tables: Vec<PathBuf>,
    bytes: &Arc<AtomicU64>,
    workers: &mut JoinSet<Result<()>>,
) -> Result<()> {
    // Tripped by a failing worker before it lets go of its connection.
    let failed = CancellationToken::new();

    for table in tables {
        // Wait for a free connection, but surface any worker failure first.
        let mut conn = loop {
            tokio::select! {
                biased;
                Some(joined) = workers.join_next() => worker_outcome(joined)?,
                conn = pool.acquire() => break conn?,
            }
        };
        if failed.is_cancelled() {
            break;
        }

        let bytes = Arc::clone(bytes);
        let failed = failed.clone();
        workers.spawn(async move {
            let outcome = db_restore::restore_table(&mut *conn, &table).await;
            match outcome {
                Ok(restored) => {
                    drop(conn);
                    bytes.fetch_add(restored, Ordering::Relaxed);
                    Ok(())
                }
                Err(e) => {
                    failed.cancel();
                    Err(e)
                }
            }
        });
    }

    while let Some(joined) = workers.join_next().await {
        worker_outcome(joined)?;
    }
    Ok(())
}

fn worker_outcome(joined: Result<Result<()>, JoinError>) -> Result<()> {
    joined.context("Restore worker panicked")?
}
