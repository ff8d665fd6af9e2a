// dumploader/src/restore/progress.rs
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Bytes restored so far and the time it took.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    pub bytes: u64,
    pub elapsed: Duration,
}

impl ProgressSnapshot {
    pub fn sample(bytes: &AtomicU64, started: Instant) -> Self {
        Self {
            bytes: bytes.load(Ordering::Relaxed),
            elapsed: started.elapsed(),
        }
    }

    pub fn megabytes(&self) -> f64 {
        self.bytes as f64 / BYTES_PER_MB
    }

    /// Average MB/s; zero before any time has passed.
    pub fn rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 { self.megabytes() / secs } else { 0.0 }
    }
}

/// Background task logging restore throughput on a fixed interval.
pub struct ProgressReporter {
    stop: CancellationToken,
    handle: JoinHandle<()>,
}

impl ProgressReporter {
    pub fn start(bytes: Arc<AtomicU64>, started: Instant, every: Duration) -> Self {
        let stop = CancellationToken::new();
        let handle = tokio::spawn(report_loop(bytes, started, every, stop.clone()));
        Self { stop, handle }
    }

    /// Stops the loop and waits for its task to exit.
    pub async fn stop(self) {
        self.stop.cancel();
        if let Err(e) = self.handle.await {
            warn!(error = %e, "Progress reporter ended abnormally");
        }
    }
}

async fn report_loop(bytes: Arc<AtomicU64>, started: Instant, every: Duration, stop: CancellationToken) {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = ticker.tick() => {
                let snapshot = ProgressSnapshot::sample(&bytes, started);
                info!(
                    all_mb = format_args!("{:.2}", snapshot.megabytes()),
                    elapsed_secs = format_args!("{:.2}", snapshot.elapsed.as_secs_f64()),
                    rate_mb_per_sec = format_args!("{:.2}", snapshot.rate()),
                    "Restoring..."
                );
            }
        }
    }
}
