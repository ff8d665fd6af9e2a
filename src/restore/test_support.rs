// dumploader/src/restore/test_support.rs
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::utils::connection::Connection;

/// One statement as seen by a `RecordingConnection`.
#[derive(Debug, Clone)]
pub struct Executed {
    pub seq: usize,
    pub connection: usize,
    pub sql: String,
}

/// Shared log of every statement run across a set of recording connections.
#[derive(Default)]
pub struct Recorder {
    next_seq: AtomicUsize,
    log: Mutex<Vec<Executed>>,
    active: AtomicUsize,
    peak_active: AtomicUsize,
    fail_on: Option<String>,
    delay: Option<Duration>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Statements containing `fragment` are rejected like a server syntax error.
    pub fn failing_on(fragment: &str) -> Arc<Self> {
        Arc::new(Self {
            fail_on: Some(fragment.to_string()),
            ..Default::default()
        })
    }

    /// Each statement takes `delay`, so workers overlap.
    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Default::default()
        })
    }

    pub fn executed(&self) -> Vec<Executed> {
        self.log.lock().unwrap().clone()
    }

    pub fn statements(&self) -> Vec<String> {
        self.executed().into_iter().map(|e| e.sql).collect()
    }

    /// Highest number of statements that were running at the same time.
    pub fn peak_active(&self) -> usize {
        self.peak_active.load(Ordering::SeqCst)
    }
}

pub struct RecordingConnection {
    id: usize,
    recorder: Arc<Recorder>,
}

impl RecordingConnection {
    pub fn new(id: usize, recorder: Arc<Recorder>) -> Self {
        Self { id, recorder }
    }
}

impl Connection for RecordingConnection {
    fn id(&self) -> usize {
        self.id
    }

    async fn execute(&mut self, sql: &str) -> Result<(), sqlx::Error> {
        let recorder = &self.recorder;
        let now_active = recorder.active.fetch_add(1, Ordering::SeqCst) + 1;
        recorder.peak_active.fetch_max(now_active, Ordering::SeqCst);

        {
            let mut log = recorder.log.lock().unwrap();
            log.push(Executed {
                seq: recorder.next_seq.fetch_add(1, Ordering::SeqCst),
                connection: self.id,
                sql: sql.to_string(),
            });
        }
        if let Some(delay) = recorder.delay {
            tokio::time::sleep(delay).await;
        }
        recorder.active.fetch_sub(1, Ordering::SeqCst);

        match &recorder.fail_on {
            Some(fragment) if sql.contains(fragment.as_str()) => Err(sqlx::Error::Protocol(format!(
                "You have an error in your SQL syntax near '{}'",
                fragment
            ))),
            _ => Ok(()),
        }
    }
}
