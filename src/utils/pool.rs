// dumploader/src/utils/pool.rs
use anyhow::{Context, Result};
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{info, warn};

use crate::config::LoaderConfig;
use crate::errors::RestoreError;
use crate::utils::connection::{Connection, MySqlLoaderConnection};

/// Fixed-size set of live connections shared by the restore workers.
///
/// Each permit of the semaphore stands for one idle connection, so an
/// acquire waits exactly as long as every connection is checked out.
pub struct ConnectionPool<C: Connection> {
    idle: Mutex<Vec<C>>,
    permits: Arc<Semaphore>,
    size: usize,
}

/// A connection checked out of the pool. Dropping it hands the
/// connection back, whether the work using it succeeded or not.
pub struct PooledConnection<C: Connection> {
    conn: Option<C>,
    pool: Arc<ConnectionPool<C>>,
    _permit: OwnedSemaphorePermit,
}

impl<C: Connection> ConnectionPool<C> {
    pub fn new(connections: Vec<C>) -> Arc<Self> {
        let size = connections.len();
        Arc::new(Self {
            idle: Mutex::new(connections),
            permits: Arc::new(Semaphore::new(size)),
            size,
        })
    }

    /// Waits for a free connection.
    pub async fn acquire(self: &Arc<Self>) -> Result<PooledConnection<C>, RestoreError> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| RestoreError::PoolClosed)?;
        let conn = self.lock_idle().pop().ok_or(RestoreError::PoolClosed)?;
        Ok(PooledConnection {
            conn: Some(conn),
            pool: Arc::clone(self),
            _permit: permit,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn idle_count(&self) -> usize {
        self.lock_idle().len()
    }

    /// Rejects further acquires and hands back every idle connection.
    pub fn close(&self) -> Vec<C> {
        self.permits.close();
        std::mem::take(&mut *self.lock_idle())
    }

    fn lock_idle(&self) -> MutexGuard<'_, Vec<C>> {
        // The guarded Vec is never left half-updated, so a poisoned lock is still usable.
        self.idle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<C: Connection> Deref for PooledConnection<C> {
    type Target = C;

    fn deref(&self) -> &C {
        self.conn.as_ref().expect("pooled connection already released")
    }
}

impl<C: Connection> DerefMut for PooledConnection<C> {
    fn deref_mut(&mut self) -> &mut C {
        self.conn.as_mut().expect("pooled connection already released")
    }
}

impl<C: Connection> Drop for PooledConnection<C> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            // Return the connection before the permit is released.
            self.pool.lock_idle().push(conn);
        }
    }
}

/// Opens `config.threads` MySQL connections and wraps them in a pool.
pub async fn connect_pool(config: &LoaderConfig) -> Result<Arc<ConnectionPool<MySqlLoaderConnection>>> {
    let server_url = config.server_url()?;
    let mut connections = Vec::with_capacity(config.threads);
    for id in 0..config.threads {
        let conn = MySqlLoaderConnection::connect(id, &server_url)
            .await
            .with_context(|| format!("Failed to build connection pool of size {}", config.threads))?;
        connections.push(conn);
    }
    info!(size = connections.len(), address = %config.address, "Connection pool ready");
    Ok(ConnectionPool::new(connections))
}

/// Closes every connection still held by the pool.
pub async fn close_pool(pool: &ConnectionPool<MySqlLoaderConnection>) {
    let idle = pool.idle_count();
    if idle < pool.size() {
        warn!(idle, size = pool.size(), "Closing pool with connections still checked out");
    }
    for conn in pool.close() {
        let id = conn.id();
        if let Err(e) = conn.close().await {
            warn!(connection = id, error = %e, "Failed to close connection cleanly");
        }
    }
}
