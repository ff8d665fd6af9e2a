// dumploader/src/utils/connection.rs
use anyhow::{Context, Result};
use sqlx::mysql::MySqlConnection;
use sqlx::{Connection as _, Executor as _};
use std::future::Future;
use url::Url;

/// A live server connection the restorers run SQL text on.
pub trait Connection: Send + 'static {
    /// Identity used in log lines and error context.
    fn id(&self) -> usize;

    /// Runs one or more statements against the server.
    fn execute(&mut self, sql: &str) -> impl Future<Output = Result<(), sqlx::Error>> + Send;
}

/// A MySQL connection tagged with the worker slot it was opened for.
pub struct MySqlLoaderConnection {
    id: usize,
    inner: MySqlConnection,
}

impl MySqlLoaderConnection {
    /// Opens a connection and checks it answers a ping.
    pub async fn connect(id: usize, server_url: &Url) -> Result<Self> {
        let mut inner = MySqlConnection::connect(server_url.as_str())
            .await
            .with_context(|| {
                format!(
                    "Failed to open connection {} to {}",
                    id,
                    server_url.host_str().unwrap_or("unknown_host")
                )
            })?;
        inner
            .ping()
            .await
            .with_context(|| format!("Connection {} did not answer ping", id))?;
        Ok(Self { id, inner })
    }

    pub async fn close(self) -> Result<()> {
        self.inner
            .close()
            .await
            .with_context(|| format!("Failed to close connection {}", self.id))
    }
}

impl Connection for MySqlLoaderConnection {
    fn id(&self) -> usize {
        self.id
    }

    async fn execute(&mut self, sql: &str) -> Result<(), sqlx::Error> {
        // Raw text protocol: dump files are not prepared-statement friendly.
        self.inner.execute(sql).await.map(|_| ())
    }
}
