pub(crate) mod catalog;     // Dump directory walk and file classification
pub(crate) mod db_restore;  // Schema and row-data replay on one connection
pub(crate) mod logic;       // Phase sequencing and worker dispatch
pub(crate) mod progress;    // Periodic throughput reporting
#[cfg(test)]
pub(crate) mod test_support;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::LoaderConfig;
use crate::utils::pool;

pub use logic::RestoreSummary;

/// Public entry point for the restore process.
///
/// Catalogs the dump before touching the server, then opens the pool and
/// replays the dump. The pool is closed whether or not the restore succeeded.
pub async fn run_restore_flow(config: &LoaderConfig) -> Result<RestoreSummary> {
    let files = catalog::load_files(&config.dump_dir)
        .with_context(|| format!("Failed to catalog dump directory {}", config.dump_dir.display()))?;
    info!(
        databases = files.databases.len(),
        schemas = files.schemas.len(),
        tables = files.tables.len(),
        dir = %config.dump_dir.display(),
        "Cataloged dump files"
    );

    let pool = pool::connect_pool(config).await?;
    let outcome = logic::perform_restore_orchestration(&pool, files, config.progress_interval).await;
    pool::close_pool(&pool).await;
    outcome
}
