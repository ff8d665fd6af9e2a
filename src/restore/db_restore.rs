// dumploader/src/restore/db_restore.rs
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::errors::{RestoreError, statement_excerpt};
use crate::restore::catalog::{self, TableIdentity};
use crate::utils::connection::Connection;

/// Statement separator used by the dump writer.
pub const STATEMENT_SEPARATOR: &str = ";\n";
const COMMENT_PREFIX: &str = "/*";

/// Splits dump text into executable statements.
///
/// This is the dump writer's convention, not SQL parsing: a literal `;\n`
/// inside a string value would split the statement.
pub fn split_statements(sql: &str) -> impl Iterator<Item = &str> {
    sql.split(STATEMENT_SEPARATOR)
        .filter(|query| !query.is_empty() && !query.starts_with(COMMENT_PREFIX))
}

fn use_database_statement(database: &str) -> String {
    format!("USE `{}`", database.replace('`', "``"))
}

async fn read_dump_file(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read dump file: {}", path.display()))
}

/// Executes `sql` and wraps any server error with the file it came from.
async fn execute_in_context<C: Connection>(
    conn: &mut C,
    sql: &str,
    file: &Path,
    identity: &TableIdentity,
) -> Result<(), RestoreError> {
    conn.execute(sql).await.map_err(|source| RestoreError::Execute {
        file: file.to_path_buf(),
        database: identity.database.clone(),
        table: identity.table.clone(),
        part: identity.part_label().to_string(),
        connection: conn.id(),
        statement: statement_excerpt(sql),
        source,
    })
}

/// Replays each `<db>-schema-create.sql` file, in order, as one batch.
pub async fn restore_database_schemas<C: Connection>(conn: &mut C, databases: &[PathBuf]) -> Result<()> {
    for path in databases {
        let name = catalog::database_name(path)?;
        let sql = read_dump_file(path).await?;
        conn.execute(&sql).await.map_err(|source| RestoreError::Execute {
            file: path.clone(),
            database: name.clone(),
            table: String::new(),
            part: String::new(),
            connection: conn.id(),
            statement: statement_excerpt(&sql),
            source,
        })?;
        info!(database = %name, connection = conn.id(), "Restored database");
    }
    Ok(())
}

/// Replays each `<db>.<table>-schema.sql` file, in order, statement by statement.
pub async fn restore_table_schemas<C: Connection>(conn: &mut C, schemas: &[PathBuf]) -> Result<()> {
    for path in schemas {
        let identity = catalog::schema_identity(path)?;
        execute_in_context(conn, &use_database_statement(&identity.database), path, &identity).await?;

        let sql = read_dump_file(path).await?;
        for query in split_statements(&sql) {
            execute_in_context(conn, query, path, &identity).await?;
        }
        info!(
            database = %identity.database,
            table = %identity.table,
            connection = conn.id(),
            "Restored schema"
        );
    }
    Ok(())
}

/// Replays one table or shard data file and returns the byte length of its text.
pub async fn restore_table<C: Connection>(conn: &mut C, path: &Path) -> Result<u64> {
    let identity = catalog::table_identity(path)?;
    info!(
        database = %identity.database,
        table = %identity.table,
        part = identity.part_label(),
        connection = conn.id(),
        "Restoring table"
    );

    execute_in_context(conn, &use_database_statement(&identity.database), path, &identity).await?;
    let sql = read_dump_file(path).await?;
    for query in split_statements(&sql) {
        execute_in_context(conn, query, path, &identity).await?;
    }

    info!(
        database = %identity.database,
        table = %identity.table,
        part = identity.part_label(),
        connection = conn.id(),
        bytes = sql.len(),
        "Restored table"
    );
    Ok(sql.len() as u64)
}
