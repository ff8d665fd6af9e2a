use std::path::PathBuf;
use thiserror::Error;

/// Longest statement excerpt carried in an error message.
const STATEMENT_EXCERPT_LEN: usize = 256;

#[derive(Error, Debug)]
pub enum RestoreError {
    #[error("Malformed dump file name {path}: {reason}")]
    MalformedFileName { path: PathBuf, reason: String },

    #[error(
        "Statement failed on connection {connection} while restoring {file} \
         (database: {database}, table: {table}, part: {part}): {statement}"
    )]
    Execute {
        file: PathBuf,
        database: String,
        table: String,
        part: String,
        connection: usize,
        statement: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Connection pool is closed")]
    PoolClosed,
}

/// Shortens a statement for display, keeping it on char boundaries.
pub fn statement_excerpt(statement: &str) -> String {
    let trimmed = statement.trim();
    if trimmed.len() <= STATEMENT_EXCERPT_LEN {
        return trimmed.to_string();
    }
    let mut end = STATEMENT_EXCERPT_LEN;
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &trimmed[..end])
}
