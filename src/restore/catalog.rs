// dumploader/src/restore/catalog.rs
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::errors::RestoreError;

pub const DATABASE_SUFFIX: &str = "-schema-create.sql";
pub const SCHEMA_SUFFIX: &str = "-schema.sql";
pub const TABLE_SUFFIX: &str = ".sql";

/// Part reported for a table dumped as a single file.
pub const UNSHARDED_PART: &str = "0";

/// Dump files grouped by restore phase, in walk order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DumpFileSet {
    pub databases: Vec<PathBuf>,
    pub schemas: Vec<PathBuf>,
    pub tables: Vec<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpFileKind {
    Database,
    Schema,
    Table,
}

/// Database, table and shard a data or schema file belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableIdentity {
    pub database: String,
    pub table: String,
    pub part: Option<String>,
}

impl TableIdentity {
    pub fn part_label(&self) -> &str {
        self.part.as_deref().unwrap_or(UNSHARDED_PART)
    }
}

/// Classifies a file name, most specific suffix first: the schema suffixes
/// are themselves suffixes of the generic `.sql` one.
///
/// Works on raw name bytes so a non-UTF-8 name still lands in its phase.
pub fn classify(file_name: &[u8]) -> Option<DumpFileKind> {
    if file_name.ends_with(DATABASE_SUFFIX.as_bytes()) {
        Some(DumpFileKind::Database)
    } else if file_name.ends_with(SCHEMA_SUFFIX.as_bytes()) {
        Some(DumpFileKind::Schema)
    } else if file_name.ends_with(TABLE_SUFFIX.as_bytes()) {
        Some(DumpFileKind::Table)
    } else {
        None
    }
}

/// Walks `dump_dir` and sorts every regular file into its phase.
///
/// Entries are visited in file-name order. Any traversal error aborts the
/// whole catalog, since the restore cannot run on a partial file list.
/// Symlinks are not followed: a linked dump file is not a regular file here
/// and is left out.
pub fn load_files(dump_dir: &Path) -> Result<DumpFileSet> {
    if !dump_dir.is_dir() {
        anyhow::bail!("Dump directory is not a directory: {}", dump_dir.display());
    }

    let mut files = DumpFileSet::default();
    for entry in WalkDir::new(dump_dir).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk dump directory: {}", dump_dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        match classify(entry.file_name().as_encoded_bytes()) {
            Some(DumpFileKind::Database) => files.databases.push(entry.into_path()),
            Some(DumpFileKind::Schema) => files.schemas.push(entry.into_path()),
            Some(DumpFileKind::Table) => files.tables.push(entry.into_path()),
            None => {}
        }
    }
    Ok(files)
}

fn base_name<'a>(path: &'a Path) -> Result<&'a str, RestoreError> {
    path.file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| RestoreError::MalformedFileName {
            path: path.to_path_buf(),
            reason: "file name is not valid UTF-8".to_string(),
        })
}

fn strip_literal_suffix<'a>(path: &Path, name: &'a str, suffix: &str) -> Result<&'a str, RestoreError> {
    name.strip_suffix(suffix)
        .ok_or_else(|| RestoreError::MalformedFileName {
            path: path.to_path_buf(),
            reason: format!("expected suffix {}", suffix),
        })
}

/// `<db>-schema-create.sql` -> `<db>`
pub fn database_name(path: &Path) -> Result<String, RestoreError> {
    let name = base_name(path)?;
    Ok(strip_literal_suffix(path, name, DATABASE_SUFFIX)?.to_string())
}

/// `<db>.<table>-schema.sql` -> identity of the table the DDL creates.
pub fn schema_identity(path: &Path) -> Result<TableIdentity, RestoreError> {
    let name = base_name(path)?;
    split_identity(path, strip_literal_suffix(path, name, SCHEMA_SUFFIX)?)
}

/// `<db>.<table>[.<part>].sql` -> identity of the table or shard.
pub fn table_identity(path: &Path) -> Result<TableIdentity, RestoreError> {
    let name = base_name(path)?;
    split_identity(path, strip_literal_suffix(path, name, TABLE_SUFFIX)?)
}

fn split_identity(path: &Path, stem: &str) -> Result<TableIdentity, RestoreError> {
    let mut segments = stem.split('.');
    let database = segments.next().filter(|s| !s.is_empty());
    let table = segments.next().filter(|s| !s.is_empty());
    match (database, table) {
        (Some(database), Some(table)) => Ok(TableIdentity {
            database: database.to_string(),
            table: table.to_string(),
            part: segments.next().map(str::to_string),
        }),
        _ => Err(RestoreError::MalformedFileName {
            path: path.to_path_buf(),
            reason: "expected <database>.<table>[.<part>]".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_classification_is_priority_ordered() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        for name in [
            "a-schema-create.sql",
            "a.b-schema.sql",
            "a.b.sql",
            "a.b.1.sql",
            "readme.txt",
        ] {
            fs::write(dir.path().join(name), "SELECT 1;\n")?;
        }

        let files = load_files(dir.path())?;
        assert_eq!(files.databases, vec![dir.path().join("a-schema-create.sql")]);
        assert_eq!(files.schemas, vec![dir.path().join("a.b-schema.sql")]);
        assert_eq!(
            files.tables,
            vec![dir.path().join("a.b.1.sql"), dir.path().join("a.b.sql")]
        );
        Ok(())
    }

    #[test]
    fn test_walk_descends_and_skips_directories() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let nested = dir.path().join("shop").join("fake.sql");
        fs::create_dir_all(&nested)?;
        fs::write(dir.path().join("shop").join("shop.orders.00001.sql"), "")?;
        fs::write(dir.path().join("shop-schema-create.sql"), "")?;

        let files = load_files(dir.path())?;
        assert_eq!(files.databases.len(), 1);
        assert!(files.schemas.is_empty());
        assert_eq!(
            files.tables,
            vec![dir.path().join("shop").join("shop.orders.00001.sql")]
        );
        Ok(())
    }

    #[test]
    fn test_missing_directory_is_fatal() {
        let dir = TempDir::new().unwrap();
        assert!(load_files(&dir.path().join("absent")).is_err());
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(b"x-schema-create.sql"), Some(DumpFileKind::Database));
        assert_eq!(classify(b"x.y-schema.sql"), Some(DumpFileKind::Schema));
        assert_eq!(classify(b"x.y.sql"), Some(DumpFileKind::Table));
        assert_eq!(classify(b"x.y.sql.gz"), None);
        assert_eq!(classify(b"metadata"), None);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_non_utf8_table_file_is_kept_and_rejected_on_restore() -> anyhow::Result<()> {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = TempDir::new()?;
        let path = dir.path().join(OsStr::from_bytes(b"shop.caf\xe9.sql"));
        fs::write(&path, "INSERT INTO t VALUES (1);\n")?;

        let files = load_files(dir.path())?;
        assert_eq!(files.tables, vec![path.clone()]);

        let err = table_identity(&path).unwrap_err();
        assert!(matches!(err, RestoreError::MalformedFileName { .. }));
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_files_are_left_out() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let outside = TempDir::new()?;
        let target = outside.path().join("shop.orders.sql");
        fs::write(&target, "INSERT INTO orders VALUES (1);\n")?;
        std::os::unix::fs::symlink(&target, dir.path().join("shop.orders.sql"))?;

        let files = load_files(dir.path())?;
        assert!(files.tables.is_empty());
        Ok(())
    }

    #[test]
    fn test_table_identity_with_and_without_part() -> anyhow::Result<()> {
        let single = table_identity(Path::new("/d/shop.orders.sql"))?;
        assert_eq!(single.database, "shop");
        assert_eq!(single.table, "orders");
        assert_eq!(single.part, None);
        assert_eq!(single.part_label(), "0");

        let shard = table_identity(Path::new("/d/shop.orders.00003.sql"))?;
        assert_eq!(shard.part.as_deref(), Some("00003"));
        assert_eq!(shard.part_label(), "00003");
        Ok(())
    }

    #[test]
    fn test_names_use_literal_suffix_removal() -> anyhow::Result<()> {
        // Trailing letters that also occur in the suffix must survive.
        let schema = schema_identity(Path::new("lms.chemas-schema.sql"))?;
        assert_eq!(schema.database, "lms");
        assert_eq!(schema.table, "chemas");

        let table = table_identity(Path::new("sql.qls.sql"))?;
        assert_eq!(table.database, "sql");
        assert_eq!(table.table, "qls");

        assert_eq!(database_name(Path::new("schema-schema-create.sql"))?, "schema");
        Ok(())
    }

    #[test]
    fn test_table_name_needs_two_segments() {
        let err = table_identity(Path::new("orphan.sql")).unwrap_err();
        assert!(matches!(err, RestoreError::MalformedFileName { .. }));
        assert!(schema_identity(Path::new(".t-schema.sql")).is_err());
    }
}
