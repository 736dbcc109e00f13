//! Execution engines a table can be synced between

use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

use super::error::SyncError;

/// Alias used when another database file is attached for a copy.
const ATTACH_ALIAS: &str = "floe_src";

/// A `schema.table` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    pub schema: String,
    pub table: String,
}

impl TableRef {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
        }
    }

    /// `schema.table`, the key used for locks and the ledger.
    pub fn id(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }
}

impl std::fmt::Display for TableRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

/// One side of a sync.
pub trait Engine: Send + Sync {
    /// Identifier recorded in the ledger (e.g. "local").
    fn name(&self) -> &str;

    fn row_count(&self, table: &TableRef) -> Result<u64, SyncError>;

    /// File another engine can attach to read this engine's tables directly.
    /// `None` forces the staged copy path.
    fn attach_location(&self) -> Option<PathBuf>;

    /// Replace `table` with the same table read from the attached file.
    fn copy_from_attached(&self, source: &Path, table: &TableRef) -> Result<(), SyncError>;

    /// Write `table` into a standalone staging file.
    fn export_table(&self, table: &TableRef, staging: &Path) -> Result<(), SyncError>;

    /// Replace `table` with the contents of a staging file.
    fn import_table(&self, table: &TableRef, staging: &Path) -> Result<(), SyncError>;
}

/// SQLite-backed engine. SQLite has no schemas inside one file, so
/// `schema.table` is stored as `schema__table` (or `table` for `main`).
pub struct SqliteEngine {
    name: String,
    path: Option<PathBuf>,
    conn: Mutex<Connection>,
}

impl SqliteEngine {
    pub fn open(name: impl Into<String>, path: impl AsRef<Path>) -> Result<Self, SyncError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let name = name.into();
        let conn = Connection::open(&path).map_err(|e| SyncError::engine(&name, e.to_string()))?;
        Ok(Self {
            name,
            path: Some(path),
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory(name: impl Into<String>) -> Result<Self, SyncError> {
        let name = name.into();
        let conn = Connection::open_in_memory().map_err(|e| SyncError::engine(&name, e.to_string()))?;
        Ok(Self {
            name,
            path: None,
            conn: Mutex::new(conn),
        })
    }

    /// Run raw statements against this engine.
    pub fn execute_batch(&self, sql: &str) -> Result<(), SyncError> {
        self.lock()?
            .execute_batch(sql)
            .map_err(|e| self.fail(e))
    }

    /// Name the table is stored under inside the SQLite file.
    pub fn storage_name(table: &TableRef) -> String {
        if table.schema.eq_ignore_ascii_case("main") {
            table.table.clone()
        } else {
            format!("{}__{}", table.schema, table.table)
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SyncError> {
        self.conn
            .lock()
            .map_err(|_| SyncError::engine(&self.name, "connection lock poisoned"))
    }

    fn fail(&self, err: rusqlite::Error) -> SyncError {
        SyncError::engine(&self.name, err.to_string())
    }

    /// Attach `file`, run `statements` in one transaction, then detach
    /// whether or not the statements succeeded.
    fn with_attached(&self, file: &Path, statements: &[String]) -> Result<(), SyncError> {
        let mut conn = self.lock()?;
        let location = file.to_string_lossy().into_owned();
        conn.execute(
            &format!("ATTACH DATABASE ?1 AS {}", ATTACH_ALIAS),
            [location.as_str()],
        )
            .map_err(|e| self.fail(e))?;

        let outcome = (|| {
            let tx = conn.transaction()?;
            for statement in statements {
                tx.execute(statement, [])?;
            }
            tx.commit()
        })();

        let detached = conn.execute(&format!("DETACH DATABASE {}", ATTACH_ALIAS), []);
        outcome.map_err(|e| self.fail(e))?;
        detached.map_err(|e| self.fail(e))?;
        Ok(())
    }
}

fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Statements that replace `target_db.name` with a copy of `source_db.name`.
fn replace_statements(target_db: &str, source_db: &str, name: &str) -> Vec<String> {
    let name = quote(name);
    vec![
        format!("DROP TABLE IF EXISTS {}.{}", target_db, name),
        format!(
            "CREATE TABLE {}.{} AS SELECT * FROM {}.{}",
            target_db, name, source_db, name
        ),
    ]
}

impl Engine for SqliteEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn row_count(&self, table: &TableRef) -> Result<u64, SyncError> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote(&Self::storage_name(table)));
        let count: i64 = self
            .lock()?
            .query_row(&sql, [], |row| row.get(0))
            .map_err(|e| self.fail(e))?;
        Ok(count.max(0) as u64)
    }

    fn attach_location(&self) -> Option<PathBuf> {
        self.path.clone()
    }

    fn copy_from_attached(&self, source: &Path, table: &TableRef) -> Result<(), SyncError> {
        debug!(engine = %self.name, table = %table, source = %source.display(), "Direct copy");
        let statements = replace_statements("main", ATTACH_ALIAS, &Self::storage_name(table));
        self.with_attached(source, &statements)
    }

    fn export_table(&self, table: &TableRef, staging: &Path) -> Result<(), SyncError> {
        debug!(engine = %self.name, table = %table, staging = %staging.display(), "Exporting");
        let statements = replace_statements(ATTACH_ALIAS, "main", &Self::storage_name(table));
        self.with_attached(staging, &statements)
    }

    fn import_table(&self, table: &TableRef, staging: &Path) -> Result<(), SyncError> {
        debug!(engine = %self.name, table = %table, staging = %staging.display(), "Importing");
        let statements = replace_statements("main", ATTACH_ALIAS, &Self::storage_name(table));
        self.with_attached(staging, &statements)
    }
}
