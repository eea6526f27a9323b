//! SQLite backend using rusqlite
//!
//! Each `open` creates a fresh connection to the database file; nothing is
//! pooled, so every dispatch and every provisioning batch pays for its own
//! connection just like the harness expects.

use crate::diagnostics::memory::AllocationLedger;
use crate::error::{LeakprobeError, Result};
use crate::storage::{Connection, Connector, ResultSet, Row};
use rusqlite::types::ValueRef;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Opens SQLite connections to one database file
pub struct SqliteConnector {
    path: PathBuf,
    ledger: AllocationLedger,
}

impl SqliteConnector {
    /// # Arguments
    /// * `path` - SQLite database file (created on first open)
    /// * `ledger` - counts open connections and live result sets
    pub fn new<P: AsRef<Path>>(path: P, ledger: AllocationLedger) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            ledger,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Connector for SqliteConnector {
    fn open(&self) -> Result<Box<dyn Connection>> {
        let conn = rusqlite::Connection::open(&self.path)?;
        conn.busy_timeout(Duration::from_secs(30))?;
        self.ledger.increment_db_connections();
        debug!("Opened SQLite connection: {}", self.path.display());

        Ok(Box::new(SqliteConnection {
            conn: Some(conn),
            ledger: self.ledger.clone(),
        }))
    }
}

/// Single SQLite connection
pub struct SqliteConnection {
    conn: Option<rusqlite::Connection>,
    ledger: AllocationLedger,
}

impl SqliteConnection {
    fn handle(&self) -> Result<&rusqlite::Connection> {
        self.conn
            .as_ref()
            .ok_or_else(|| LeakprobeError::Database("connection already closed".to_string()))
    }
}

/// Convert the current row into text columns
fn read_row(row: &rusqlite::Row<'_>, columns: usize) -> rusqlite::Result<Row> {
    let mut values = Vec::with_capacity(columns);
    for idx in 0..columns {
        let value = match row.get_ref(idx)? {
            ValueRef::Null => None,
            ValueRef::Integer(i) => Some(i.to_string()),
            ValueRef::Real(f) => Some(f.to_string()),
            ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
                Some(String::from_utf8_lossy(bytes).into_owned())
            }
        };
        values.push(value);
    }
    Ok(Row::new(values))
}

impl Connection for SqliteConnection {
    fn execute(&mut self, sql: &str) -> Result<()> {
        self.handle()?.execute_batch(sql)?;
        Ok(())
    }

    fn execute_buffered(&mut self, sql: &str) -> Result<Box<dyn ResultSet>> {
        let conn = self.handle()?;
        let mut stmt = conn.prepare(sql)?;
        let columns = stmt.column_count();
        let rows = stmt
            .query_map([], |row| read_row(row, columns))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        debug!("Buffered {} rows", rows.len());
        Ok(Box::new(SqliteResultSet::new(rows, self.ledger.clone())))
    }

    fn execute_streaming(
        &mut self,
        sql: &str,
        on_row: &mut dyn FnMut(Row) -> Result<()>,
    ) -> Result<usize> {
        let conn = self.handle()?;
        let mut stmt = conn.prepare(sql)?;
        let columns = stmt.column_count();
        let mut rows = stmt.query([])?;

        let mut delivered = 0;
        while let Some(row) = rows.next()? {
            on_row(read_row(row, columns)?)?;
            delivered += 1;
        }

        debug!("Streamed {} rows", delivered);
        Ok(delivered)
    }

    fn close(&mut self) -> Result<()> {
        match self.conn.take() {
            Some(conn) => {
                self.ledger.decrement_db_connections();
                conn.close().map_err(|(_, e)| LeakprobeError::Sqlite(e))
            }
            None => Ok(()),
        }
    }
}

/// Buffered rows held in memory until cleared or dropped
pub struct SqliteResultSet {
    rows: Vec<Row>,
    ledger: AllocationLedger,
}

impl SqliteResultSet {
    fn new(rows: Vec<Row>, ledger: AllocationLedger) -> Self {
        ledger.increment_result_sets();
        Self { rows, ledger }
    }
}

impl ResultSet for SqliteResultSet {
    fn len(&self) -> usize {
        self.rows.len()
    }

    fn get(&self, index: usize) -> Option<Row> {
        self.rows.get(index).cloned()
    }

    fn rows(&self) -> Box<dyn Iterator<Item = Row> + '_> {
        Box::new(self.rows.iter().cloned())
    }

    fn clear(&mut self) {
        self.rows = Vec::new();
    }
}

impl Drop for SqliteResultSet {
    fn drop(&mut self) {
        self.ledger.decrement_result_sets();
    }
}
