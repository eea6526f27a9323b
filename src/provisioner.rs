//! Table provisioning
//!
//! Drops and recreates the fixed table, then fills it with identical large
//! rows. Every statement (and every insert batch) gets its own connection.

use crate::config::{validate_identifier, ProvisionerSettings};
use crate::error::{LeakprobeError, Result};
use crate::storage::{Connector, ScopedConnection};
use std::io::Write;
use tracing::{debug, info};

/// Filler unit repeated to build each row's value
pub const FILLER_UNIT: &str = "aaaaaaaaaa";

/// Repetitions of `FILLER_UNIT` per row (10,000 characters)
pub const FILLER_REPEAT: usize = 1000;

/// The value every inserted row carries
pub fn filler() -> String {
    FILLER_UNIT.repeat(FILLER_REPEAT)
}

/// Creates and populates the target table
pub struct Provisioner<'a> {
    connector: &'a dyn Connector,
    table: String,
    filler: String,
}

impl<'a> Provisioner<'a> {
    pub fn new(connector: &'a dyn Connector, table: &str) -> Result<Self> {
        validate_identifier(table)?;
        Ok(Self {
            connector,
            table: table.to_string(),
            filler: filler(),
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Remove the table; a missing table is not an error
    pub fn drop_table(&self) -> Result<()> {
        self.execute(&format!("DROP TABLE IF EXISTS {};", self.table))
    }

    pub fn create_table(&self) -> Result<()> {
        self.execute(&format!(
            "CREATE TABLE {} (id INTEGER PRIMARY KEY AUTOINCREMENT, value VARCHAR(65535));",
            self.table
        ))
    }

    /// Insert `total` rows, `batch_size` per transaction, a final short batch
    /// taking any remainder. Returns the number of rows inserted.
    pub fn insert_records(&self, total: usize, batch_size: usize) -> Result<usize> {
        if batch_size == 0 {
            return Err(LeakprobeError::InvalidOperation(
                "batch size must be positive".to_string(),
            ));
        }

        let full_batches = total / batch_size;
        let remainder = total % batch_size;
        let batches = std::iter::repeat(batch_size)
            .take(full_batches)
            .chain((remainder > 0).then_some(remainder));

        let mut inserted = 0;
        for (idx, rows) in batches.enumerate() {
            self.execute(&self.insert_statement(rows))?;
            inserted += rows;
            debug!(
                batch = idx + 1,
                rows,
                inserted,
                total,
                "Inserted batch into {}",
                self.table
            );
        }

        Ok(inserted)
    }

    /// `BEGIN; INSERT ... VALUES (...),(...); COMMIT;` for `rows` rows
    pub fn insert_statement(&self, rows: usize) -> String {
        let tuple = format!("('{}')", self.filler);
        let mut sql = String::with_capacity(64 + rows * (tuple.len() + 1));
        sql.push_str("BEGIN; INSERT INTO ");
        sql.push_str(&self.table);
        sql.push_str(" (value) VALUES ");
        for idx in 0..rows {
            if idx > 0 {
                sql.push(',');
            }
            sql.push_str(&tuple);
        }
        sql.push_str("; COMMIT;");
        sql
    }

    /// Drop, create and populate, printing progress lines to `out`
    pub fn run<W: Write>(&self, settings: &ProvisionerSettings, out: &mut W) -> Result<usize> {
        writeln!(out, "Dropping {} table if exists", self.table)?;
        self.drop_table()?;

        writeln!(out, "Creating {} table", self.table)?;
        self.create_table()?;

        writeln!(
            out,
            "Inserting {} records to {}",
            settings.total_records, self.table
        )?;
        let inserted = self.insert_records(settings.total_records, settings.records_per_batch)?;

        info!(inserted, table = %self.table, "Provisioning complete");
        Ok(inserted)
    }

    fn execute(&self, sql: &str) -> Result<()> {
        let mut conn = ScopedConnection::open(self.connector)?;
        conn.execute(sql)?;
        conn.close()
    }
}
