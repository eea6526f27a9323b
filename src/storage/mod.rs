//! Database collaborator interface
//!
//! The harness only needs a handful of capabilities from a client library:
//! open a connection, run a statement, run a query either buffered (whole
//! result materialized) or streaming (one row at a time), close. Buffered and
//! streaming execution are separate methods because their retention
//! behaviour is what patterns 14 and 15 compare.

pub mod sqlite;

use crate::error::Result;
use std::ops::{Deref, DerefMut};
use tracing::{debug, warn};

/// One result row, column values in select order (`None` for SQL NULL)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    values: Vec<Option<String>>,
}

impl Row {
    pub fn new(values: Vec<Option<String>>) -> Self {
        Self { values }
    }

    /// Copy the column values out of the row
    pub fn values(&self) -> Vec<Option<String>> {
        self.values.clone()
    }

    pub fn get(&self, column: usize) -> Option<&str> {
        self.values.get(column).and_then(|v| v.as_deref())
    }

    pub fn column_count(&self) -> usize {
        self.values.len()
    }

    /// Bytes of text held by the row
    pub fn byte_len(&self) -> usize {
        self.values
            .iter()
            .map(|v| v.as_ref().map_or(0, String::len))
            .sum()
    }
}

/// Fully materialized query result
pub trait ResultSet {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Positional access; `None` past the end
    fn get(&self, index: usize) -> Option<Row>;

    /// Iterate rows in order
    fn rows(&self) -> Box<dyn Iterator<Item = Row> + '_>;

    /// Release the buffered rows explicitly
    fn clear(&mut self);
}

/// An open connection
pub trait Connection {
    /// Run one or more statements, discarding any result
    fn execute(&mut self, sql: &str) -> Result<()>;

    /// Run a query and buffer the whole result
    fn execute_buffered(&mut self, sql: &str) -> Result<Box<dyn ResultSet>>;

    /// Run a query, handing each row to `on_row` as it is read.
    /// Returns the number of rows delivered.
    fn execute_streaming(
        &mut self,
        sql: &str,
        on_row: &mut dyn FnMut(Row) -> Result<()>,
    ) -> Result<usize>;

    fn close(&mut self) -> Result<()>;
}

/// Opens connections from fixed settings
pub trait Connector {
    fn open(&self) -> Result<Box<dyn Connection>>;
}

/// Connection closed exactly once, on every exit path
///
/// `close` reports the close error; dropping without `close` (early return,
/// panic) closes and logs.
pub struct ScopedConnection {
    inner: Box<dyn Connection>,
    closed: bool,
}

impl ScopedConnection {
    pub fn open(connector: &dyn Connector) -> Result<Self> {
        let inner = connector.open()?;
        debug!("Connection opened");
        Ok(Self {
            inner,
            closed: false,
        })
    }

    pub fn close(mut self) -> Result<()> {
        self.closed = true;
        self.inner.close()
    }
}

impl Deref for ScopedConnection {
    type Target = dyn Connection;

    fn deref(&self) -> &Self::Target {
        self.inner.as_ref()
    }
}

impl DerefMut for ScopedConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.inner.as_mut()
    }
}

impl Drop for ScopedConnection {
    fn drop(&mut self) {
        if !self.closed {
            self.closed = true;
            if let Err(e) = self.inner.close() {
                warn!("Failed to close connection: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LeakprobeError;
    use std::cell::Cell;
    use std::rc::Rc;

    struct CountingConnection {
        closes: Rc<Cell<usize>>,
    }

    impl Connection for CountingConnection {
        fn execute(&mut self, _sql: &str) -> Result<()> {
            Err(LeakprobeError::Database("refused".to_string()))
        }

        fn execute_buffered(&mut self, _sql: &str) -> Result<Box<dyn ResultSet>> {
            Err(LeakprobeError::Database("refused".to_string()))
        }

        fn execute_streaming(
            &mut self,
            _sql: &str,
            _on_row: &mut dyn FnMut(Row) -> Result<()>,
        ) -> Result<usize> {
            Ok(0)
        }

        fn close(&mut self) -> Result<()> {
            self.closes.set(self.closes.get() + 1);
            Ok(())
        }
    }

    struct CountingConnector {
        closes: Rc<Cell<usize>>,
    }

    impl Connector for CountingConnector {
        fn open(&self) -> Result<Box<dyn Connection>> {
            Ok(Box::new(CountingConnection {
                closes: self.closes.clone(),
            }))
        }
    }

    #[test]
    fn test_explicit_close_runs_once() {
        let closes = Rc::new(Cell::new(0));
        let connector = CountingConnector {
            closes: closes.clone(),
        };

        let conn = ScopedConnection::open(&connector).unwrap();
        conn.close().unwrap();
        assert_eq!(closes.get(), 1);
    }

    #[test]
    fn test_drop_closes_after_error() {
        let closes = Rc::new(Cell::new(0));
        let connector = CountingConnector {
            closes: closes.clone(),
        };

        let run = || -> Result<()> {
            let mut conn = ScopedConnection::open(&connector)?;
            conn.execute("SELECT 1")?;
            conn.close()
        };

        assert!(run().is_err());
        assert_eq!(closes.get(), 1);
    }

    #[test]
    fn test_row_accessors() {
        let row = Row::new(vec![Some("1".to_string()), None, Some("abc".to_string())]);
        assert_eq!(row.column_count(), 3);
        assert_eq!(row.get(0), Some("1"));
        assert_eq!(row.get(1), None);
        assert_eq!(row.get(7), None);
        assert_eq!(row.byte_len(), 4);
        assert_eq!(row.values()[2].as_deref(), Some("abc"));
    }
}
