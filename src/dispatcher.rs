//! Pattern dispatcher
//!
//! `run_once` opens one connection, performs exactly one strategy from the
//! catalog, drops everything it built, and closes the connection on every
//! exit path.

use crate::accumulator::{Accumulator, Item};
use crate::diagnostics::memory::AllocationLedger;
use crate::error::{LeakprobeError, Result};
use crate::pattern::{
    Pattern, FIXED_LOOP_COUNT, LARGE_STRING_REPEAT, SHORT_LITERAL, SYMBOL_LITERAL,
};
use crate::storage::{Connector, ScopedConnection};
use std::hint::black_box;
use tracing::{debug, warn};

/// The select every query-driven pattern runs
pub fn select_query(table: &str, row_limit: u64) -> String {
    format!("SELECT * FROM {} LIMIT {}", table, row_limit)
}

/// What one dispatch did, for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    pub pattern: Pattern,
    /// Rows visited (iterated, indexed or streamed)
    pub rows: usize,
    /// Items held by the accumulator when the strategy finished
    pub retained: usize,
}

/// Runs catalog patterns against one connector
pub struct Dispatcher<'a> {
    connector: &'a dyn Connector,
    ledger: AllocationLedger,
    query: String,
    loop_count: usize,
}

impl<'a> Dispatcher<'a> {
    pub fn new(connector: &'a dyn Connector, ledger: AllocationLedger, query: String) -> Self {
        Self {
            connector,
            ledger,
            query,
            loop_count: FIXED_LOOP_COUNT,
        }
    }

    /// Override the iteration count of the result-independent loops
    pub fn with_loop_count(mut self, loop_count: usize) -> Self {
        self.loop_count = loop_count;
        self
    }

    pub fn ledger(&self) -> &AllocationLedger {
        &self.ledger
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// Parse `id` and dispatch it. Unknown ids fail before any connection
    /// is opened.
    pub fn run_id(&self, id: &str) -> Result<DispatchReport> {
        let pattern = Pattern::from_id(id)?;
        self.run_once(pattern)
    }

    pub fn run_once(&self, pattern: Pattern) -> Result<DispatchReport> {
        debug!(pattern = %pattern, "Dispatching: {}", pattern.description());

        let mut conn = ScopedConnection::open(self.connector)?;
        let outcome = self.apply(pattern, &mut conn);
        let closed = conn.close();

        let report = match outcome {
            Ok(report) => report,
            Err(e) => {
                if let Err(close_err) = closed {
                    warn!(pattern = %pattern, "Failed to close connection: {}", close_err);
                }
                return Err(e);
            }
        };
        closed?;

        debug!(
            pattern = %pattern,
            rows = report.rows,
            retained = report.retained,
            "Dispatch finished"
        );
        Ok(report)
    }

    fn apply(&self, pattern: Pattern, conn: &mut ScopedConnection) -> Result<DispatchReport> {
        let mut acc = Accumulator::new(&self.ledger);
        let mut rows = 0;

        match pattern {
            Pattern::PushRowValues => {
                let result = conn.execute_buffered(&self.query)?;
                for row in result.rows() {
                    rows += 1;
                    acc.push(Item::Values(row.values()));
                }
            }
            Pattern::IterateOnly => {
                let result = conn.execute_buffered(&self.query)?;
                for _row in result.rows() {
                    rows += 1;
                }
            }
            Pattern::PushMapPerRow => {
                let result = conn.execute_buffered(&self.query)?;
                for _row in result.rows() {
                    rows += 1;
                    acc.push(Item::empty_map());
                }
            }
            Pattern::PushMapsWithoutQuery => {
                for _ in 0..self.loop_count {
                    acc.push(Item::empty_map());
                }
            }
            Pattern::PushNilPerRow => {
                let result = conn.execute_buffered(&self.query)?;
                for _row in result.rows() {
                    rows += 1;
                    acc.push(Item::Nil);
                }
            }
            Pattern::PushIndexedRows => {
                let result = conn.execute_buffered(&self.query)?;
                for index in 0..self.loop_count {
                    let row = result.get(index).ok_or(LeakprobeError::IndexOutOfRange {
                        index,
                        len: result.len(),
                    })?;
                    rows += 1;
                    acc.push(Item::Row(row));
                }
            }
            Pattern::PushStringPerRow => {
                let result = conn.execute_buffered(&self.query)?;
                for _row in result.rows() {
                    rows += 1;
                    acc.push(Item::Str(SHORT_LITERAL.to_string()));
                }
            }
            Pattern::PushSymbolPerRow => {
                let result = conn.execute_buffered(&self.query)?;
                for _row in result.rows() {
                    rows += 1;
                    acc.push(Item::Symbol(SYMBOL_LITERAL));
                }
            }
            Pattern::DiscardMapPerRow => {
                let result = conn.execute_buffered(&self.query)?;
                for _row in result.rows() {
                    rows += 1;
                    black_box(Item::empty_map());
                }
            }
            Pattern::PushMapReturnNil => {
                let result = conn.execute_buffered(&self.query)?;
                for _row in result.rows() {
                    rows += 1;
                    // block value is null, not the accumulator
                    let value: Option<&Accumulator> = {
                        acc.push(Item::empty_map());
                        None
                    };
                    black_box(value);
                }
            }
            Pattern::LocalSequencePerRow => {
                let result = conn.execute_buffered(&self.query)?;
                for _row in result.rows() {
                    rows += 1;
                    let mut local = Vec::with_capacity(1);
                    local.push(Item::empty_map());
                    black_box(local);
                }
            }
            Pattern::PushMapThenClear => {
                let result = conn.execute_buffered(&self.query)?;
                for _row in result.rows() {
                    rows += 1;
                    acc.push(Item::empty_map());
                }
                acc.clear();
            }
            Pattern::PushMapsBeforeIterate => {
                let result = conn.execute_buffered(&self.query)?;
                for _ in 0..self.loop_count {
                    acc.push(Item::empty_map());
                }
                for _row in result.rows() {
                    rows += 1;
                }
            }
            Pattern::PushMapThenClearResult => {
                let mut result = conn.execute_buffered(&self.query)?;
                for _row in result.rows() {
                    rows += 1;
                    acc.push(Item::empty_map());
                }
                result.clear();
            }
            Pattern::StreamPushMap => {
                rows = conn.execute_streaming(&self.query, &mut |_row| {
                    acc.push(Item::empty_map());
                    Ok(())
                })?;
            }
            Pattern::StreamPushRowValues => {
                rows = conn.execute_streaming(&self.query, &mut |row| {
                    acc.push(Item::Values(row.values()));
                    Ok(())
                })?;
            }
            Pattern::PushLargeTuples => {
                for index in 0..self.loop_count {
                    acc.push(Item::Pair(index, SHORT_LITERAL.repeat(LARGE_STRING_REPEAT)));
                }
            }
            Pattern::Noop => {}
        }

        Ok(DispatchReport {
            pattern,
            rows,
            retained: acc.len(),
        })
    }
}
