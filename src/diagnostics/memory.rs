//! Allocation ledger
//!
//! Counts the objects patterns retain so a run can be compared against the
//! process-level metric. Tests use the ledger as the allocator the fake
//! client library observes.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::info;

/// Allocation counters (thread-safe, cheap to clone)
#[derive(Clone)]
pub struct AllocationLedger {
    /// Total bytes allocated (cumulative)
    pub total_allocated: Arc<AtomicU64>,

    /// Current bytes in use
    pub current_usage: Arc<AtomicU64>,

    /// Peak memory usage
    pub peak_usage: Arc<AtomicU64>,

    /// Number of live allocations
    pub allocation_count: Arc<AtomicUsize>,

    /// Bytes copied out of row data (cumulative)
    pub row_derived_bytes: Arc<AtomicU64>,

    /// Open database connections
    pub db_connections: Arc<AtomicUsize>,

    /// Live result sets
    pub result_sets: Arc<AtomicUsize>,
}

impl Default for AllocationLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl AllocationLedger {
    pub fn new() -> Self {
        Self {
            total_allocated: Arc::new(AtomicU64::new(0)),
            current_usage: Arc::new(AtomicU64::new(0)),
            peak_usage: Arc::new(AtomicU64::new(0)),
            allocation_count: Arc::new(AtomicUsize::new(0)),
            row_derived_bytes: Arc::new(AtomicU64::new(0)),
            db_connections: Arc::new(AtomicUsize::new(0)),
            result_sets: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Record an allocation
    pub fn record_allocation(&self, bytes: u64) {
        self.total_allocated.fetch_add(bytes, Ordering::Relaxed);
        let current = self.current_usage.fetch_add(bytes, Ordering::Relaxed) + bytes;
        self.allocation_count.fetch_add(1, Ordering::Relaxed);

        // Update peak if needed
        let mut peak = self.peak_usage.load(Ordering::Relaxed);
        while current > peak {
            match self.peak_usage.compare_exchange_weak(
                peak,
                current,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(p) => peak = p,
            }
        }
    }

    /// Record a deallocation
    pub fn record_deallocation(&self, bytes: u64) {
        self.current_usage.fetch_sub(bytes, Ordering::Relaxed);
        self.allocation_count.fetch_sub(1, Ordering::Relaxed);
    }

    /// Record bytes copied out of a row
    pub fn record_row_copy(&self, bytes: u64) {
        self.row_derived_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn increment_db_connections(&self) {
        self.db_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decrement_db_connections(&self) {
        self.db_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn increment_result_sets(&self) {
        self.result_sets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decrement_result_sets(&self) {
        self.result_sets.fetch_sub(1, Ordering::Relaxed);
    }

    /// Get current statistics snapshot
    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            total_allocated: self.total_allocated.load(Ordering::Relaxed),
            current_usage: self.current_usage.load(Ordering::Relaxed),
            peak_usage: self.peak_usage.load(Ordering::Relaxed),
            allocation_count: self.allocation_count.load(Ordering::Relaxed),
            row_derived_bytes: self.row_derived_bytes.load(Ordering::Relaxed),
            db_connections: self.db_connections.load(Ordering::Relaxed),
            result_sets: self.result_sets.load(Ordering::Relaxed),
        }
    }

    /// Log current ledger statistics
    pub fn log_statistics(&self) {
        let snapshot = self.snapshot();
        info!(
            current_kb = snapshot.current_usage / 1024,
            peak_kb = snapshot.peak_usage / 1024,
            allocations = snapshot.allocation_count,
            row_copies_kb = snapshot.row_derived_bytes / 1024,
            db_conns = snapshot.db_connections,
            result_sets = snapshot.result_sets,
            "Allocation ledger"
        );
    }
}

/// Ledger counters at one point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub total_allocated: u64,
    pub current_usage: u64,
    pub peak_usage: u64,
    pub allocation_count: usize,
    pub row_derived_bytes: u64,
    pub db_connections: usize,
    pub result_sets: usize,
}

/// `key:value` pairs, one line
impl fmt::Display for LedgerSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "total_allocated:{} current:{} peak:{} live:{} row_copies:{} conns:{} result_sets:{}",
            self.total_allocated,
            self.current_usage,
            self.peak_usage,
            self.allocation_count,
            self.row_derived_bytes,
            self.db_connections,
            self.result_sets,
        )
    }
}

/// Global ledger instance
static ALLOCATION_LEDGER: once_cell::sync::Lazy<AllocationLedger> =
    once_cell::sync::Lazy::new(AllocationLedger::new);

/// Get the global allocation ledger
pub fn global_ledger() -> &'static AllocationLedger {
    &ALLOCATION_LEDGER
}
