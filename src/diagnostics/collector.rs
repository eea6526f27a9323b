//! Collection hook run once per sampler iteration
//!
//! Rust releases memory when owners drop, so there is no collector to force.
//! The hook is the point where a run observes what survived the iteration.

use crate::diagnostics::memory::AllocationLedger;
use crate::error::Result;
use tracing::debug;

/// Hook invoked after each dispatch (or in place of it once idle)
#[cfg_attr(test, mockall::automock)]
pub trait Collector {
    fn collect(&self) -> Result<()>;
}

/// Logs the allocation ledger at each collection point
#[derive(Clone)]
pub struct LedgerCollector {
    ledger: AllocationLedger,
}

impl LedgerCollector {
    pub fn new(ledger: AllocationLedger) -> Self {
        Self { ledger }
    }
}

impl Collector for LedgerCollector {
    fn collect(&self) -> Result<()> {
        debug!("Collection point reached");
        self.ledger.log_statistics();
        Ok(())
    }
}
