//! Diagnostic utilities
//!
//! - Allocation ledger (what patterns retain)
//! - Process memory probe (what the OS reports)
//! - Collection hook (run between the two samples of an iteration)

pub mod collector;
pub mod memory;
pub mod probe;

pub use collector::{Collector, LedgerCollector};
pub use memory::{global_ledger, AllocationLedger, LedgerSnapshot};
pub use probe::{MemoryProbe, PsProbe};
