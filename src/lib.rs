//! Leakprobe - result-set memory retention harness
//!
//! Reproduces and classifies how a database client library retains memory
//! while result sets are iterated. Two entry points share this crate:
//! - **Provisioner** (`leakprobe-setup`): builds a table of large rows
//! - **Sampler** (`leakprobe`): runs one allocation pattern per iteration
//!   and prints the process resident-memory percentage around a collection
//!   point, so growth curves can be compared across patterns
//!
//! # Architecture
//!
//! - **Pattern**: the closed catalog of materialization strategies
//! - **Dispatcher**: runs one pattern on a fresh connection
//! - **Sampler**: the Active/Idle loop around the dispatcher
//! - **Storage**: connection traits and the SQLite backend
//! - **Diagnostics**: allocation ledger, memory probe, collection hook
//!
//! # Example
//!
//! ```ignore
//! use leakprobe_core::{global_ledger, select_query, Dispatcher, Pattern, SqliteConnector};
//!
//! let connector = SqliteConnector::new("leakprobe.db", global_ledger().clone());
//! let dispatcher = Dispatcher::new(
//!     &connector,
//!     global_ledger().clone(),
//!     select_query("test_pg_mem_leak", 50_000),
//! );
//! dispatcher.run_once(Pattern::StreamPushMap)?;
//! ```

pub mod accumulator;
pub mod config;
pub mod diagnostics;
pub mod dispatcher;
pub mod error;
pub mod logging;
pub mod pattern;
pub mod provisioner;
pub mod sampler;
pub mod storage;

// Re-export commonly used types
pub use accumulator::{Accumulator, Item};
pub use config::HarnessConfig;
pub use diagnostics::{
    global_ledger, AllocationLedger, Collector, LedgerCollector, LedgerSnapshot, MemoryProbe,
    PsProbe,
};
pub use dispatcher::{select_query, DispatchReport, Dispatcher};
pub use error::{LeakprobeError, Result};
pub use logging::init_tracing;
pub use pattern::{Pattern, QueryMode, Retention};
pub use provisioner::Provisioner;
pub use sampler::{LoopState, Sampler, SamplerOptions};
pub use storage::{sqlite::SqliteConnector, Connection, Connector, ResultSet, Row, ScopedConnection};
