//! Common test fakes
//!
//! `FakeClient` stands in for a client library with result-buffer retention
//! problems. Its heap follows three rules, driven by the allocation ledger
//! the dispatcher records into:
//!
//! 1. A buffered result set is pinned (never freed) when the caller retains
//!    an allocation while a row cursor over it is open: between `rows()` and
//!    the end of that iteration, or between the first positional `get` and
//!    the result set being dropped.
//! 2. Opening a row cursor while the caller already holds live allocations
//!    leaves `RESIDUE_PER_ALLOCATION` bytes per allocation behind for good.
//! 3. A streamed row's buffer is pinned when data copied out of that row is
//!    retained by the callback.
//!
//! Everything else is freed by `FakeHeap::collect`.

#![allow(dead_code)]

use leakprobe_core::error::{LeakprobeError, Result};
use leakprobe_core::{AllocationLedger, Collector, Connection, Connector, MemoryProbe, ResultSet, Row};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Bytes left behind per live allocation when a cursor opens (rule 2)
pub const RESIDUE_PER_ALLOCATION: u64 = 8;

struct Buffer {
    bytes: u64,
    reachable: bool,
    pinned: bool,
}

#[derive(Default)]
struct HeapState {
    buffers: Vec<Buffer>,
    residue: u64,
}

/// Simulated client-library heap
#[derive(Clone, Default)]
pub struct FakeHeap {
    state: Rc<RefCell<HeapState>>,
}

impl FakeHeap {
    fn allocate(&self, bytes: u64) -> usize {
        let mut state = self.state.borrow_mut();
        state.buffers.push(Buffer {
            bytes,
            reachable: true,
            pinned: false,
        });
        state.buffers.len() - 1
    }

    fn pin(&self, id: usize) {
        self.state.borrow_mut().buffers[id].pinned = true;
    }

    fn release(&self, id: usize) {
        self.state.borrow_mut().buffers[id].reachable = false;
    }

    /// Explicit release: frees the bytes now unless pinned
    fn clear(&self, id: usize) {
        let mut state = self.state.borrow_mut();
        let buffer = &mut state.buffers[id];
        if !buffer.pinned {
            buffer.bytes = 0;
        }
    }

    fn add_residue(&self, bytes: u64) {
        self.state.borrow_mut().residue += bytes;
    }

    /// Free every unreachable, unpinned buffer
    pub fn collect(&self) {
        let mut state = self.state.borrow_mut();
        for buffer in state.buffers.iter_mut() {
            if !buffer.reachable && !buffer.pinned {
                buffer.bytes = 0;
            }
        }
    }

    /// Bytes still held by the heap
    pub fn resident(&self) -> u64 {
        let state = self.state.borrow();
        state.buffers.iter().map(|b| b.bytes).sum::<u64>() + state.residue
    }
}

/// Shared call counters
#[derive(Default)]
pub struct Calls {
    pub opens: Cell<usize>,
    pub closes: Cell<usize>,
    pub buffered: Cell<usize>,
    pub streaming: Cell<usize>,
    pub executed: RefCell<Vec<String>>,
}

fn bump(cell: &Cell<usize>) {
    cell.set(cell.get() + 1);
}

/// Fake client library connector
#[derive(Clone)]
pub struct FakeClient {
    pub heap: FakeHeap,
    pub ledger: AllocationLedger,
    pub calls: Rc<Calls>,
    pub rows: usize,
    pub row_bytes: u64,
    /// Streaming fails after delivering this many rows
    pub stream_fail_after: Option<usize>,
    /// Buffered iteration panics at this row
    pub panic_at_row: Option<usize>,
}

impl FakeClient {
    pub fn new(ledger: &AllocationLedger, rows: usize, row_bytes: u64) -> Self {
        Self {
            heap: FakeHeap::default(),
            ledger: ledger.clone(),
            calls: Rc::new(Calls::default()),
            rows,
            row_bytes,
            stream_fail_after: None,
            panic_at_row: None,
        }
    }

    /// Bytes one buffered result occupies
    pub fn buffer_bytes(&self) -> u64 {
        self.rows as u64 * self.row_bytes
    }

    fn make_rows(&self) -> Vec<Row> {
        (0..self.rows)
            .map(|i| Row::new(vec![Some((i + 1).to_string()), Some("aaaaaaaaaa".to_string())]))
            .collect()
    }
}

impl Connector for FakeClient {
    fn open(&self) -> Result<Box<dyn Connection>> {
        bump(&self.calls.opens);
        Ok(Box::new(FakeConnection {
            client: self.clone(),
        }))
    }
}

pub struct FakeConnection {
    client: FakeClient,
}

impl Connection for FakeConnection {
    fn execute(&mut self, sql: &str) -> Result<()> {
        self.client.calls.executed.borrow_mut().push(sql.to_string());
        Ok(())
    }

    fn execute_buffered(&mut self, _sql: &str) -> Result<Box<dyn ResultSet>> {
        bump(&self.client.calls.buffered);
        let id = self.client.heap.allocate(self.client.buffer_bytes());
        Ok(Box::new(FakeResultSet {
            id,
            rows: self.client.make_rows(),
            heap: self.client.heap.clone(),
            ledger: self.client.ledger.clone(),
            index_mark: Cell::new(None),
            panic_at_row: self.client.panic_at_row,
        }))
    }

    fn execute_streaming(
        &mut self,
        _sql: &str,
        on_row: &mut dyn FnMut(Row) -> Result<()>,
    ) -> Result<usize> {
        bump(&self.client.calls.streaming);
        let mut delivered = 0;
        for row in self.client.make_rows() {
            if self.client.stream_fail_after == Some(delivered) {
                return Err(LeakprobeError::Database("connection reset".to_string()));
            }

            let id = self.client.heap.allocate(self.client.row_bytes);
            let copied_before = self.client.ledger.snapshot().row_derived_bytes;
            on_row(row)?;
            if self.client.ledger.snapshot().row_derived_bytes > copied_before {
                self.client.heap.pin(id);
            }
            self.client.heap.release(id);
            delivered += 1;
        }
        Ok(delivered)
    }

    fn close(&mut self) -> Result<()> {
        bump(&self.client.calls.closes);
        Ok(())
    }
}

pub struct FakeResultSet {
    id: usize,
    rows: Vec<Row>,
    heap: FakeHeap,
    ledger: AllocationLedger,
    index_mark: Cell<Option<u64>>,
    panic_at_row: Option<usize>,
}

impl FakeResultSet {
    fn open_cursor(&self) -> u64 {
        let snapshot = self.ledger.snapshot();
        self.heap
            .add_residue(snapshot.allocation_count as u64 * RESIDUE_PER_ALLOCATION);
        snapshot.total_allocated
    }
}

impl ResultSet for FakeResultSet {
    fn len(&self) -> usize {
        self.rows.len()
    }

    fn get(&self, index: usize) -> Option<Row> {
        if self.index_mark.get().is_none() {
            self.index_mark.set(Some(self.open_cursor()));
        }
        self.rows.get(index).cloned()
    }

    fn rows(&self) -> Box<dyn Iterator<Item = Row> + '_> {
        let mark = self.open_cursor();
        Box::new(Cursor {
            inner: self.rows.iter(),
            position: 0,
            mark,
            owner: self,
        })
    }

    fn clear(&mut self) {
        self.heap.clear(self.id);
        self.rows.clear();
    }
}

impl Drop for FakeResultSet {
    fn drop(&mut self) {
        if let Some(mark) = self.index_mark.get() {
            if self.ledger.snapshot().total_allocated > mark {
                self.heap.pin(self.id);
            }
        }
        self.heap.release(self.id);
    }
}

/// Row cursor; pins its result set on drop if anything was retained
struct Cursor<'a> {
    inner: std::slice::Iter<'a, Row>,
    position: usize,
    mark: u64,
    owner: &'a FakeResultSet,
}

impl Iterator for Cursor<'_> {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        if self.owner.panic_at_row == Some(self.position) {
            panic!("client library crashed at row {}", self.position);
        }
        self.position += 1;
        self.inner.next().cloned()
    }
}

impl Drop for Cursor<'_> {
    fn drop(&mut self) {
        if self.owner.ledger.snapshot().total_allocated > self.mark {
            self.owner.heap.pin(self.owner.id);
        }
    }
}

/// Collector that runs the fake heap's collection
pub struct HeapCollector {
    pub heap: FakeHeap,
    pub runs: Cell<usize>,
}

impl HeapCollector {
    pub fn new(heap: &FakeHeap) -> Self {
        Self {
            heap: heap.clone(),
            runs: Cell::new(0),
        }
    }
}

impl Collector for HeapCollector {
    fn collect(&self) -> Result<()> {
        bump(&self.runs);
        self.heap.collect();
        Ok(())
    }
}

/// Probe reporting the fake heap plus the ledger, in bytes
pub struct HeapProbe {
    pub heap: FakeHeap,
    pub ledger: AllocationLedger,
}

impl MemoryProbe for HeapProbe {
    fn resident_percent(&self) -> Result<String> {
        let bytes = self.heap.resident() + self.ledger.snapshot().current_usage;
        Ok(bytes.to_string())
    }
}
