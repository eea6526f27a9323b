//! Accumulator patterns append into
//!
//! Heap-backed items are recorded against the allocation ledger when pushed
//! and released when the accumulator is cleared or dropped. Immediates (the
//! null sentinel, interned symbols) cost nothing.

use crate::diagnostics::memory::AllocationLedger;
use crate::storage::Row;
use std::collections::HashMap;
use std::mem::size_of;

/// Something a pattern retains
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    /// Values copied out of a row
    Values(Vec<Option<String>>),
    /// Fresh empty mapping
    Map(HashMap<String, String>),
    /// Null sentinel
    Nil,
    /// Freshly allocated string
    Str(String),
    /// Interned literal, never allocated
    Symbol(&'static str),
    /// Whole row obtained by position
    Row(Row),
    /// `(index, large string)` pair
    Pair(usize, String),
}

impl Item {
    pub fn empty_map() -> Self {
        Item::Map(HashMap::new())
    }

    /// Bytes recorded against the ledger for this item
    pub fn footprint(&self) -> u64 {
        let header = size_of::<Item>();
        let bytes = match self {
            Item::Nil | Item::Symbol(_) => return 0,
            Item::Values(values) => {
                header
                    + values.capacity() * size_of::<Option<String>>()
                    + values
                        .iter()
                        .map(|v| v.as_ref().map_or(0, String::capacity))
                        .sum::<usize>()
            }
            Item::Map(map) => header + map.capacity() * size_of::<(String, String)>(),
            Item::Str(s) | Item::Pair(_, s) => header + s.capacity(),
            Item::Row(row) => header + row.byte_len(),
        };
        bytes as u64
    }

    /// Items that hold data copied out of a row
    pub fn is_row_derived(&self) -> bool {
        matches!(self, Item::Values(_) | Item::Row(_))
    }
}

/// Growing container of retained items
pub struct Accumulator {
    items: Vec<Item>,
    ledger: AllocationLedger,
}

impl Accumulator {
    pub fn new(ledger: &AllocationLedger) -> Self {
        Self {
            items: Vec::new(),
            ledger: ledger.clone(),
        }
    }

    pub fn push(&mut self, item: Item) {
        let bytes = item.footprint();
        if bytes > 0 {
            self.ledger.record_allocation(bytes);
            if item.is_row_derived() {
                self.ledger.record_row_copy(bytes);
            }
        }
        self.items.push(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Drop every item, returning their bytes to the ledger
    pub fn clear(&mut self) {
        for item in self.items.drain(..) {
            let bytes = item.footprint();
            if bytes > 0 {
                self.ledger.record_deallocation(bytes);
            }
        }
    }
}

impl Drop for Accumulator {
    fn drop(&mut self) {
        self.clear();
    }
}
