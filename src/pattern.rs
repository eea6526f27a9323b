//! Allocation pattern catalog
//!
//! Each pattern changes one variable relative to its neighbours
//! (materialize vs discard, accumulate vs drop, row iteration vs an
//! independent loop, buffered vs streaming fetch), so comparing memory curves
//! across adjacent ids attributes retention to a single operation.

use crate::error::{LeakprobeError, Result};
use std::fmt;
use std::str::FromStr;

/// Iterations of the patterns that loop independently of the result
pub const FIXED_LOOP_COUNT: usize = 50_000;

/// Ten-character literal appended by patterns 6 and 16
pub const SHORT_LITERAL: &str = "aaaaaaaaaa";

/// Interned symbol appended by pattern 7
pub const SYMBOL_LITERAL: &str = "aaaaaaaaaa";

/// Repetitions of `SHORT_LITERAL` in pattern 16's large string
pub const LARGE_STRING_REPEAT: usize = 1000;

/// How a pattern fetches rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    /// No query is run
    None,
    /// Whole result materialized before the strategy runs
    Buffered,
    /// Rows delivered one at a time through a callback
    Streaming,
}

/// Retention class observed for a pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retention {
    Leak,
    NoLeak,
    SlowLeak,
}

impl fmt::Display for Retention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Retention::Leak => "leak",
            Retention::NoLeak => "no leak",
            Retention::SlowLeak => "slow leak",
        };
        f.write_str(label)
    }
}

/// One materialization strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pattern {
    /// 0: push each row's extracted values
    PushRowValues,
    /// 1: iterate, do nothing
    IterateOnly,
    /// 2: push an empty mapping per row
    PushMapPerRow,
    /// 3: push 50000 empty mappings, no iteration
    PushMapsWithoutQuery,
    /// 4: push the null sentinel per row
    PushNilPerRow,
    /// 5: push `result[index]` for index 0..50000
    PushIndexedRows,
    /// 6: push a fresh string per row
    PushStringPerRow,
    /// 7: push an interned symbol per row
    PushSymbolPerRow,
    /// 8: create an empty mapping per row and discard it
    DiscardMapPerRow,
    /// 9: push a mapping per row, block value is null
    PushMapReturnNil,
    /// 10: push a mapping into a per-row local sequence
    LocalSequencePerRow,
    /// 11: as 2, then clear the accumulator
    PushMapThenClear,
    /// 12: push 50000 mappings, then iterate doing nothing
    PushMapsBeforeIterate,
    /// 13: as 2, then clear the result set
    PushMapThenClearResult,
    /// 14: streaming, push a mapping per row
    StreamPushMap,
    /// 15: streaming, push extracted values per row
    StreamPushRowValues,
    /// 16: push `(index, large string)` for index 0..50000, no query
    PushLargeTuples,
    /// Empty identifier: no query, no work
    Noop,
}

impl Pattern {
    /// Every pattern, in id order with `Noop` last
    pub const ALL: [Pattern; 18] = [
        Pattern::PushRowValues,
        Pattern::IterateOnly,
        Pattern::PushMapPerRow,
        Pattern::PushMapsWithoutQuery,
        Pattern::PushNilPerRow,
        Pattern::PushIndexedRows,
        Pattern::PushStringPerRow,
        Pattern::PushSymbolPerRow,
        Pattern::DiscardMapPerRow,
        Pattern::PushMapReturnNil,
        Pattern::LocalSequencePerRow,
        Pattern::PushMapThenClear,
        Pattern::PushMapsBeforeIterate,
        Pattern::PushMapThenClearResult,
        Pattern::StreamPushMap,
        Pattern::StreamPushRowValues,
        Pattern::PushLargeTuples,
        Pattern::Noop,
    ];

    /// Parse an operator-supplied identifier
    pub fn from_id(id: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.id() == id)
            .ok_or_else(|| LeakprobeError::UnsupportedPattern(id.to_string()))
    }

    /// Catalog identifier (`""` for `Noop`)
    pub fn id(&self) -> &'static str {
        match self {
            Pattern::PushRowValues => "0",
            Pattern::IterateOnly => "1",
            Pattern::PushMapPerRow => "2",
            Pattern::PushMapsWithoutQuery => "3",
            Pattern::PushNilPerRow => "4",
            Pattern::PushIndexedRows => "5",
            Pattern::PushStringPerRow => "6",
            Pattern::PushSymbolPerRow => "7",
            Pattern::DiscardMapPerRow => "8",
            Pattern::PushMapReturnNil => "9",
            Pattern::LocalSequencePerRow => "10",
            Pattern::PushMapThenClear => "11",
            Pattern::PushMapsBeforeIterate => "12",
            Pattern::PushMapThenClearResult => "13",
            Pattern::StreamPushMap => "14",
            Pattern::StreamPushRowValues => "15",
            Pattern::PushLargeTuples => "16",
            Pattern::Noop => "",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Pattern::PushRowValues => "iterate rows, push each row's values",
            Pattern::IterateOnly => "iterate rows, do nothing",
            Pattern::PushMapPerRow => "iterate rows, push an empty mapping",
            Pattern::PushMapsWithoutQuery => "loop 50000 times, push an empty mapping",
            Pattern::PushNilPerRow => "iterate rows, push nil",
            Pattern::PushIndexedRows => "loop index 0..50000, push result[index]",
            Pattern::PushStringPerRow => "iterate rows, push a fresh string",
            Pattern::PushSymbolPerRow => "iterate rows, push an interned symbol",
            Pattern::DiscardMapPerRow => "iterate rows, create and discard an empty mapping",
            Pattern::PushMapReturnNil => "iterate rows, push an empty mapping, block returns nil",
            Pattern::LocalSequencePerRow => "iterate rows, push a mapping into a local sequence",
            Pattern::PushMapThenClear => "as 2, then clear the accumulator",
            Pattern::PushMapsBeforeIterate => "push 50000 mappings, then iterate doing nothing",
            Pattern::PushMapThenClearResult => "as 2, then clear the result set",
            Pattern::StreamPushMap => "stream rows, push an empty mapping",
            Pattern::StreamPushRowValues => "stream rows, push each row's values",
            Pattern::PushLargeTuples => "loop index 0..50000, push (index, large string)",
            Pattern::Noop => "do nothing",
        }
    }

    pub fn query_mode(&self) -> QueryMode {
        match self {
            Pattern::PushMapsWithoutQuery | Pattern::PushLargeTuples | Pattern::Noop => {
                QueryMode::None
            }
            Pattern::StreamPushMap | Pattern::StreamPushRowValues => QueryMode::Streaming,
            _ => QueryMode::Buffered,
        }
    }

    /// Retention class this pattern reproduces against the leaky client
    pub fn expected_retention(&self) -> Retention {
        match self {
            Pattern::PushRowValues
            | Pattern::PushMapPerRow
            | Pattern::PushIndexedRows
            | Pattern::PushStringPerRow
            | Pattern::PushMapReturnNil
            | Pattern::PushMapThenClear
            | Pattern::PushMapThenClearResult
            | Pattern::StreamPushRowValues => Retention::Leak,
            Pattern::PushMapsBeforeIterate => Retention::SlowLeak,
            Pattern::IterateOnly
            | Pattern::PushMapsWithoutQuery
            | Pattern::PushNilPerRow
            | Pattern::PushSymbolPerRow
            | Pattern::DiscardMapPerRow
            | Pattern::LocalSequencePerRow
            | Pattern::StreamPushMap
            | Pattern::PushLargeTuples
            | Pattern::Noop => Retention::NoLeak,
        }
    }
}

impl FromStr for Pattern {
    type Err = LeakprobeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_id(s)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}
