//! Restore session: bookkeeping, fault aggregation and completion
//!
//! One [`RestoreSession`] lives for the duration of one restore and is owned
//! by the orchestrator alone. Workers never touch it; they return a
//! [`RecordOutcome`] that the orchestrator settles here, so counter updates
//! and the completion check happen in one place, in order.

use crate::deleter::ClearStats;
use crate::error::{Fault, RestoreFailure};
use crate::gate::FlowController;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::warn;

/// Counts reported by a restore
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RestoreSummary {
    /// Entities restored per archived table, including empty tables
    pub tables: BTreeMap<String, u64>,
    /// Sum of `tables`
    pub total_entities: u64,
    /// Destination tables deleted because the archive did not name them
    pub deleted_tables: usize,
    /// Pre-existing entities removed while clearing tables
    pub cleared_entities: u64,
}

/// What processing one record produced
#[derive(Debug, Clone, PartialEq)]
pub struct RecordOutcome {
    /// Table of the record
    pub table: String,
    /// Whether this record was the first of its table
    pub first_of_table: bool,
    /// Whether an entity was inserted
    pub inserted: bool,
    /// Result of clearing the table, for the first record of a table
    pub cleared: Option<ClearStats>,
    /// Fault raised while processing, if any
    pub fault: Option<Fault>,
}

impl RecordOutcome {
    /// Outcome of a record that has not done anything yet
    pub fn new(table: impl Into<String>, first_of_table: bool) -> Self {
        Self {
            table: table.into(),
            first_of_table,
            inserted: false,
            cleared: None,
            fault: None,
        }
    }
}

/// State of one restore
#[derive(Debug)]
pub struct RestoreSession {
    restored: BTreeMap<String, u64>,
    cleared_entities: u64,
    deleted_tables: usize,
    faults: Vec<Fault>,
    stream_ended: bool,
    flow: FlowController,
    finalized: bool,
}

impl RestoreSession {
    /// Start a session with the given concurrency ceiling
    pub fn new(concurrency: usize) -> Self {
        Self {
            restored: BTreeMap::new(),
            cleared_entities: 0,
            deleted_tables: 0,
            faults: Vec::new(),
            stream_ended: false,
            flow: FlowController::new(concurrency),
            finalized: false,
        }
    }

    /// Admit a pulled record; returns whether it is the first of its table
    ///
    /// The table's count entry is created here, before the table is cleared,
    /// and marks the table as seen.
    pub fn admit(&mut self, table: &str) -> bool {
        let first = !self.restored.contains_key(table);
        if first {
            self.restored.insert(table.to_string(), 0);
        }
        self.flow.admit(first);
        first
    }

    /// Settle a finished record
    pub fn settle(&mut self, outcome: RecordOutcome) {
        if outcome.inserted {
            *self.restored.entry(outcome.table).or_insert(0) += 1;
        }
        if let Some(stats) = outcome.cleared {
            self.cleared_entities += stats.deleted;
        }
        if let Some(fault) = outcome.fault {
            self.record_fault(fault);
        }
        self.flow.settle(outcome.first_of_table);
    }

    /// Append a fault and close admission
    pub fn record_fault(&mut self, fault: Fault) {
        warn!(
            target: "tablekeep::restore",
            stage = fault.stage(),
            table = fault.table().unwrap_or(""),
            error = %fault,
            "Restore fault"
        );
        self.faults.push(fault);
        self.flow.close();
    }

    /// Mark the archive as fully read
    pub fn end_stream(&mut self) {
        self.stream_ended = true;
    }

    /// Count tables deleted during reconciliation
    pub fn record_deleted_tables(&mut self, count: usize) {
        self.deleted_tables += count;
    }

    /// Whether the next record may be pulled
    pub fn can_admit(&self) -> bool {
        !self.stream_ended && self.flow.is_open()
    }

    /// Records admitted and not yet settled
    pub fn in_flight(&self) -> usize {
        self.flow.in_flight()
    }

    /// Whether the whole archive was read
    pub fn stream_ended(&self) -> bool {
        self.stream_ended
    }

    /// Whether a fault closed admission
    pub fn admission_closed(&self) -> bool {
        self.flow.is_closed()
    }

    /// Faults recorded so far
    pub fn faults(&self) -> &[Fault] {
        &self.faults
    }

    /// Tables seen so far, with their restored counts
    pub fn restored_counts(&self) -> &BTreeMap<String, u64> {
        &self.restored
    }

    /// Nothing is in flight and nothing more will be admitted
    pub fn is_drained(&self) -> bool {
        self.in_flight() == 0 && (self.stream_ended || self.flow.is_closed())
    }

    /// Counts so far
    pub fn summary(&self) -> RestoreSummary {
        RestoreSummary {
            tables: self.restored.clone(),
            total_entities: self.restored.values().sum(),
            deleted_tables: self.deleted_tables,
            cleared_entities: self.cleared_entities,
        }
    }

    /// Produce the result, once
    ///
    /// Returns `None` while work is outstanding, and on every call after the
    /// first one that returned a result.
    pub fn finalize(&mut self) -> Option<Result<RestoreSummary, RestoreFailure>> {
        if self.finalized || !self.is_drained() {
            return None;
        }
        self.finalized = true;
        let summary = self.summary();
        if self.faults.is_empty() {
            Some(Ok(summary))
        } else {
            Some(Err(RestoreFailure {
                faults: std::mem::take(&mut self.faults),
                partial: summary,
            }))
        }
    }
}
