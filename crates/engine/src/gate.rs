//! Flow controller
//!
//! Decides whether the next record may be pulled from the archive. The gate
//! is a counting gate with two independent hold reasons:
//!
//! - **ceiling**: set when admitting a record brings the in-flight count to
//!   the concurrency ceiling, released once the count drops below it again
//! - **table**: one hold per in-flight record that was the first of its
//!   table, released when that record settles
//!
//! Pulls resume only when no hold of either kind remains. Closing the gate
//! (after the first fault) is permanent; in-flight records still settle.

use tracing::debug;

/// Admission gate between the archive and the record workers
#[derive(Debug, Clone)]
pub struct FlowController {
    ceiling: usize,
    in_flight: usize,
    ceiling_hold: bool,
    table_holds: usize,
    closed: bool,
}

impl FlowController {
    /// Create an open gate with the given ceiling (at least 1)
    pub fn new(ceiling: usize) -> Self {
        Self {
            ceiling: ceiling.max(1),
            in_flight: 0,
            ceiling_hold: false,
            table_holds: 0,
            closed: false,
        }
    }

    /// Whether the next record may be pulled
    pub fn is_open(&self) -> bool {
        !self.closed && self.holds() == 0
    }

    /// Whether admission was closed by a fault
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Records admitted and not yet settled
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Active hold reasons
    pub fn holds(&self) -> usize {
        usize::from(self.ceiling_hold) + self.table_holds
    }

    /// Configured ceiling
    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// Account for a pulled record, before it starts processing
    pub fn admit(&mut self, first_of_table: bool) {
        self.in_flight += 1;
        if self.in_flight >= self.ceiling && !self.ceiling_hold {
            self.ceiling_hold = true;
            debug!(target: "tablekeep::restore", in_flight = self.in_flight, "Pausing: concurrency ceiling reached");
        }
        if first_of_table {
            self.table_holds += 1;
            debug!(target: "tablekeep::restore", holds = self.holds(), "Pausing: clearing new table");
        }
    }

    /// Account for a record that finished, successfully or not
    pub fn settle(&mut self, first_of_table: bool) {
        let was_open = self.is_open();
        self.in_flight = self.in_flight.saturating_sub(1);
        if first_of_table {
            self.table_holds = self.table_holds.saturating_sub(1);
        }
        if self.ceiling_hold && self.in_flight < self.ceiling {
            self.ceiling_hold = false;
        }
        if !was_open && self.is_open() {
            debug!(target: "tablekeep::restore", in_flight = self.in_flight, "Resuming");
        }
    }

    /// Stop admitting records for good
    pub fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            debug!(target: "tablekeep::restore", in_flight = self.in_flight, "Admission closed; draining");
        }
    }
}
