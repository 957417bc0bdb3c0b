//! Testing utilities for store consumers
//!
//! This module provides tools for exercising code that talks to a
//! [`TableStore`](crate::TableStore):
//!
//! - **Call log**: every call is recorded when it starts and when it finishes
//! - **Concurrency tracking**: peak number of concurrently outstanding calls
//! - **Latency injection**: randomized per-call delay to force interleavings
//! - **Fault injection**: fail, stall or panic calls matching a predicate
//!
//! # Example
//!
//! ```ignore
//! use tablekeep_core::testing::{InstrumentedStore, StoreCall};
//! use tablekeep_core::InMemoryTableStore;
//!
//! let store = InstrumentedStore::new(InMemoryTableStore::new())
//!     .with_latency(Duration::from_millis(1), Duration::from_millis(5));
//! store.fail_when(|call| matches!(call, StoreCall::Insert { table, .. } if table == "Orders"));
//! ```

mod instrumented;

pub use instrumented::{CallPhase, InstrumentedStore, StoreCall, StoreEvent};
