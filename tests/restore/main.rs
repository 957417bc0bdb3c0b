//! Restore Integration Tests
//!
//! End-to-end restores against the in-memory store, observed through the
//! instrumented wrapper: ordering, concurrency, batching, reconciliation,
//! fault handling and archive formats.

#[path = "../common/mod.rs"]
mod common;

mod batching;
mod compression;
mod concurrency;
mod faults;
