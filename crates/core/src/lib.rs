//! Core types and traits for Tablekeep
//!
//! This crate defines the foundational types used throughout the system:
//! - Record: one archive element (an entity, or an empty-table marker)
//! - TypedValue / EdmType: archived property values and their type tags
//! - Entity / EntityKey / PropertyValue: the native, typed entity model
//! - DeleteBatch: a validated single-partition group of delete operations
//! - TableStore: async abstraction over the destination table store
//! - InMemoryTableStore: a complete in-process store implementation
//! - Error types for store calls, batches and value conversion
//! - Testing: an instrumented store wrapper with fault injection

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod batch;
pub mod entity;
pub mod error;
pub mod memory;
pub mod record;
pub mod store;
pub mod testing;
pub mod value;

pub use batch::{DeleteBatch, MAX_BATCH_OPERATIONS};
pub use entity::{Entity, EntityKey, PARTITION_KEY, ROW_KEY};
pub use error::{
    BatchError, BatchResult, ConversionError, ConversionResult, StoreError, StoreResult,
};
pub use memory::{InMemoryTableStore, DEFAULT_PAGE_SIZE};
pub use record::{ArchivedEntity, Record};
pub use store::{ContinuationToken, Page, Projection, TableStore};
pub use value::{EdmType, PropertyValue, TypedValue};
