//! Delete batches
//!
//! A table store executes a batch atomically only if every operation shares
//! one partition key and the batch holds at most [`MAX_BATCH_OPERATIONS`]
//! operations. [`DeleteBatch`] enforces both at construction time: an invalid
//! batch cannot be built.

use crate::entity::EntityKey;
use crate::error::{BatchError, BatchResult};

/// Per-batch operation ceiling imposed by the store
pub const MAX_BATCH_OPERATIONS: usize = 100;

/// A group of 1 to 100 delete operations sharing one partition key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteBatch {
    partition_key: String,
    row_keys: Vec<String>,
}

impl DeleteBatch {
    /// Start a batch with its first operation
    pub fn starting_with(key: EntityKey) -> Self {
        Self {
            partition_key: key.partition_key,
            row_keys: vec![key.row_key],
        }
    }

    /// Build a batch from a partition key and its row keys
    pub fn from_row_keys(
        partition_key: impl Into<String>,
        row_keys: Vec<String>,
    ) -> BatchResult<Self> {
        if row_keys.is_empty() {
            return Err(BatchError::Empty);
        }
        if row_keys.len() > MAX_BATCH_OPERATIONS {
            return Err(BatchError::Full {
                limit: MAX_BATCH_OPERATIONS,
            });
        }
        Ok(Self {
            partition_key: partition_key.into(),
            row_keys,
        })
    }

    /// Add a delete operation
    ///
    /// Fails when the batch is full or the key is from another partition.
    pub fn push(&mut self, key: EntityKey) -> BatchResult<()> {
        if key.partition_key != self.partition_key {
            return Err(BatchError::PartitionMismatch {
                expected: self.partition_key.clone(),
                actual: key.partition_key,
            });
        }
        if self.is_full() {
            return Err(BatchError::Full {
                limit: MAX_BATCH_OPERATIONS,
            });
        }
        self.row_keys.push(key.row_key);
        Ok(())
    }

    /// The shared partition key
    pub fn partition_key(&self) -> &str {
        &self.partition_key
    }

    /// Row keys in insertion order
    pub fn row_keys(&self) -> &[String] {
        &self.row_keys
    }

    /// Full keys of every operation
    pub fn keys(&self) -> impl Iterator<Item = EntityKey> + '_ {
        self.row_keys
            .iter()
            .map(|rk| EntityKey::new(self.partition_key.clone(), rk.clone()))
    }

    /// Number of operations
    pub fn len(&self) -> usize {
        self.row_keys.len()
    }

    /// Always false for a constructed batch
    pub fn is_empty(&self) -> bool {
        self.row_keys.is_empty()
    }

    /// Whether another operation would exceed the ceiling
    pub fn is_full(&self) -> bool {
        self.row_keys.len() >= MAX_BATCH_OPERATIONS
    }
}
