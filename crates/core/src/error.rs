//! Error types for Tablekeep core
//!
//! Three families live here:
//! - [`StoreError`]: any failure reported by a destination store call
//! - [`BatchError`]: an attempt to build an invalid delete batch
//! - [`ConversionError`]: an archived value that does not fit its type tag
//!
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.

use crate::entity::EntityKey;
use crate::value::EdmType;
use thiserror::Error;

/// Result type alias for store calls
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Result type alias for delete batch construction
pub type BatchResult<T> = std::result::Result<T, BatchError>;

/// Result type alias for value conversion
pub type ConversionResult<T> = std::result::Result<T, ConversionError>;

/// Errors reported by a [`TableStore`](crate::TableStore)
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    /// The table does not exist
    #[error("Table not found: {0}")]
    TableNotFound(String),

    /// An entity addressed by a delete does not exist
    #[error("Entity {key} not found in table {table}")]
    EntityNotFound {
        /// Table that was addressed
        table: String,
        /// Missing entity key
        key: EntityKey,
    },

    /// An insert collided with an existing entity
    #[error("Entity {key} already exists in table {table}")]
    EntityAlreadyExists {
        /// Table that was addressed
        table: String,
        /// Colliding entity key
        key: EntityKey,
    },

    /// The store rejected a batch
    #[error("Invalid batch: {0}")]
    InvalidBatch(#[from] BatchError),

    /// A continuation token could not be decoded
    #[error("Invalid continuation token: {0}")]
    InvalidContinuation(String),

    /// The store could not be reached or refused service
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A failure injected by the testing harness
    #[error("Injected failure: {0}")]
    Injected(String),

    /// Any other store-side failure
    #[error("Store error: {0}")]
    Other(String),
}

impl StoreError {
    /// Create a table-not-found error
    pub fn table_not_found(table: impl Into<String>) -> Self {
        Self::TableNotFound(table.into())
    }

    /// Create an unavailable error
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Create a generic store error
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create an invalid continuation error
    pub fn invalid_continuation(msg: impl Into<String>) -> Self {
        Self::InvalidContinuation(msg.into())
    }
}

/// Errors raised while building a [`DeleteBatch`](crate::DeleteBatch)
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BatchError {
    /// The batch already holds the maximum number of operations
    #[error("Batch is full ({limit} operations)")]
    Full {
        /// The per-batch ceiling
        limit: usize,
    },

    /// The key belongs to a different partition than the batch
    #[error("Partition key mismatch: batch holds '{expected}', got '{actual}'")]
    PartitionMismatch {
        /// Partition key of the batch
        expected: String,
        /// Partition key of the rejected operation
        actual: String,
    },

    /// A batch must hold at least one operation
    #[error("Batch must contain at least one operation")]
    Empty,
}

/// Errors raised while converting archived values to native values
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConversionError {
    /// The JSON value does not fit the type tag
    #[error("Invalid {expected} value: {reason}")]
    InvalidValue {
        /// Type the tag asked for
        expected: EdmType,
        /// What was wrong with the value
        reason: String,
    },

    /// A property failed to convert
    #[error("Property '{property}': {source}")]
    Property {
        /// Name of the failing property
        property: String,
        /// Underlying conversion failure
        #[source]
        source: Box<ConversionError>,
    },

    /// PartitionKey or RowKey is missing from the entity
    #[error("Missing key property '{0}'")]
    MissingKey(&'static str),

    /// PartitionKey or RowKey does not hold a string
    #[error("Key property '{0}' must be a string")]
    KeyNotString(&'static str),
}

impl ConversionError {
    /// Create an invalid value error
    pub fn invalid(expected: EdmType, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            expected,
            reason: reason.into(),
        }
    }

    /// Attach a property name to this error
    pub fn for_property(self, property: impl Into<String>) -> Self {
        Self::Property {
            property: property.into(),
            source: Box::new(self),
        }
    }
}
