//! Error types for restore and backup
//!
//! A restore distinguishes two kinds of failure:
//!
//! - [`Fault`]: one failed store call or one unconvertible record. Faults are
//!   collected; they stop new records from being admitted but never abort
//!   work that is already running.
//! - [`RestoreError`]: the operation-level outcome. `Stream` is returned as
//!   soon as the archive cannot be read; `Aggregate` carries every fault once
//!   the pipeline has drained.

use crate::session::RestoreSummary;
use std::fmt;
use std::io;
use std::path::PathBuf;
use tablekeep_archive::ArchiveError;
use tablekeep_core::{ConversionError, EntityKey, StoreError};
use thiserror::Error;

/// Result type for restore operations
pub type RestoreResult<T> = Result<T, RestoreError>;

/// Result type for backup operations
pub type BackupResult<T> = Result<T, BackupError>;

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Faults
// =============================================================================

/// A recorded, non-fatal failure
#[derive(Debug, Clone, Error, PartialEq)]
pub enum Fault {
    /// Creating an archived table failed
    #[error("failed to create table '{table}': {source}")]
    CreateTable {
        /// Table name
        table: String,
        /// Store failure
        #[source]
        source: StoreError,
    },

    /// Clearing a table's existing entities failed
    #[error("failed to clear table '{table}': {source}")]
    ClearTable {
        /// Table name
        table: String,
        /// Store failure
        #[source]
        source: StoreError,
    },

    /// An archived entity could not be converted to a typed entity
    #[error("invalid entity {} in table '{table}': {source}", fmt_key(.key))]
    Convert {
        /// Table name
        table: String,
        /// Entity key, when both keys are strings
        key: Option<EntityKey>,
        /// Conversion failure
        #[source]
        source: ConversionError,
    },

    /// Inserting an entity failed
    #[error("failed to insert {key} into '{table}': {source}")]
    Insert {
        /// Table name
        table: String,
        /// Entity key
        key: EntityKey,
        /// Store failure
        #[source]
        source: StoreError,
    },

    /// Enumerating destination tables failed
    #[error("failed to list tables: {source}")]
    ListTables {
        /// Store failure
        #[source]
        source: StoreError,
    },

    /// Deleting a table absent from the archive failed
    #[error("failed to delete table '{table}': {source}")]
    DeleteTable {
        /// Table name
        table: String,
        /// Store failure
        #[source]
        source: StoreError,
    },
}

fn fmt_key(key: &Option<EntityKey>) -> String {
    match key {
        Some(key) => key.to_string(),
        None => "(unknown key)".to_string(),
    }
}

impl Fault {
    /// Table the fault belongs to, if any
    pub fn table(&self) -> Option<&str> {
        match self {
            Fault::CreateTable { table, .. }
            | Fault::ClearTable { table, .. }
            | Fault::Convert { table, .. }
            | Fault::Insert { table, .. }
            | Fault::DeleteTable { table, .. } => Some(table),
            Fault::ListTables { .. } => None,
        }
    }

    /// Underlying store error, if the fault came from a store call
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            Fault::CreateTable { source, .. }
            | Fault::ClearTable { source, .. }
            | Fault::Insert { source, .. }
            | Fault::ListTables { source }
            | Fault::DeleteTable { source, .. } => Some(source),
            Fault::Convert { .. } => None,
        }
    }

    /// Short stage name used in logs
    pub fn stage(&self) -> &'static str {
        match self {
            Fault::CreateTable { .. } => "create_table",
            Fault::ClearTable { .. } => "clear_table",
            Fault::Convert { .. } => "convert",
            Fault::Insert { .. } => "insert",
            Fault::ListTables { .. } => "list_tables",
            Fault::DeleteTable { .. } => "delete_table",
        }
    }
}

// =============================================================================
// Restore failure
// =============================================================================

/// Every fault recorded by a restore, with the work that did succeed
#[derive(Debug, Clone, PartialEq)]
pub struct RestoreFailure {
    /// Faults in the order they were recorded
    pub faults: Vec<Fault>,
    /// Counts for the records that were restored
    pub partial: RestoreSummary,
}

impl fmt::Display for RestoreFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "restore failed with {} fault(s)", self.faults.len())?;
        if let Some(first) = self.faults.first() {
            write!(f, "; first: {}", first)?;
        }
        Ok(())
    }
}

impl std::error::Error for RestoreFailure {}

/// Operation-level restore error
#[derive(Debug, Error)]
pub enum RestoreError {
    /// The archive could not be decoded; the restore stopped immediately
    #[error("archive stream failed: {0}")]
    Stream(#[from] ArchiveError),

    /// The pipeline drained with one or more recorded faults
    #[error("{0}")]
    Aggregate(RestoreFailure),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The archive file could not be opened
    #[error("failed to open archive '{path}': {source}")]
    Io {
        /// Archive path
        path: PathBuf,
        /// I/O failure
        #[source]
        source: io::Error,
    },

    /// A worker task panicked or was cancelled
    #[error("restore worker failed: {0}")]
    WorkerPanicked(String),
}

impl RestoreError {
    /// Recorded faults, for an `Aggregate` failure
    pub fn faults(&self) -> &[Fault] {
        match self {
            RestoreError::Aggregate(failure) => &failure.faults,
            _ => &[],
        }
    }

    /// Whether this is a stream-level (immediately fatal) failure
    pub fn is_stream_fault(&self) -> bool {
        matches!(self, RestoreError::Stream(_))
    }
}

// =============================================================================
// Backup
// =============================================================================

/// Backup error
///
/// A backup is sequential, so the first failure ends it.
#[derive(Debug, Error)]
pub enum BackupError {
    /// Enumerating tables failed
    #[error("failed to list tables: {0}")]
    ListTables(#[source] StoreError),

    /// Querying a table failed
    #[error("failed to read table '{table}': {source}")]
    Query {
        /// Table name
        table: String,
        /// Store failure
        #[source]
        source: StoreError,
    },

    /// Writing the archive failed
    #[error("failed to write archive: {0}")]
    Archive(#[from] ArchiveError),

    /// The output file could not be created
    #[error("failed to create '{path}': {source}")]
    Io {
        /// Output path
        path: PathBuf,
        /// I/O failure
        #[source]
        source: io::Error,
    },

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

// =============================================================================
// Configuration
// =============================================================================

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read
    #[error("failed to read config file '{path}': {source}")]
    Read {
        /// Config path
        path: PathBuf,
        /// I/O failure
        #[source]
        source: io::Error,
    },

    /// The config text is not valid TOML for this schema
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range
    #[error("invalid config value for '{field}': {reason}")]
    Invalid {
        /// Offending field
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

impl ConfigError {
    /// Create an out-of-range error
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}
