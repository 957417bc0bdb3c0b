//! Tablekeep - streaming backup and restore for partitioned table stores
//!
//! A backup is a compressed JSON array of records, one per entity plus one
//! marker per empty table. A restore replays that archive into a table
//! store with full-replace semantics: every archived table is created if
//! needed and emptied before its first entity is inserted, and destination
//! tables the archive does not name are deleted at the end.
//!
//! # Quick Start
//!
//! ```ignore
//! use tablekeep::{InMemoryTableStore, RestoreConfig, Restorer};
//!
//! let restorer = Restorer::new(InMemoryTableStore::new(), RestoreConfig::default())?;
//! let summary = restorer.restore_from_file("backup.json.gz").await?;
//! println!("{} entities restored", summary.total_entities);
//! ```
//!
//! # Architecture
//!
//! - `tablekeep-core`: data model, the [`TableStore`] trait, the in-memory store
//! - `tablekeep-archive`: archive reader and writer
//! - `tablekeep-engine`: restore pipeline, backup crawl, configuration

pub use tablekeep_archive::{
    ArchiveError, ArchiveReader, ArchiveResult, ArchiveWriter, Compression, WriteOptions,
};
pub use tablekeep_core::testing;
pub use tablekeep_core::{
    ArchivedEntity, BatchError, ContinuationToken, ConversionError, DeleteBatch, EdmType, Entity,
    EntityKey, InMemoryTableStore, Page, Projection, PropertyValue, Record, StoreError,
    StoreResult, TableStore, TypedValue, MAX_BATCH_OPERATIONS,
};
pub use tablekeep_engine::{
    backup, backup_to_file, BackupConfig, BackupError, BackupResult, BackupSummary, ConfigError,
    Fault, RestoreConfig, RestoreError, RestoreFailure, RestoreResult, RestoreSummary, Restorer,
    TablekeepConfig, ThrottledStore, CONFIG_FILE_NAME, DEFAULT_CONCURRENCY,
};
