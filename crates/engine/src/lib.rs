//! Restore and backup engine for Tablekeep
//!
//! This crate drives a restore end to end:
//! - Restorer: the orchestrator and its entry points
//! - FlowController: admission gate (concurrency ceiling, new-table pause,
//!   close on first fault)
//! - Lifecycle: create-and-clear on first sight of a table, reconciliation of
//!   the destination's table set at the end
//! - Deleter: paged, partition-grouped delete batches
//! - Writer: archived entity to typed insert
//! - RestoreSession: counts, fault aggregation, single completion
//! - ThrottledStore: ceiling on outstanding store calls
//!
//! It also holds the sequential backup crawl and the `tablekeep.toml`
//! configuration.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backup;
pub mod config;
pub mod deleter;
pub mod error;
pub mod gate;
pub mod lifecycle;
pub mod pipeline;
pub mod session;
pub mod throttle;
pub mod writer;

pub use backup::{backup, backup_to_file, BackupSummary};
pub use config::{BackupConfig, RestoreConfig, TablekeepConfig, CONFIG_FILE_NAME, DEFAULT_CONCURRENCY};
pub use deleter::{clear_table, plan_batches, ClearStats};
pub use error::{
    BackupError, BackupResult, ConfigError, ConfigResult, Fault, RestoreError, RestoreFailure,
    RestoreResult,
};
pub use gate::FlowController;
pub use lifecycle::{prepare_table, reconcile_tables, Reconciliation};
pub use pipeline::Restorer;
pub use session::{RecordOutcome, RestoreSession, RestoreSummary};
pub use throttle::ThrottledStore;
pub use writer::write_entity;
