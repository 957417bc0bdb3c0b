//! Restore orchestrator
//!
//! A single task drives the whole restore:
//!
//! ```text
//! archive ──(blocking thread)──► channel ──► orchestrator ──spawn──► record task
//!                                  ▲               │                     │
//!                                  └── gate ◄──────┴──── RecordOutcome ◄─┘
//! ```
//!
//! The archive is decoded on a blocking thread. Records are handed over
//! through a bounded channel; the first decode error goes through a separate
//! one-shot channel that the orchestrator watches whatever the gate state, so
//! a corrupt archive ends the restore even while admission is paused or
//! closed. The orchestrator pulls the next record only while the flow
//! controller is open, spawns one task per record and settles each task's
//! outcome in its own session. A stream fault wins over settling, and
//! settling wins over admitting.
//!
//! Every store call goes through a [`ThrottledStore`], so record tasks,
//! their clear batches and reconciliation deletes together never exceed the
//! configured ceiling.

use crate::config::RestoreConfig;
use crate::error::{RestoreError, RestoreResult};
use crate::lifecycle;
use crate::session::{RecordOutcome, RestoreSession, RestoreSummary};
use crate::throttle::ThrottledStore;
use crate::writer::write_entity;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tablekeep_archive::{ArchiveError, ArchiveReader, ArchiveResult};
use tablekeep_core::{Record, TableStore};
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{info, warn};

/// Restores archives into a table store
#[derive(Debug)]
pub struct Restorer<S> {
    store: Arc<ThrottledStore<S>>,
    config: RestoreConfig,
}

impl<S: TableStore + 'static> Restorer<S> {
    /// Create a restorer; fails if the config is out of range
    pub fn new(store: S, config: RestoreConfig) -> RestoreResult<Self> {
        config.validate()?;
        let store = Arc::new(ThrottledStore::new(store, config.concurrency));
        Ok(Self { store, config })
    }

    /// Active configuration
    pub fn config(&self) -> &RestoreConfig {
        &self.config
    }

    /// Destination store
    pub fn store(&self) -> &S {
        self.store.inner()
    }

    /// Restore from an archive file
    pub async fn restore_from_file(&self, path: impl AsRef<Path>) -> RestoreResult<RestoreSummary> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| RestoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!(target: "tablekeep::restore", path = %path.display(), "Restoring archive file");
        self.restore_from_reader(file).await
    }

    /// Restore from a compressed archive stream
    pub async fn restore_from_reader<R>(&self, reader: R) -> RestoreResult<RestoreSummary>
    where
        R: Read + Send + 'static,
    {
        let compression = self.config.compression;
        self.run(move || ArchiveReader::open(reader, compression)).await
    }

    /// Restore already-decoded records
    pub async fn restore_records<I>(&self, records: I) -> RestoreResult<RestoreSummary>
    where
        I: IntoIterator<Item = Record>,
        I::IntoIter: Send + 'static,
    {
        self.restore_stream(records.into_iter().map(Ok)).await
    }

    /// Restore from a record stream that may fail part-way
    pub async fn restore_stream<I>(&self, records: I) -> RestoreResult<RestoreSummary>
    where
        I: IntoIterator<Item = ArchiveResult<Record>>,
        I::IntoIter: Send + 'static,
    {
        let records = records.into_iter();
        self.run(move || Ok(records)).await
    }

    async fn run<F, I>(&self, open: F) -> RestoreResult<RestoreSummary>
    where
        F: FnOnce() -> ArchiveResult<I> + Send + 'static,
        I: Iterator<Item = ArchiveResult<Record>> + 'static,
    {
        let started = Instant::now();
        info!(
            target: "tablekeep::restore",
            concurrency = self.config.concurrency,
            compression = self.config.compression.name(),
            "Restore started"
        );

        let (mut records, mut stream_fault, reader) = spawn_reader(open, self.config.read_ahead);
        let mut reader = Some(reader);
        let mut reader_done = false;
        let mut session = RestoreSession::new(self.config.concurrency);
        let mut tasks: JoinSet<RecordOutcome> = JoinSet::new();

        while !session.is_drained() {
            tokio::select! {
                biased;

                fault = &mut stream_fault, if !reader_done => match fault {
                    Ok(e) => return Err(abort_on_stream_fault(e)),
                    // The reader finished without a fault.
                    Err(_) => reader_done = true,
                },

                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    let outcome = joined.map_err(|e| RestoreError::WorkerPanicked(e.to_string()))?;
                    session.settle(outcome);
                }

                next = records.recv(), if session.can_admit() => match next {
                    Some(record) => {
                        let first = session.admit(&record.table);
                        tasks.spawn(process_record(Arc::clone(&self.store), record, first));
                    }
                    None => {
                        if let Some(handle) = reader.take() {
                            handle
                                .await
                                .map_err(|e| RestoreError::WorkerPanicked(e.to_string()))?;
                        }
                        session.end_stream();
                    }
                },

                else => break,
            }
        }

        // A fault the reader raised before the loop ended still decides the
        // outcome, after an early close as much as after the last record.
        if !reader_done {
            if let Ok(e) = stream_fault.try_recv() {
                return Err(abort_on_stream_fault(e));
            }
        }

        // An early close leaves the seen-table set incomplete.
        if session.stream_ended() && self.config.reconcile_tables {
            let result = lifecycle::reconcile_tables(&self.store, session.restored_counts()).await;
            session.record_deleted_tables(result.deleted.len());
            for fault in result.faults {
                session.record_fault(fault);
            }
        }

        match session.finalize() {
            Some(Ok(summary)) => {
                log_summary(&summary, started.elapsed());
                Ok(summary)
            }
            Some(Err(failure)) => {
                warn!(
                    target: "tablekeep::restore",
                    faults = failure.faults.len(),
                    entities = failure.partial.total_entities,
                    "Restore failed"
                );
                Err(RestoreError::Aggregate(failure))
            }
            None => Err(RestoreError::WorkerPanicked(format!(
                "restore stopped with {} record(s) in flight",
                session.in_flight()
            ))),
        }
    }
}

/// Decode the archive on a blocking thread
///
/// Records go to the bounded channel, the first error to the one-shot
/// channel. The fault is sent before the record channel closes. The thread
/// stops after the first error, or as soon as the record receiver is dropped.
fn spawn_reader<F, I>(
    open: F,
    capacity: usize,
) -> (
    mpsc::Receiver<Record>,
    oneshot::Receiver<ArchiveError>,
    JoinHandle<()>,
)
where
    F: FnOnce() -> ArchiveResult<I> + Send + 'static,
    I: Iterator<Item = ArchiveResult<Record>> + 'static,
{
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let (fault_tx, fault_rx) = oneshot::channel();
    let handle = tokio::task::spawn_blocking(move || {
        let records = match open() {
            Ok(records) => records,
            Err(e) => {
                let _ = fault_tx.send(e);
                return;
            }
        };
        for item in records {
            match item {
                Ok(record) => {
                    if tx.blocking_send(record).is_err() {
                        return;
                    }
                }
                Err(e) => {
                    let _ = fault_tx.send(e);
                    return;
                }
            }
        }
    });
    (rx, fault_rx, handle)
}

fn abort_on_stream_fault(e: ArchiveError) -> RestoreError {
    warn!(target: "tablekeep::restore", error = %e, "Archive stream failed; aborting");
    RestoreError::Stream(e)
}

/// Prepare the table (first record only), then insert the entity
async fn process_record<S>(store: Arc<S>, record: Record, first_of_table: bool) -> RecordOutcome
where
    S: TableStore + 'static,
{
    let mut outcome = RecordOutcome::new(record.table.clone(), first_of_table);

    if first_of_table {
        match lifecycle::prepare_table(&store, &record.table).await {
            Ok(stats) => outcome.cleared = Some(stats),
            Err(fault) => {
                outcome.fault = Some(fault);
                return outcome;
            }
        }
    }

    if let Some(entity) = &record.entity {
        match write_entity(store.as_ref(), &record.table, entity).await {
            Ok(_) => outcome.inserted = true,
            Err(fault) => outcome.fault = Some(fault),
        }
    }
    outcome
}

fn log_summary(summary: &RestoreSummary, elapsed: Duration) {
    for (table, count) in &summary.tables {
        info!(target: "tablekeep::restore", table = %table, entities = count, "Restored entities");
    }
    info!(
        target: "tablekeep::restore",
        tables = summary.tables.len(),
        entities = summary.total_entities,
        deleted_tables = summary.deleted_tables,
        elapsed_ms = elapsed.as_millis() as u64,
        "Restore completed"
    );
}
