//! Backup crawl
//!
//! The inverse of a restore, and deliberately sequential: tables are listed
//! page by page and each table's entities are queried page by page and
//! written to the archive in store order. A table with no entities is written
//! as an empty-table marker so a restore still recreates and clears it.

use crate::config::BackupConfig;
use crate::error::{BackupError, BackupResult};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tablekeep_archive::ArchiveWriter;
use tablekeep_core::{ContinuationToken, Projection, Record, TableStore};
use tracing::{debug, info};

/// Counts reported by a backup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BackupSummary {
    /// Entities written per table
    pub tables: BTreeMap<String, u64>,
    /// Sum of `tables`
    pub total_entities: u64,
    /// Records written, including empty-table markers
    pub records: usize,
}

/// Write every table of `store` into an archive on `out`
///
/// Returns the inner writer once the archive is finished.
pub async fn backup<S, W>(
    store: &S,
    out: W,
    config: &BackupConfig,
) -> BackupResult<(W, BackupSummary)>
where
    S: TableStore + ?Sized,
    W: Write,
{
    config.validate()?;
    let mut archive = ArchiveWriter::new(out, config.write_options())?;
    let mut summary = BackupSummary::default();

    let mut cursor: Option<ContinuationToken> = None;
    loop {
        let page = store
            .list_tables(cursor.as_ref())
            .await
            .map_err(BackupError::ListTables)?;
        for table in page.items {
            let count = backup_table(store, &table, &mut archive).await?;
            info!(target: "tablekeep::backup", table = %table, entities = count, "Backed up table");
            summary.total_entities += count;
            summary.tables.insert(table, count);
        }
        match page.next {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    summary.records = archive.records_written();
    let out = archive.finish()?;
    info!(
        target: "tablekeep::backup",
        tables = summary.tables.len(),
        entities = summary.total_entities,
        "Backup completed"
    );
    Ok((out, summary))
}

/// Write every table of `store` into an archive file
pub async fn backup_to_file<S>(
    store: &S,
    path: &Path,
    config: &BackupConfig,
) -> BackupResult<BackupSummary>
where
    S: TableStore + ?Sized,
{
    let io_error = |source: std::io::Error| BackupError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = File::create(path).map_err(io_error)?;
    let (mut out, summary) = backup(store, BufWriter::new(file), config).await?;
    out.flush().map_err(io_error)?;
    Ok(summary)
}

async fn backup_table<S, W>(
    store: &S,
    table: &str,
    archive: &mut ArchiveWriter<W>,
) -> BackupResult<u64>
where
    S: TableStore + ?Sized,
    W: Write,
{
    let mut count = 0u64;
    let mut cursor: Option<ContinuationToken> = None;
    loop {
        let page = store
            .query_entities(table, Projection::All, cursor.as_ref())
            .await
            .map_err(|source| BackupError::Query {
                table: table.to_string(),
                source,
            })?;
        debug!(target: "tablekeep::backup", table, entities = page.items.len(), "Fetched page");
        for entity in &page.items {
            archive.write_record(&Record::with_entity(table, entity.to_archived()))?;
            count += 1;
        }
        match page.next {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }
    if count == 0 {
        archive.write_record(&Record::empty_table(table))?;
    }
    Ok(count)
}
