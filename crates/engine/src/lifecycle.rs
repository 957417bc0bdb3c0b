//! Table lifecycle
//!
//! - [`prepare_table`] runs for the first record of each table: the table is
//!   created if absent and then emptied, strictly before that record's
//!   entity is inserted.
//! - [`reconcile_tables`] runs once after the archive has been fully applied
//!   and deletes every destination table the archive did not name.

use crate::deleter::{clear_table, ClearStats};
use crate::error::Fault;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tablekeep_core::{ContinuationToken, StoreError, TableStore};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Create `table` if needed and delete its existing entities
pub async fn prepare_table<S>(store: &Arc<S>, table: &str) -> Result<ClearStats, Fault>
where
    S: TableStore + 'static,
{
    let created = store
        .create_table_if_absent(table)
        .await
        .map_err(|source| Fault::CreateTable {
            table: table.to_string(),
            source,
        })?;
    if created {
        debug!(target: "tablekeep::restore", table, "Created table");
        return Ok(ClearStats::default());
    }

    info!(target: "tablekeep::restore", table, "Clearing data");
    let stats = clear_table(store, table)
        .await
        .map_err(|source| Fault::ClearTable {
            table: table.to_string(),
            source,
        })?;
    info!(
        target: "tablekeep::restore",
        table,
        deleted = stats.deleted,
        pages = stats.pages,
        "Cleared entities"
    );
    Ok(stats)
}

/// Result of reconciling the destination's table set
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciliation {
    /// Tables deleted, sorted
    pub deleted: Vec<String>,
    /// Faults raised while listing or deleting
    pub faults: Vec<Fault>,
}

/// Delete every destination table that is not a key of `keep`
///
/// All listing pages are fetched before the first deletion, so deletions never
/// disturb the cursor. Deletions then run concurrently and all of them finish
/// before this returns. A table that vanished in the meantime is skipped.
pub async fn reconcile_tables<S, V>(store: &Arc<S>, keep: &BTreeMap<String, V>) -> Reconciliation
where
    S: TableStore + 'static,
{
    let mut result = Reconciliation::default();

    let mut absent = Vec::new();
    let mut cursor: Option<ContinuationToken> = None;
    loop {
        let page = match store.list_tables(cursor.as_ref()).await {
            Ok(page) => page,
            Err(source) => {
                result.faults.push(Fault::ListTables { source });
                return result;
            }
        };
        absent.extend(page.items.into_iter().filter(|name| !keep.contains_key(name)));
        match page.next {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    // Names leave this set as their task reports back; a task that panics
    // never does.
    let mut unreported: BTreeSet<String> = absent.iter().cloned().collect();
    let mut tasks = JoinSet::new();
    for table in absent {
        let store = Arc::clone(store);
        tasks.spawn(async move {
            info!(target: "tablekeep::restore", table = %table, "Deleting table");
            let outcome = store.delete_table(&table).await;
            (table, outcome)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        let (table, outcome) = match joined {
            Ok(reported) => reported,
            Err(e) => {
                warn!(target: "tablekeep::restore", error = %e, "Delete table task failed");
                continue;
            }
        };
        unreported.remove(&table);
        match outcome {
            Ok(()) => {
                info!(target: "tablekeep::restore", table = %table, "Deleted table");
                result.deleted.push(table);
            }
            Err(StoreError::TableNotFound(_)) => {
                debug!(target: "tablekeep::restore", table = %table, "Table already gone");
            }
            Err(source) => result.faults.push(Fault::DeleteTable { table, source }),
        }
    }
    for table in unreported {
        result.faults.push(Fault::DeleteTable {
            table,
            source: StoreError::other("delete table task panicked"),
        });
    }

    result.deleted.sort();
    result
}
