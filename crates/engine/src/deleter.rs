//! Batch deleter
//!
//! Clears every entity from a table. Keys are fetched one page at a time
//! with a key-only projection. Each page is grouped by partition key (in the
//! order partition keys first appear) and cut into batches of at most
//! [`MAX_BATCH_OPERATIONS`](tablekeep_core::MAX_BATCH_OPERATIONS). A page's
//! batches run concurrently; the next page is fetched only once all of them
//! have finished.
//!
//! A failed batch fails the clear. Batches that already succeeded are not
//! rolled back.

use std::collections::HashMap;
use std::sync::Arc;
use tablekeep_core::{
    BatchResult, ContinuationToken, DeleteBatch, Entity, EntityKey, Projection, StoreError,
    StoreResult, TableStore,
};
use tokio::task::JoinSet;
use tracing::debug;

/// What one clear removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClearStats {
    /// Entities deleted
    pub deleted: u64,
    /// Query pages fetched
    pub pages: usize,
    /// Batches executed
    pub batches: usize,
}

/// Split keys into valid delete batches
///
/// Partition keys appear in first-encounter order; within a partition, keys
/// keep their input order.
pub fn plan_batches(keys: impl IntoIterator<Item = EntityKey>) -> BatchResult<Vec<DeleteBatch>> {
    let mut slots: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<Vec<DeleteBatch>> = Vec::new();

    for key in keys {
        let slot = match slots.get(&key.partition_key) {
            Some(&slot) => slot,
            None => {
                slots.insert(key.partition_key.clone(), groups.len());
                groups.push(Vec::new());
                groups.len() - 1
            }
        };
        let group = &mut groups[slot];
        match group.last_mut() {
            Some(batch) if !batch.is_full() => batch.push(key)?,
            _ => group.push(DeleteBatch::starting_with(key)),
        }
    }

    Ok(groups.into_iter().flatten().collect())
}

/// Delete every entity in `table`
pub async fn clear_table<S>(store: &Arc<S>, table: &str) -> StoreResult<ClearStats>
where
    S: TableStore + 'static,
{
    let mut stats = ClearStats::default();
    let mut cursor: Option<ContinuationToken> = None;

    loop {
        let page = store
            .query_entities(table, Projection::Keys, cursor.as_ref())
            .await?;
        stats.pages += 1;
        let batches = plan_batches(page.items.into_iter().map(Entity::into_key))?;
        debug!(
            target: "tablekeep::restore",
            table,
            page = stats.pages,
            batches = batches.len(),
            "Deleting page"
        );

        stats.batches += batches.len();
        stats.deleted += delete_page(store, table, batches).await?;

        match page.next {
            Some(next) => cursor = Some(next),
            None => return Ok(stats),
        }
    }
}

/// Run one page's batches concurrently; all of them finish before returning
async fn delete_page<S>(store: &Arc<S>, table: &str, batches: Vec<DeleteBatch>) -> StoreResult<u64>
where
    S: TableStore + 'static,
{
    let mut tasks = JoinSet::new();
    for batch in batches {
        let store = Arc::clone(store);
        let table = table.to_string();
        tasks.spawn(async move {
            store.execute_batch(&table, &batch).await?;
            Ok::<u64, StoreError>(batch.len() as u64)
        });
    }

    let mut deleted = 0;
    let mut first_error = None;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(count)) => deleted += count,
            Ok(Err(e)) => {
                first_error.get_or_insert(e);
            }
            Err(e) => {
                first_error.get_or_insert(StoreError::other(format!("delete batch task failed: {e}")));
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(deleted),
    }
}
