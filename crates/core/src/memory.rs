//! In-memory table store
//!
//! A complete [`TableStore`] held in process memory. It follows the paging,
//! insert and batch semantics of a hosted table service:
//!
//! - tables and entities are listed in key order, `page_size` per page
//! - inserting an existing key fails with `EntityAlreadyExists`
//! - a batch is atomic: if any addressed entity is missing, nothing is deleted
//! - calls on a missing table fail with `TableNotFound`
//!
//! Continuation tokens encode the first key of the next page.

use crate::batch::{DeleteBatch, MAX_BATCH_OPERATIONS};
use crate::entity::{Entity, EntityKey};
use crate::error::{BatchError, StoreError, StoreResult};
use crate::store::{ContinuationToken, Page, Projection, TableStore};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::ops::Bound;
use tracing::trace;

/// Default number of items per page (the hosted service's query page size)
pub const DEFAULT_PAGE_SIZE: usize = 1000;

type Table = BTreeMap<EntityKey, Entity>;

/// Table store backed by ordered maps
#[derive(Debug)]
pub struct InMemoryTableStore {
    tables: RwLock<BTreeMap<String, Table>>,
    page_size: usize,
}

impl Default for InMemoryTableStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryTableStore {
    /// Create an empty store with the default page size
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Create an empty store returning at most `page_size` items per page
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            tables: RwLock::new(BTreeMap::new()),
            page_size: page_size.max(1),
        }
    }

    /// Create a table (empty or not) and insert entities, replacing duplicates
    pub fn seed_table(&self, table: &str, entities: impl IntoIterator<Item = Entity>) {
        let mut tables = self.tables.write();
        let rows = tables.entry(table.to_string()).or_default();
        for entity in entities {
            rows.insert(entity.key().clone(), entity);
        }
    }

    /// Names of all tables, sorted
    pub fn table_names(&self) -> Vec<String> {
        self.tables.read().keys().cloned().collect()
    }

    /// Whether the table exists
    pub fn contains_table(&self, table: &str) -> bool {
        self.tables.read().contains_key(table)
    }

    /// All entities of a table in key order, `None` if it does not exist
    pub fn entities(&self, table: &str) -> Option<Vec<Entity>> {
        self.tables
            .read()
            .get(table)
            .map(|rows| rows.values().cloned().collect())
    }

    /// Number of entities in a table, 0 if it does not exist
    pub fn entity_count(&self, table: &str) -> usize {
        self.tables.read().get(table).map_or(0, |rows| rows.len())
    }

    /// Full snapshot of every table
    pub fn snapshot(&self) -> BTreeMap<String, Vec<Entity>> {
        self.tables
            .read()
            .iter()
            .map(|(name, rows)| (name.clone(), rows.values().cloned().collect()))
            .collect()
    }

    fn encode_key(key: &EntityKey) -> ContinuationToken {
        // serde_json on a pair of strings cannot fail
        let raw = serde_json::to_string(&(&key.partition_key, &key.row_key)).unwrap_or_default();
        ContinuationToken::new(raw)
    }

    fn decode_key(token: &ContinuationToken) -> StoreResult<EntityKey> {
        let (pk, rk): (String, String) = serde_json::from_str(token.as_str())
            .map_err(|e| StoreError::invalid_continuation(e.to_string()))?;
        Ok(EntityKey::new(pk, rk))
    }
}

#[async_trait]
impl TableStore for InMemoryTableStore {
    async fn list_tables(&self, cursor: Option<&ContinuationToken>) -> StoreResult<Page<String>> {
        let tables = self.tables.read();
        let start = match cursor {
            Some(token) => Bound::Included(token.as_str().to_string()),
            None => Bound::Unbounded,
        };
        let mut names = tables
            .range::<String, _>((start, Bound::Unbounded))
            .map(|(name, _)| name.clone());
        let items: Vec<String> = names.by_ref().take(self.page_size).collect();
        let next = names.next().map(ContinuationToken::new);
        Ok(Page { items, next })
    }

    async fn create_table_if_absent(&self, table: &str) -> StoreResult<bool> {
        let mut tables = self.tables.write();
        if tables.contains_key(table) {
            return Ok(false);
        }
        tables.insert(table.to_string(), Table::new());
        trace!(target: "tablekeep::store", table, "Created table");
        Ok(true)
    }

    async fn delete_table(&self, table: &str) -> StoreResult<()> {
        let removed = self.tables.write().remove(table);
        match removed {
            Some(rows) => {
                trace!(target: "tablekeep::store", table, entities = rows.len(), "Deleted table");
                Ok(())
            }
            None => Err(StoreError::table_not_found(table)),
        }
    }

    async fn query_entities(
        &self,
        table: &str,
        projection: Projection,
        cursor: Option<&ContinuationToken>,
    ) -> StoreResult<Page<Entity>> {
        let tables = self.tables.read();
        let rows = tables
            .get(table)
            .ok_or_else(|| StoreError::table_not_found(table))?;
        let start = match cursor {
            Some(token) => Bound::Included(Self::decode_key(token)?),
            None => Bound::Unbounded,
        };
        let mut entities = rows.range((start, Bound::Unbounded)).map(|(_, e)| e);
        let items: Vec<Entity> = entities
            .by_ref()
            .take(self.page_size)
            .map(|entity| match projection {
                Projection::All => entity.clone(),
                Projection::Keys => Entity::new(entity.key().clone()),
            })
            .collect();
        let next = entities.next().map(|e| Self::encode_key(e.key()));
        Ok(Page { items, next })
    }

    async fn insert_entity(&self, table: &str, entity: Entity) -> StoreResult<()> {
        let mut tables = self.tables.write();
        let rows = tables
            .get_mut(table)
            .ok_or_else(|| StoreError::table_not_found(table))?;
        if rows.contains_key(entity.key()) {
            return Err(StoreError::EntityAlreadyExists {
                table: table.to_string(),
                key: entity.key().clone(),
            });
        }
        rows.insert(entity.key().clone(), entity);
        Ok(())
    }

    async fn execute_batch(&self, table: &str, batch: &DeleteBatch) -> StoreResult<()> {
        if batch.is_empty() {
            return Err(BatchError::Empty.into());
        }
        if batch.len() > MAX_BATCH_OPERATIONS {
            return Err(BatchError::Full {
                limit: MAX_BATCH_OPERATIONS,
            }
            .into());
        }
        let mut tables = self.tables.write();
        let rows = tables
            .get_mut(table)
            .ok_or_else(|| StoreError::table_not_found(table))?;
        if let Some(missing) = batch.keys().find(|key| !rows.contains_key(key)) {
            return Err(StoreError::EntityNotFound {
                table: table.to_string(),
                key: missing,
            });
        }
        for key in batch.keys() {
            rows.remove(&key);
        }
        Ok(())
    }
}
