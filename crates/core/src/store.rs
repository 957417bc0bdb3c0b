//! Destination store abstraction
//!
//! [`TableStore`] is the seam between the restore pipeline and the store it
//! writes to. Every method is a suspension point; implementations must be
//! safe to call concurrently (requires Send + Sync).
//!
//! Listing calls are paged: a page carries an optional [`ContinuationToken`]
//! that resumes enumeration where the page ended.

use crate::batch::DeleteBatch;
use crate::entity::Entity;
use crate::error::StoreResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Opaque cursor returned by a paged call
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContinuationToken(String);

impl ContinuationToken {
    /// Wrap a raw token
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One page of a paged listing
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// Items on this page
    pub items: Vec<T>,
    /// Cursor for the next page, `None` on the last page
    pub next: Option<ContinuationToken>,
}

impl<T> Page<T> {
    /// A final page
    pub fn last(items: Vec<T>) -> Self {
        Self { items, next: None }
    }
}

/// Which properties an entity query returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Projection {
    /// Every property
    #[default]
    All,
    /// Partition key and row key only
    Keys,
}

/// Destination table store
#[async_trait]
pub trait TableStore: Send + Sync {
    /// List table names, one page at a time
    async fn list_tables(&self, cursor: Option<&ContinuationToken>) -> StoreResult<Page<String>>;

    /// Create a table unless it exists; returns whether it was created
    async fn create_table_if_absent(&self, table: &str) -> StoreResult<bool>;

    /// Delete a table and all of its entities
    async fn delete_table(&self, table: &str) -> StoreResult<()>;

    /// Query a table's entities, one page at a time
    async fn query_entities(
        &self,
        table: &str,
        projection: Projection,
        cursor: Option<&ContinuationToken>,
    ) -> StoreResult<Page<Entity>>;

    /// Insert an entity; fails if an entity with the same key exists
    async fn insert_entity(&self, table: &str, entity: Entity) -> StoreResult<()>;

    /// Execute a delete batch atomically
    async fn execute_batch(&self, table: &str, batch: &DeleteBatch) -> StoreResult<()>;
}

#[async_trait]
impl<S: TableStore + ?Sized> TableStore for Arc<S> {
    async fn list_tables(&self, cursor: Option<&ContinuationToken>) -> StoreResult<Page<String>> {
        (**self).list_tables(cursor).await
    }

    async fn create_table_if_absent(&self, table: &str) -> StoreResult<bool> {
        (**self).create_table_if_absent(table).await
    }

    async fn delete_table(&self, table: &str) -> StoreResult<()> {
        (**self).delete_table(table).await
    }

    async fn query_entities(
        &self,
        table: &str,
        projection: Projection,
        cursor: Option<&ContinuationToken>,
    ) -> StoreResult<Page<Entity>> {
        (**self).query_entities(table, projection, cursor).await
    }

    async fn insert_entity(&self, table: &str, entity: Entity) -> StoreResult<()> {
        (**self).insert_entity(table, entity).await
    }

    async fn execute_batch(&self, table: &str, batch: &DeleteBatch) -> StoreResult<()> {
        (**self).execute_batch(table, batch).await
    }
}
