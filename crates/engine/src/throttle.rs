//! Concurrency ceiling for store calls
//!
//! [`ThrottledStore`] wraps a [`TableStore`] and holds one semaphore permit
//! for the duration of every call, so at most `limit` calls are outstanding
//! at once no matter how many tasks issue them. Clearing a table fans out
//! into many batches and reconciliation into many deletes; both stay under
//! the same ceiling as record processing.

use async_trait::async_trait;
use tablekeep_core::{
    ContinuationToken, DeleteBatch, Entity, Page, Projection, StoreError, StoreResult, TableStore,
};
use tokio::sync::{Semaphore, SemaphorePermit};

/// A store wrapper admitting at most `limit` concurrent calls
#[derive(Debug)]
pub struct ThrottledStore<S> {
    inner: S,
    permits: Semaphore,
    limit: usize,
}

impl<S: TableStore> ThrottledStore<S> {
    /// Wrap `inner`, allowing `limit` outstanding calls (at least 1)
    pub fn new(inner: S, limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            inner,
            permits: Semaphore::new(limit),
            limit,
        }
    }

    /// The wrapped store
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Configured ceiling
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Permits not currently held
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    async fn permit(&self) -> StoreResult<SemaphorePermit<'_>> {
        // The semaphore is never closed while `self` is alive
        self.permits
            .acquire()
            .await
            .map_err(|_| StoreError::unavailable("store throttle closed"))
    }
}

#[async_trait]
impl<S: TableStore> TableStore for ThrottledStore<S> {
    async fn list_tables(&self, cursor: Option<&ContinuationToken>) -> StoreResult<Page<String>> {
        let _permit = self.permit().await?;
        self.inner.list_tables(cursor).await
    }

    async fn create_table_if_absent(&self, table: &str) -> StoreResult<bool> {
        let _permit = self.permit().await?;
        self.inner.create_table_if_absent(table).await
    }

    async fn delete_table(&self, table: &str) -> StoreResult<()> {
        let _permit = self.permit().await?;
        self.inner.delete_table(table).await
    }

    async fn query_entities(
        &self,
        table: &str,
        projection: Projection,
        cursor: Option<&ContinuationToken>,
    ) -> StoreResult<Page<Entity>> {
        let _permit = self.permit().await?;
        self.inner.query_entities(table, projection, cursor).await
    }

    async fn insert_entity(&self, table: &str, entity: Entity) -> StoreResult<()> {
        let _permit = self.permit().await?;
        self.inner.insert_entity(table, entity).await
    }

    async fn execute_batch(&self, table: &str, batch: &DeleteBatch) -> StoreResult<()> {
        let _permit = self.permit().await?;
        self.inner.execute_batch(table, batch).await
    }
}
