//! Shared test utilities for the integration suites.
//!
//! Import via `#[path = "../common/mod.rs"] mod common;` from a suite's main.rs.

#![allow(dead_code)]
#![allow(unused_imports)]

use std::collections::BTreeMap;
use std::sync::{Arc, Once};
use std::time::Duration;
pub use tablekeep::testing::{CallPhase, InstrumentedStore, StoreCall, StoreEvent};
pub use tablekeep::{
    ArchiveWriter, ArchivedEntity, Compression, EdmType, Entity, EntityKey, InMemoryTableStore,
    PropertyValue, Record, RestoreConfig, RestoreError, RestoreSummary, Restorer, TypedValue,
    WriteOptions,
};

// ============================================================================
// Initialization
// ============================================================================

static INIT_TRACING: Once = Once::new();

/// Install a test-writer subscriber once per binary; `RUST_LOG` selects levels.
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

// ============================================================================
// Archive builders
// ============================================================================

/// A record holding a string-keyed entity with extra typed properties
pub fn record_with(table: &str, pk: &str, rk: &str, props: &[(&str, TypedValue)]) -> Record {
    let mut entity = ArchivedEntity::new();
    entity.insert("PartitionKey".to_string(), TypedValue::string(pk));
    entity.insert("RowKey".to_string(), TypedValue::string(rk));
    for (name, value) in props {
        entity.insert(name.to_string(), value.clone());
    }
    Record::with_entity(table, entity)
}

/// A record holding a string-keyed entity with a `Value` property
pub fn record(table: &str, pk: &str, rk: &str) -> Record {
    record_with(
        table,
        pk,
        rk,
        &[("Value", TypedValue::string(format!("{table}/{pk}/{rk}")))],
    )
}

/// `count` records for one table, spread over `partitions` partition keys
pub fn table_records(table: &str, count: usize, partitions: usize) -> Vec<Record> {
    (0..count)
        .map(|i| record(table, &format!("p{}", i % partitions.max(1)), &format!("{i:05}")))
        .collect()
}

/// An empty-table marker
pub fn marker(table: &str) -> Record {
    Record::empty_table(table)
}

/// Encode records as an archive
pub fn archive_bytes(records: &[Record], compression: Compression) -> Vec<u8> {
    let options = WriteOptions {
        compression,
        level: None,
    };
    let mut writer = ArchiveWriter::new(Vec::new(), options).unwrap();
    for record in records {
        writer.write_record(record).unwrap();
    }
    writer.finish().unwrap()
}

// ============================================================================
// Stores
// ============================================================================

/// An entity with a `Value` property that marks it as pre-existing
pub fn stale_entity(pk: &str, rk: &str) -> Entity {
    Entity::new(EntityKey::new(pk, rk)).with("Value", "stale")
}

/// A store holding `count` stale entities per listed table
pub fn seeded_store(page_size: usize, tables: &[(&str, usize)]) -> InMemoryTableStore {
    let store = InMemoryTableStore::with_page_size(page_size);
    for (table, count) in tables {
        store.seed_table(
            table,
            (0..*count).map(|i| stale_entity(&format!("p{}", i % 7), &format!("{i:05}"))),
        );
    }
    store
}

/// Shared, instrumented wrapper around a store
pub type Instrumented = Arc<InstrumentedStore<InMemoryTableStore>>;

/// Wrap a store, optionally with random latency per call
pub fn instrumented(store: InMemoryTableStore, latency: Option<(u64, u64)>) -> Instrumented {
    let mut wrapped = InstrumentedStore::new(store);
    if let Some((min, max)) = latency {
        wrapped = wrapped.with_latency(Duration::from_millis(min), Duration::from_millis(max));
    }
    Arc::new(wrapped)
}

/// A restorer over a shared store
pub fn restorer<S>(store: S, concurrency: usize) -> Restorer<S>
where
    S: tablekeep::TableStore + 'static,
{
    init_tracing();
    Restorer::new(store, RestoreConfig::default().with_concurrency(concurrency)).unwrap()
}

/// Keys and `Value` properties of every table, for comparing whole stores
pub fn contents(store: &InMemoryTableStore) -> BTreeMap<String, Vec<(EntityKey, Option<String>)>> {
    store
        .snapshot()
        .into_iter()
        .map(|(table, entities)| {
            let rows = entities
                .into_iter()
                .map(|e| {
                    let value = e.get("Value").and_then(|v| v.as_str()).map(str::to_string);
                    (e.into_key(), value)
                })
                .collect();
            (table, rows)
        })
        .collect()
}

/// Run a restore future with a deadline so a stall fails the test instead of hanging it
pub async fn within<F: std::future::Future>(future: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(20), future)
        .await
        .expect("restore did not finish in time")
}
