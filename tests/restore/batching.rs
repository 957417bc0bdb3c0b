//! Delete batch shape
//!
//! Clearing a table issues delete batches of at most 100 operations, each
//! addressing a single partition key.

use crate::common::*;
use std::collections::BTreeMap;
use tablekeep::MAX_BATCH_OPERATIONS;

fn batch_calls(store: &Instrumented) -> Vec<(String, usize, usize)> {
    store
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            StoreCall::Batch {
                partition_key,
                size,
                partitions,
                ..
            } => Some((partition_key, size, partitions)),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn batches_stay_within_limits_across_pages() {
    let store = instrumented(seeded_store(120, &[("Orders", 350)]), Some((0, 1)));
    let restorer = restorer(store.clone(), 8);

    let summary = within(restorer.restore_records(vec![record("Orders", "new", "1")]))
        .await
        .unwrap();
    assert_eq!(summary.cleared_entities, 350);

    let batches = batch_calls(&store);
    assert!(!batches.is_empty());
    for (pk, size, partitions) in &batches {
        assert!(
            (1..=MAX_BATCH_OPERATIONS).contains(size),
            "batch for {pk} has {size} operations"
        );
        assert_eq!(*partitions, 1, "batch for {pk} mixes partitions");
    }
    let deleted: usize = batches.iter().map(|(_, size, _)| size).sum();
    assert_eq!(deleted, 350);
    assert_eq!(store.inner().entity_count("Orders"), 1);
}

#[tokio::test]
async fn large_partition_is_split_at_the_limit() {
    let inner = InMemoryTableStore::with_page_size(1000);
    inner.seed_table("Orders", (0..250).map(|i| stale_entity("only", &format!("{i:05}"))));
    let store = instrumented(inner, None);
    let restorer = restorer(store.clone(), 4);

    within(restorer.restore_records(vec![record("Orders", "new", "1")]))
        .await
        .unwrap();

    let mut sizes: Vec<usize> = batch_calls(&store).into_iter().map(|(_, size, _)| size).collect();
    sizes.sort_unstable();
    assert_eq!(sizes, vec![50, 100, 100]);
}

#[tokio::test]
async fn one_small_partition_needs_one_batch() {
    let store = instrumented(seeded_store(1000, &[("Orders", 7)]), None);
    let restorer = restorer(store.clone(), 4);

    within(restorer.restore_records(vec![record("Orders", "new", "1")]))
        .await
        .unwrap();

    // Seeded keys use seven partitions, one entity each.
    let mut per_partition: BTreeMap<String, usize> = BTreeMap::new();
    for (pk, size, _) in batch_calls(&store) {
        *per_partition.entry(pk).or_default() += size;
    }
    assert_eq!(per_partition.len(), 7);
    assert!(per_partition.values().all(|&n| n == 1));
}

#[tokio::test]
async fn key_pages_are_requested_one_at_a_time() {
    let store = instrumented(seeded_store(40, &[("Orders", 200)]), Some((0, 2)));
    let restorer = restorer(store.clone(), 16);

    within(restorer.restore_records(vec![record("Orders", "new", "1")]))
        .await
        .unwrap();

    // A query never starts while a batch of the previous page is outstanding.
    let mut outstanding_batches = 0usize;
    for event in store.events() {
        if event.call.table() != Some("Orders") {
            continue;
        }
        match (&event.call, event.phase) {
            (StoreCall::Batch { .. }, CallPhase::Started) => outstanding_batches += 1,
            (StoreCall::Batch { .. }, CallPhase::Finished { .. }) => outstanding_batches -= 1,
            (StoreCall::Query { .. }, CallPhase::Started) => {
                assert_eq!(outstanding_batches, 0, "query issued with batches in flight")
            }
            _ => {}
        }
    }
}
