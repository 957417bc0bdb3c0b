//! Concurrency ceiling and admission pauses

use crate::common::*;

fn interleaved(tables: &[&str], per_table: usize) -> Vec<Record> {
    let mut records = Vec::new();
    for i in 0..per_table {
        for table in tables {
            records.push(record(table, &format!("p{}", i % 3), &format!("{i:05}")));
        }
    }
    records
}

#[tokio::test]
async fn outstanding_calls_never_exceed_ceiling() {
    let store = instrumented(
        seeded_store(50, &[("A", 120), ("B", 80), ("Gone", 30)]),
        Some((1, 3)),
    );
    let restorer = restorer(store.clone(), 5);

    let summary = within(restorer.restore_records(interleaved(&["A", "B", "C"], 60)))
        .await
        .unwrap();
    assert_eq!(summary.total_entities, 180);
    assert_eq!(summary.deleted_tables, 1);

    let peak = store.peak_concurrency();
    assert!(peak <= 5, "peak concurrency {peak} above ceiling");
    assert!(peak > 1, "restore never overlapped calls");
    assert_eq!(store.active(), 0);
}

#[tokio::test]
async fn ceiling_of_one_is_strictly_sequential() {
    let store = instrumented(seeded_store(10, &[("A", 35), ("B", 12)]), Some((0, 1)));
    let restorer = restorer(store.clone(), 1);

    // New tables keep appearing while the ceiling is already full.
    let summary = within(restorer.restore_records(interleaved(&["A", "B", "C", "D"], 10)))
        .await
        .unwrap();
    assert_eq!(summary.total_entities, 40);
    assert_eq!(summary.tables.len(), 4);
    assert_eq!(store.peak_concurrency(), 1);
}

#[tokio::test]
async fn records_after_a_new_table_wait_for_its_first_record() {
    let store = instrumented(seeded_store(5, &[("B", 40)]), Some((0, 2)));
    let restorer = restorer(store.clone(), 30);

    let mut records = table_records("A", 20, 2);
    records.push(record("B", "b", "first"));
    for i in 0..10 {
        records.push(record("A", "late", &format!("after-{i}")));
        records.push(record("B", "late", &format!("after-{i}")));
    }
    within(restorer.restore_records(records)).await.unwrap();

    let events = store.events();
    let first_done = events
        .iter()
        .position(|e| {
            matches!(&e.call, StoreCall::Insert { key, .. } if key.row_key == "first")
                && matches!(e.phase, CallPhase::Finished { .. })
        })
        .unwrap();
    let earliest_later = events
        .iter()
        .position(|e| {
            matches!(&e.call, StoreCall::Insert { key, .. } if key.row_key.starts_with("after-"))
        })
        .unwrap();
    assert!(
        first_done < earliest_later,
        "a later record started at {earliest_later} before the first B record finished at {first_done}"
    );
}

#[tokio::test]
async fn larger_ceiling_finishes_the_same_restore() {
    let records = interleaved(&["A", "B"], 100);
    let mut results = Vec::new();
    for ceiling in [1, 4, 30] {
        let store = instrumented(seeded_store(25, &[("A", 60)]), None);
        let restorer = restorer(store.clone(), ceiling);
        let summary = within(restorer.restore_records(records.clone())).await.unwrap();
        results.push((summary.tables, contents(store.inner())));
    }
    assert!(results.windows(2).all(|w| w[0] == w[1]));
}
