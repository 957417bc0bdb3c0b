//! Fault handling
//!
//! Stream faults end the restore at once. Store and conversion faults close
//! admission, let in-flight records finish and surface together.

use crate::common::*;
use std::io::Cursor;
use std::time::Duration;
use tablekeep::{ArchiveError, Fault, StoreError};

fn aggregate(err: RestoreError) -> tablekeep::RestoreFailure {
    match err {
        RestoreError::Aggregate(failure) => failure,
        other => panic!("expected an aggregate failure, got {other:?}"),
    }
}

// ============================================================================
// Stream faults
// ============================================================================

#[tokio::test]
async fn stream_fault_does_not_wait_for_in_flight_records() {
    let store = instrumented(InMemoryTableStore::new(), None);
    // This insert never returns; the restore must not wait for it.
    store.stall_when(|call| {
        matches!(call, StoreCall::Insert { key, .. } if key.row_key == "2")
    });
    let restorer = restorer(store.clone(), 4);

    let stream = vec![
        Ok(record("Orders", "A", "1")),
        Ok(record("Orders", "A", "2")),
        Err(ArchiveError::malformed(2, "unexpected end of archive")),
    ];
    let err = tokio::time::timeout(Duration::from_secs(5), restorer.restore_stream(stream))
        .await
        .expect("stream fault waited for a stalled record")
        .unwrap_err();
    assert!(err.is_stream_fault());
    assert!(err.faults().is_empty());
}

async fn expect_prompt_stream_fault(
    restorer: &Restorer<Instrumented>,
    stream: Vec<Result<Record, ArchiveError>>,
) -> RestoreError {
    let err = tokio::time::timeout(Duration::from_secs(5), restorer.restore_stream(stream))
        .await
        .expect("stream fault waited for in-flight records")
        .unwrap_err();
    assert!(err.is_stream_fault(), "got {err:?}");
    err
}

#[tokio::test]
async fn stream_fault_during_new_table_pause() {
    let store = instrumented(InMemoryTableStore::new(), None);
    // The first record of a table pauses admission until it settles, which it never does.
    store.stall_when(|call| matches!(call, StoreCall::Insert { key, .. } if key.row_key == "1"));
    let restorer = restorer(store.clone(), 4);

    let stream = vec![
        Ok(record("Orders", "A", "1")),
        Err(ArchiveError::malformed(1, "unexpected end of archive")),
    ];
    expect_prompt_stream_fault(&restorer, stream).await;
}

#[tokio::test]
async fn stream_fault_while_ceiling_is_full() {
    let store = instrumented(InMemoryTableStore::new(), None);
    store.stall_when(|call| {
        matches!(call, StoreCall::Insert { key, .. } if key.row_key == "2" || key.row_key == "3")
    });
    let restorer = restorer(store.clone(), 2);

    let stream = vec![
        Ok(record("Orders", "A", "1")),
        Ok(record("Orders", "A", "2")),
        Ok(record("Orders", "A", "3")),
        Err(ArchiveError::malformed(3, "unexpected end of archive")),
    ];
    expect_prompt_stream_fault(&restorer, stream).await;
}

#[tokio::test]
async fn decode_error_behind_paused_gate_ends_restore() {
    let store = instrumented(InMemoryTableStore::new(), None);
    store.stall_when(|call| matches!(call, StoreCall::Insert { .. }));
    let restorer = restorer(store.clone(), 4);

    let json = r#"[{"table":"Orders","entity":{"PartitionKey":{"type":"String","value":"A"},"RowKey":{"type":"String","value":"1"}}},{"table":"#;
    let err = tokio::time::timeout(
        Duration::from_secs(5),
        restorer.restore_from_reader(Cursor::new(json.as_bytes().to_vec())),
    )
    .await
    .expect("decode error waited for in-flight records")
    .unwrap_err();
    assert!(err.is_stream_fault(), "got {err:?}");
}

#[tokio::test]
async fn stream_fault_outranks_record_faults_after_close() {
    // Latency keeps the failing insert in flight until the reader has hit the corruption.
    let store = instrumented(InMemoryTableStore::new(), Some((20, 30)));
    store.fail_when(|call| matches!(call, StoreCall::Insert { .. }));
    let restorer = restorer(store.clone(), 4);

    let stream = vec![
        Ok(record("Orders", "A", "1")),
        Err(ArchiveError::malformed(1, "corrupt")),
    ];
    let err = within(restorer.restore_stream(stream)).await.unwrap_err();
    assert!(
        matches!(err, RestoreError::Stream(ArchiveError::Malformed { .. })),
        "got {err:?}"
    );
    assert!(err.faults().is_empty());
}

#[tokio::test]
async fn truncated_archive_is_a_stream_fault() {
    let inner = InMemoryTableStore::new();
    inner.seed_table("Legacy", vec![stale_entity("x", "y")]);
    let store = instrumented(inner, None);
    let restorer = restorer(store.clone(), 4);

    let bytes = archive_bytes(&table_records("Orders", 400, 4), Compression::Gzip);
    let truncated = bytes[..bytes.len() / 2].to_vec();
    let err = within(restorer.restore_from_reader(Cursor::new(truncated)))
        .await
        .unwrap_err();

    assert!(matches!(err, RestoreError::Stream(_)), "got {err:?}");
    // The table set of a truncated archive is unknown, so nothing is deleted.
    assert!(store.inner().contains_table("Legacy"));
    assert_eq!(store.count(|c| matches!(c, StoreCall::DeleteTable { .. })), 0);
}

#[tokio::test]
async fn record_without_row_key_is_a_stream_fault() {
    let store = instrumented(InMemoryTableStore::new(), None);
    let restorer = restorer(store.clone(), 4);

    let json = r#"[{"table":"Orders","entity":{"PartitionKey":{"type":"String","value":"A"}}}]"#;
    let err = within(restorer.restore_from_reader(Cursor::new(json.as_bytes().to_vec())))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RestoreError::Stream(ArchiveError::MissingKey { property: "RowKey", .. })
    ));
    assert_eq!(store.count(|c| matches!(c, StoreCall::Insert { .. })), 0);
}

#[tokio::test]
async fn not_an_array_is_a_stream_fault() {
    let restorer = restorer(instrumented(InMemoryTableStore::new(), None), 4);
    let err = within(restorer.restore_from_reader(Cursor::new(b"{\"table\":\"T\"}".to_vec())))
        .await
        .unwrap_err();
    assert!(err.is_stream_fault());
}

// ============================================================================
// Record faults
// ============================================================================

#[tokio::test]
async fn bad_property_value_is_a_conversion_fault() {
    let store = instrumented(InMemoryTableStore::new(), None);
    let restorer = restorer(store.clone(), 4);

    let records = vec![
        record("Orders", "A", "1"),
        record_with(
            "Orders",
            "A",
            "2",
            &[("Count", TypedValue::new(EdmType::Int32, "twelve"))],
        ),
    ];
    let failure = aggregate(within(restorer.restore_records(records)).await.unwrap_err());

    assert_eq!(failure.faults.len(), 1);
    assert!(matches!(
        &failure.faults[0],
        Fault::Convert { table, key: Some(key), .. } if table == "Orders" && key.row_key == "2"
    ));
    assert_eq!(failure.partial.total_entities, 1);
}

#[tokio::test]
async fn clear_failure_skips_the_tables_records() {
    let store = instrumented(seeded_store(1000, &[("Orders", 10)]), None);
    store.fail_when(|call| matches!(call, StoreCall::Batch { table, .. } if table == "Orders"));
    let restorer = restorer(store.clone(), 4);

    let failure = aggregate(
        within(restorer.restore_records(table_records("Orders", 20, 2)))
            .await
            .unwrap_err(),
    );

    assert!(failure
        .faults
        .iter()
        .all(|f| matches!(f, Fault::ClearTable { table, .. } if table == "Orders")));
    assert_eq!(failure.faults.len(), 1);
    assert_eq!(failure.partial.tables.get("Orders"), Some(&0));
    assert_eq!(store.count(|c| matches!(c, StoreCall::Insert { .. })), 0);
    // The batch failed whole, so the table still holds its old rows.
    assert_eq!(store.inner().entity_count("Orders"), 10);
}

#[tokio::test]
async fn create_failure_is_reported_with_its_table() {
    let store = instrumented(InMemoryTableStore::new(), None);
    store.fail_when(|call| matches!(call, StoreCall::CreateTable { table } if table == "Orders"));
    let restorer = restorer(store.clone(), 4);

    let failure = aggregate(
        within(restorer.restore_records(vec![record("Orders", "A", "1")]))
            .await
            .unwrap_err(),
    );
    assert_eq!(failure.faults.len(), 1);
    assert_eq!(failure.faults[0].table(), Some("Orders"));
    assert!(matches!(
        failure.faults[0].store_error(),
        Some(StoreError::Injected(_))
    ));
}

#[tokio::test]
async fn in_flight_faults_are_all_collected() {
    let store = instrumented(InMemoryTableStore::new(), Some((5, 10)));
    store.fail_when(|call| matches!(call, StoreCall::Insert { table, .. } if table == "Orders"));
    let restorer = restorer(store.clone(), 8);

    let mut records = vec![marker("Orders")];
    records.extend(table_records("Orders", 6, 1));
    let failure = aggregate(within(restorer.restore_records(records)).await.unwrap_err());

    assert!(!failure.faults.is_empty());
    assert!(failure
        .faults
        .iter()
        .all(|f| matches!(f, Fault::Insert { table, .. } if table == "Orders")));
    assert_eq!(failure.partial.total_entities, 0);
    assert_eq!(store.active(), 0);
}

// ============================================================================
// Reconciliation after faults
// ============================================================================

#[tokio::test]
async fn early_close_skips_reconciliation() {
    let inner = InMemoryTableStore::new();
    inner.seed_table("Legacy", vec![stale_entity("x", "y")]);
    let store = instrumented(inner, None);
    store.fail_when(|call| matches!(call, StoreCall::Insert { key, .. } if key.row_key == "00000"));
    let restorer = restorer(store.clone(), 4);

    let failure = aggregate(
        within(restorer.restore_records(table_records("Orders", 50, 1)))
            .await
            .unwrap_err(),
    );
    assert_eq!(failure.faults.len(), 1);
    assert_eq!(failure.partial.deleted_tables, 0);
    assert!(store.inner().contains_table("Legacy"));
    assert_eq!(store.count(|c| matches!(c, StoreCall::ListTables)), 0);
}

#[tokio::test]
async fn delete_failure_is_a_fault() {
    let store = instrumented(seeded_store(1000, &[("Legacy", 1), ("Older", 1)]), None);
    store.fail_when(|call| matches!(call, StoreCall::DeleteTable { table } if table == "Legacy"));
    let restorer = restorer(store.clone(), 4);

    let failure = aggregate(
        within(restorer.restore_records(vec![record("Orders", "A", "1")]))
            .await
            .unwrap_err(),
    );
    assert_eq!(failure.faults.len(), 1);
    assert!(matches!(&failure.faults[0], Fault::DeleteTable { table, .. } if table == "Legacy"));
    assert_eq!(failure.partial.tables.get("Orders"), Some(&1));
    assert_eq!(failure.partial.deleted_tables, 1);
    assert_eq!(store.inner().table_names(), vec!["Legacy", "Orders"]);
}
