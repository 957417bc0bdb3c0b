//! Archive codecs
//!
//! Gzip, zstd and plain JSON archives restore identically, whether the
//! codec is named in the config or detected from the stream.

use crate::common::*;
use std::io::Cursor;
use tablekeep::ArchiveError;

fn records() -> Vec<Record> {
    let mut records = table_records("Orders", 30, 3);
    records.push(marker("Empty"));
    records
}

fn restorer_with(store: Instrumented, compression: Compression) -> Restorer<Instrumented> {
    init_tracing();
    let config = RestoreConfig::default()
        .with_concurrency(6)
        .with_compression(compression);
    Restorer::new(store, config).unwrap()
}

async fn restore_bytes(bytes: Vec<u8>, compression: Compression) -> (RestoreSummary, Instrumented) {
    let store = instrumented(InMemoryTableStore::new(), None);
    let restorer = restorer_with(store.clone(), compression);
    let summary = within(restorer.restore_from_reader(Cursor::new(bytes)))
        .await
        .unwrap();
    (summary, store)
}

#[tokio::test]
async fn gzip_file_restores() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("backup.json.gz");
    std::fs::write(&path, archive_bytes(&records(), Compression::Gzip)).unwrap();

    let store = instrumented(InMemoryTableStore::new(), None);
    let summary = within(restorer(store.clone(), 6).restore_from_file(&path))
        .await
        .unwrap();
    assert_eq!(summary.total_entities, 30);
    assert_eq!(store.inner().table_names(), vec!["Empty", "Orders"]);
}

#[tokio::test]
async fn explicit_codecs_restore() {
    for codec in [Compression::Gzip, Compression::Zstd, Compression::None] {
        let (summary, store) = restore_bytes(archive_bytes(&records(), codec), codec).await;
        assert_eq!(summary.total_entities, 30, "{}", codec.name());
        assert_eq!(store.inner().entity_count("Orders"), 30, "{}", codec.name());
    }
}

#[tokio::test]
async fn auto_detection_matches_explicit_codec() {
    let mut restored = Vec::new();
    for codec in [Compression::Gzip, Compression::Zstd, Compression::None] {
        let bytes = archive_bytes(&records(), codec);
        let (_, store) = restore_bytes(bytes, Compression::Auto).await;
        restored.push(contents(store.inner()));
    }
    assert!(restored.windows(2).all(|w| w[0] == w[1]));
}

#[tokio::test]
async fn wrong_codec_is_a_stream_fault() {
    let store = instrumented(InMemoryTableStore::new(), None);
    let bytes = archive_bytes(&records(), Compression::None);
    let restorer = restorer_with(store.clone(), Compression::Gzip);
    let err = within(restorer.restore_from_reader(Cursor::new(bytes)))
        .await
        .unwrap_err();
    assert!(
        matches!(
            err,
            RestoreError::Stream(ArchiveError::Decompression { .. } | ArchiveError::Io(_))
        ),
        "got {err:?}"
    );
    assert!(store.inner().table_names().is_empty());
}

#[tokio::test]
async fn empty_archive_restores_nothing() {
    let bytes = archive_bytes(&[], Compression::Gzip);
    let (summary, store) = restore_bytes(bytes, Compression::Auto).await;
    assert!(summary.tables.is_empty());
    assert_eq!(store.calls(), vec![StoreCall::ListTables]);
}
