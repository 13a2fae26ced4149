//! Integration tests for direct member access, raw values and value pipelines.

#[macro_use]
mod common;

use std::collections::BTreeMap;

use common::{
    all_keys, full_person, get_raw, person, person_key, phone, put_raw, Email, PersonSchema, Phones,
};
use strata::backends::{RedbConfig, RedbEngine};
use strata::{
    BincodeMarshaling, CompositeStore, GzipFiltering, JsonMarshaling, Key, Separator,
    StorageEngine, StoreConfig, StoreError, Transaction,
};

// ============================================================================
// Singletons
// ============================================================================

fn test_singleton_put_get<E: StorageEngine>(engine: &E) {
    let store = CompositeStore::new();

    let mut tx = engine.begin_write().expect("failed to begin write");
    store
        .put_composite_singleton::<Email>(&mut tx, &9, Some(&"nine@example.com".to_string()))
        .expect("failed to put singleton");
    tx.commit().expect("failed to commit");

    let tx = engine.begin_read().expect("failed to begin read");
    assert!(store.has_composite::<PersonSchema>(&tx, &9).expect("has composite"));
    let email = store.get_composite_singleton::<Email>(&tx, &9).expect("failed to get singleton");
    assert_eq!(email.as_deref(), Some("nine@example.com"));

    let composite = store
        .get_composite::<PersonSchema>(&tx, &9)
        .expect("failed to get")
        .expect("composite not found");
    assert_eq!(composite.value.email.as_deref(), Some("nine@example.com"));
}

fn test_singleton_delete<E: StorageEngine>(engine: &E) {
    let store = CompositeStore::new();

    let mut tx = engine.begin_write().expect("failed to begin write");
    store.put_composite::<PersonSchema>(&mut tx, &full_person(1)).expect("failed to put");
    store.put_composite_singleton::<Email>(&mut tx, &1, None).expect("failed to clear singleton");
    tx.commit().expect("failed to commit");

    let tx = engine.begin_read().expect("failed to begin read");
    assert_eq!(store.get_composite_singleton::<Email>(&tx, &1).expect("failed to get"), None);
    assert!(store.has_composite::<PersonSchema>(&tx, &1).expect("has composite"));
}

fn test_singleton_decode_failure_is_an_error<E: StorageEngine>(engine: &E) {
    put_raw(engine, &person_key(1).tagged("email", None), b"not json");

    let tx = engine.begin_read().expect("failed to begin read");
    let err = CompositeStore::new()
        .get_composite_singleton::<Email>(&tx, &1)
        .expect_err("corrupt singleton should fail a direct read");
    assert!(matches!(err, StoreError::Encoding(_)));
}

// ============================================================================
// Collections
// ============================================================================

fn test_collection_put_get<E: StorageEngine>(engine: &E) {
    let store = CompositeStore::new();
    let phones = BTreeMap::from([
        ("home".to_string(), Some(phone("555-1000", false))),
        ("cell".to_string(), Some(phone("555-2000", true))),
    ]);

    let mut tx = engine.begin_write().expect("failed to begin write");
    store.put_composite_collection::<Phones>(&mut tx, &3, &phones).expect("failed to put");
    tx.commit().expect("failed to commit");

    let tx = engine.begin_read().expect("failed to begin read");
    assert!(store.has_composite::<PersonSchema>(&tx, &3).expect("has composite"));
    let read = store.get_composite_collection::<Phones>(&tx, &3).expect("failed to get");
    assert_eq!(read, phones);
    assert_eq!(read.keys().collect::<Vec<_>>(), vec!["cell", "home"]);
}

fn test_collection_update_keeps_unlisted_items<E: StorageEngine>(engine: &E) {
    let store = CompositeStore::new();

    let mut tx = engine.begin_write().expect("failed to begin write");
    store.put_composite::<PersonSchema>(&mut tx, &full_person(1)).expect("failed to put");
    let update = BTreeMap::from([
        ("p1".to_string(), None),
        ("p4".to_string(), Some(phone("555-0104", false))),
    ]);
    store.put_composite_collection::<Phones>(&mut tx, &1, &update).expect("failed to put");
    tx.commit().expect("failed to commit");

    let tx = engine.begin_read().expect("failed to begin read");
    let read = store.get_composite_collection::<Phones>(&tx, &1).expect("failed to get");
    assert_eq!(read.keys().collect::<Vec<_>>(), vec!["p2", "p3", "p4"]);
}

fn test_collection_decode_failure_is_an_error<E: StorageEngine>(engine: &E) {
    let store = CompositeStore::new();
    let mut tx = engine.begin_write().expect("failed to begin write");
    store.put_composite::<PersonSchema>(&mut tx, &full_person(1)).expect("failed to put");
    tx.commit().expect("failed to commit");
    put_raw(engine, &person_key(1).tagged("phones", Some("p3".into())), b"[1,2");

    let tx = engine.begin_read().expect("failed to begin read");
    let err = store
        .get_composite_collection::<Phones>(&tx, &1)
        .expect_err("corrupt item should fail a direct read");
    assert!(matches!(err, StoreError::Encoding(_)));
}

fn test_missing_collection_is_empty<E: StorageEngine>(engine: &E) {
    let tx = engine.begin_read().expect("failed to begin read");
    let read = CompositeStore::new()
        .get_composite_collection::<Phones>(&tx, &1)
        .expect("failed to get");
    assert!(read.is_empty());
}

// ============================================================================
// Raw values
// ============================================================================

fn test_value_operations<E: StorageEngine>(engine: &E) {
    let store = CompositeStore::new();
    let key = Key::new("meta").with_identifier("schema-version");

    let mut tx = engine.begin_write().expect("failed to begin write");
    assert!(!store.has_value(&tx, &key).expect("has value"));
    store.put_value(&mut tx, &key, &3u32).expect("failed to put value");
    tx.commit().expect("failed to commit");

    let mut tx = engine.begin_write().expect("failed to begin write");
    assert!(store.has_value(&tx, &key).expect("has value"));
    assert_eq!(store.get_value::<u32>(&tx, &key).expect("failed to get value"), Some(3));
    assert!(store.del_value(&mut tx, &key).expect("failed to delete value"));
    assert!(!store.del_value(&mut tx, &key).expect("failed to delete value"));
    assert_eq!(store.get_value::<u32>(&tx, &key).expect("failed to get value"), None);
    tx.commit().expect("failed to commit");

    assert!(all_keys(engine).is_empty());
}

fn test_value_type_mismatch<E: StorageEngine>(engine: &E) {
    let store = CompositeStore::new();
    let key = Key::new("meta").with_identifier("owner");

    let mut tx = engine.begin_write().expect("failed to begin write");
    store.put_value(&mut tx, &key, "ada").expect("failed to put value");
    let err = store.get_value::<u64>(&tx, &key).expect_err("string is not a u64");
    assert!(matches!(err, StoreError::Encoding(_)));
}

backend_tests!(
    test_singleton_put_get,
    test_singleton_delete,
    test_singleton_decode_failure_is_an_error,
    test_collection_put_get,
    test_collection_update_keeps_unlisted_items,
    test_collection_decode_failure_is_an_error,
    test_missing_collection_is_empty,
    test_value_operations,
    test_value_type_mismatch,
);

// ============================================================================
// Value pipelines and configuration
// ============================================================================

#[test]
fn test_gzip_store_round_trip() {
    let engine = common::memory_engine();
    let store = CompositeStore::new().with_filtering(GzipFiltering::new());

    let mut tx = engine.begin_write().expect("failed to begin write");
    store.put_composite::<PersonSchema>(&mut tx, &full_person(1)).expect("failed to put");
    tx.commit().expect("failed to commit");

    let raw = get_raw(&engine, &person_key(1)).expect("root row missing");
    assert_eq!(&raw[..2], &[0x1f, 0x8b], "root row should be gzip framed");

    let tx = engine.begin_read().expect("failed to begin read");
    let composite = store
        .get_composite::<PersonSchema>(&tx, &1)
        .expect("failed to get")
        .expect("composite not found");
    assert!(composite.is_complete());
    assert_eq!(composite.value, full_person(1));

    // A plain store cannot read gzip rows: every member fails, none are fatal.
    let plain = CompositeStore::new()
        .get_composite::<PersonSchema>(&tx, &1)
        .expect("failed to get")
        .expect("composite not found");
    assert_eq!(plain.member_errors.len(), 5);
    assert_eq!(plain.value, person(1, ""));
}

#[test]
fn test_bincode_gzip_store_round_trip() {
    let engine = common::redb_engine();
    let store = CompositeStore::new()
        .with_marshaling(BincodeMarshaling)
        .with_filtering(GzipFiltering::new().with_level(9));

    let mut tx = engine.begin_write().expect("failed to begin write");
    for id in 1..=3 {
        store.put_composite::<PersonSchema>(&mut tx, &full_person(id)).expect("failed to put");
    }
    tx.commit().expect("failed to commit");

    let tx = engine.begin_read().expect("failed to begin read");
    let all = store.get_composite_all::<PersonSchema>(&tx).expect("failed to read all");
    let values: Vec<_> = all.into_iter().map(|c| c.value).collect();
    assert_eq!(values, (1..=3).map(full_person).collect::<Vec<_>>());
}

#[test]
fn test_gzip_decompression_limit_reports_member_error() {
    let engine = common::memory_engine();
    let writer = CompositeStore::new().with_filtering(GzipFiltering::new());
    let reader =
        CompositeStore::new().with_filtering(GzipFiltering::new().with_max_unfiltered_size(8));

    let mut p = person(1, "a name long enough to pass the limit");
    p.email = Some("x@y".to_string());
    let mut tx = engine.begin_write().expect("failed to begin write");
    writer.put_composite::<PersonSchema>(&mut tx, &p).expect("failed to put");
    tx.commit().expect("failed to commit");

    let tx = engine.begin_read().expect("failed to begin read");
    let composite = reader
        .get_composite::<PersonSchema>(&tx, &1)
        .expect("failed to get")
        .expect("composite not found");
    assert_eq!(composite.value.email.as_deref(), Some("x@y"));
    assert_eq!(composite.member_errors.len(), 1);
    assert_eq!(composite.member_errors[0].kind, strata::MemberKind::Root);
}

#[test]
fn test_custom_table_and_separator() {
    let engine = common::memory_engine();
    let config = StoreConfig::new()
        .with_table("people")
        .with_separator(Separator::new(0x1E, 0x1F).expect("valid separator"));
    let store = CompositeStore::new().with_config(config).with_marshaling(JsonMarshaling);

    let mut tx = engine.begin_write().expect("failed to begin write");
    store.put_composite::<PersonSchema>(&mut tx, &full_person(1)).expect("failed to put");
    tx.commit().expect("failed to commit");

    // Nothing lands in the default table.
    assert!(all_keys(&engine).is_empty());

    let tx = engine.begin_read().expect("failed to begin read");
    let raw = person_key(1).to_bytes(store.config().separator).expect("failed to encode key");
    assert_eq!(raw, b"per\x1e00000000000000000001\x1e".to_vec());
    assert_eq!(
        tx.get("people", &raw).expect("failed to get").as_deref(),
        Some(br#"{"name":"person-1"}"#.as_slice())
    );
    let composite = store
        .get_composite::<PersonSchema>(&tx, &1)
        .expect("failed to get")
        .expect("composite not found");
    assert_eq!(composite.value, full_person(1));
}

#[test]
fn test_persistence_across_reopen() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let path = dir.path().join("people.redb");
    let store = CompositeStore::new();

    {
        let engine = RedbEngine::open_with_config(&path, RedbConfig::new())
            .expect("failed to open engine");
        let mut tx = engine.begin_write().expect("failed to begin write");
        store.put_composite::<PersonSchema>(&mut tx, &full_person(1)).expect("failed to put");
        tx.commit().expect("failed to commit");
    }

    let engine = RedbEngine::open(&path).expect("failed to reopen engine");
    let tx = engine.begin_read().expect("failed to begin read");
    let composite = store
        .get_composite::<PersonSchema>(&tx, &1)
        .expect("failed to get")
        .expect("composite not found after reopen");
    assert_eq!(composite.value, full_person(1));
}
