use futures::executor::block_on;
use pretty_assertions::assert_eq;
use serde_json::json;
use shelf_core::store::{add_json, get_all_json, put_json};
use shelf_core::{MemoryRecordStore, Record, RecordId, RecordStore, StoreError};

fn id(value: u64) -> RecordId {
    RecordId::new(value).expect("non-zero id")
}

#[test]
fn insert_delete_fetch_example() {
    block_on(async {
        let store = MemoryRecordStore::new();
        let a = store.add(Record::new().with_field("name", "A")).await.unwrap();
        let b = store.add(Record::new().with_field("name", "B")).await.unwrap();
        assert_eq!((a, b), (id(1), id(2)));

        store.delete(a).await.unwrap();

        let json = get_all_json(&store).await.unwrap();
        assert_eq!(json, r#"[{"id":2,"name":"B"}]"#);
    });
}

#[test]
fn inserted_record_reads_back_without_caller_id() {
    block_on(async {
        let store = MemoryRecordStore::new();
        store.add(Record::new().with_field("name", "first")).await.unwrap();

        let input = r#"{"id":99,"name":"Soap","price":"12.5","favorite":true}"#;
        let new_id = add_json(&store, input).await.unwrap();
        assert_eq!(new_id, id(2));

        let stored = store
            .get_all()
            .await
            .unwrap()
            .into_iter()
            .find(|r| r.id == Some(new_id))
            .expect("record stored under returned id");
        let expected = Record::parse_for_insert(input).unwrap().with_id(new_id);
        assert_eq!(stored, expected);
        assert_eq!(stored.fields.get("favorite"), Some(&json!(true)));
    });
}

#[test]
fn identifiers_are_never_reused() {
    block_on(async {
        let store = MemoryRecordStore::new();
        let mut seen = Vec::new();
        for n in 0..5 {
            let new_id = store
                .add(Record::new().with_field("n", n))
                .await
                .unwrap();
            assert!(!seen.contains(&new_id));
            seen.push(new_id);
        }

        store.delete(id(5)).await.unwrap();
        let after_delete = store.add(Record::new()).await.unwrap();
        assert_eq!(after_delete, id(6));

        store.clear().await.unwrap();
        let after_clear = store.add(Record::new()).await.unwrap();
        assert_eq!(after_clear, id(7));
    });
}

#[test]
fn deleting_missing_id_is_a_no_op() {
    block_on(async {
        let store = MemoryRecordStore::new();
        store.add(Record::new().with_field("name", "A")).await.unwrap();
        let before = store.get_all().await.unwrap();

        store.delete(id(42)).await.unwrap();

        assert_eq!(store.get_all().await.unwrap(), before);
    });
}

#[test]
fn clear_then_fetch_is_empty() {
    block_on(async {
        let store = MemoryRecordStore::new();
        for name in ["A", "B", "C"] {
            store.add(Record::new().with_field("name", name)).await.unwrap();
        }
        store.clear().await.unwrap();
        assert!(store.get_all().await.unwrap().is_empty());
        assert_eq!(get_all_json(&store).await.unwrap(), "[]");
        assert!(store.is_empty().unwrap());
    });
}

#[test]
fn put_replaces_and_advances_generator() {
    block_on(async {
        let store = MemoryRecordStore::new();
        let a = add_json(&store, r#"{"name":"A"}"#).await.unwrap();

        put_json(&store, r#"{"id":1,"name":"A2"}"#).await.unwrap();
        put_json(&store, r#"{"id":10,"name":"J"}"#).await.unwrap();

        let records = store.get_all().await.unwrap();
        assert_eq!(
            records,
            vec![
                Record::new().with_field("name", "A2").with_id(a),
                Record::new().with_field("name", "J").with_id(id(10)),
            ]
        );

        let next = store.add(Record::new()).await.unwrap();
        assert_eq!(next, id(11));
    });
}

#[test]
fn malformed_put_is_rejected_before_storage() {
    block_on(async {
        let store = MemoryRecordStore::new();
        for bad in [r#"{"name":"no id"}"#, r#"{"id":"x"}"#, "42"] {
            let err = put_json(&store, bad).await.expect_err(bad);
            assert!(matches!(err, StoreError::Malformed(_)), "{bad}: {err}");
        }

        let err = store.put(Record::new().with_field("name", "x")).await.unwrap_err();
        assert!(matches!(err, StoreError::Malformed(_)));
        assert!(store.is_empty().unwrap());
    });
}
