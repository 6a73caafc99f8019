// property_tests.rs
// Round trip and rollover arithmetic, checked with proptest

use honodb_core::{Collection, DatabaseConfig, MemoryBackend};
use proptest::prelude::*;
use serde_json::{json, Map, Value};
use std::sync::Arc;

fn open(max_chunk_bytes: u64) -> Collection<MemoryBackend> {
    let config = DatabaseConfig::new().max_chunk_bytes(max_chunk_bytes);
    Collection::open(Arc::new(MemoryBackend::new()), "db", "prop", &config)
        .unwrap()
        .0
}

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(Value::from),
        any::<bool>().prop_map(Value::from),
        "[a-zA-Z0-9 '\\\\\"]{0,12}".prop_map(Value::from),
        Just(Value::Null),
    ]
}

fn field_value() -> impl Strategy<Value = Value> {
    scalar().prop_recursive(2, 8, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,5}", inner, 0..3)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

fn document_body() -> impl Strategy<Value = Map<String, Value>> {
    prop::collection::btree_map("[a-z]{1,6}", field_value(), 0..6).prop_map(|m| {
        m.into_iter()
            .filter(|(k, _)| k != "id")
            .collect::<Map<String, Value>>()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// insertOne then find by id returns exactly the inserted document
    #[test]
    fn prop_insert_find_round_trip(
        id in prop_oneof![any::<i64>().prop_map(Value::from), "[a-z0-9-]{1,16}".prop_map(Value::from)],
        body in document_body(),
    ) {
        let coll = open(4096);
        let mut fields = Map::new();
        fields.insert("id".to_string(), id.clone());
        fields.extend(body);
        let doc = Value::Object(fields);

        coll.insert_one(doc.clone()).unwrap();
        let found: Vec<Value> = coll
            .find(&json!({ "id": id }))
            .unwrap()
            .to_vec()
            .unwrap()
            .into_iter()
            .map(|d| d.into_value())
            .collect();
        prop_assert_eq!(found, vec![doc]);
    }

    /// N documents of encoded size S with S dividing T give ceil(N*S/T) chunks, none over T
    #[test]
    fn prop_rollover_chunk_count(
        pad in 0usize..40,
        per_chunk in 2u64..6,
        n in 1u64..40,
    ) {
        // {"id":"000000","pad":"<pad>"}\n
        let record_size = 25 + pad as u64;
        let threshold = record_size * per_chunk;
        let coll = open(threshold);

        for i in 0..n {
            let doc = json!({ "id": format!("{:06}", i), "pad": "x".repeat(pad) });
            coll.insert_one(doc).unwrap();
        }

        let chunks = coll.chunks();
        let expected = (n * record_size + threshold - 1) / threshold;
        prop_assert_eq!(chunks.len() as u64, expected);
        prop_assert!(chunks.iter().all(|c| c.size <= threshold));
        prop_assert!(chunks.iter().all(|c| c.size % record_size == 0));
    }

    /// Rebuilding the index from the chunks reproduces the live index
    #[test]
    fn prop_rebuild_matches_live_index(
        ops in prop::collection::vec((0i64..12, 0u8..3), 1..40),
    ) {
        let coll = open(96);
        for (id, op) in ops {
            match op {
                0 => { let _ = coll.insert_one(json!({ "id": id, "v": 0 })); }
                1 => { let _ = coll.update_many(&json!({ "id": id }), &json!({ "v": "grown-value" })); }
                _ => { let _ = coll.delete_many(&json!({ "id": id })); }
            }
        }
        let live = coll.index_snapshot();
        coll.rebuild_index().unwrap();
        prop_assert_eq!(coll.index_snapshot(), live);
    }
}
