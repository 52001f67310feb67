use std::sync::Arc;

use confsync_cache::MemoryMirror;
use confsync_remote::mock::MemoryConfigStore;
use confsync_sync::{SyncConfig, SyncCoordinator};
use confsync_types::keys;
use proptest::prelude::*;
use serde_json::Value;

fn json_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[a-z#0-9 ]{0,16}".prop_map(Value::from),
    ];
    leaf.prop_recursive(2, 16, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z_]{1,8}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn set_then_get_returns_value(
        key_index in 0..keys::ALL.len(),
        reachable in any::<bool>(),
        values in prop::collection::vec(json_value(), 1..4),
    ) {
        let key = keys::ALL[key_index];
        runtime().block_on(async {
            let store = Arc::new(MemoryConfigStore::new());
            store.set_available(reachable);
            let coordinator =
                SyncCoordinator::new(store, Arc::new(MemoryMirror::new()), SyncConfig::default());
            coordinator.start().await;

            for value in values {
                coordinator.set(key, value.clone()).await.unwrap();
                prop_assert_eq!(coordinator.get(key), Some(value));
            }
            Ok(())
        })?;
    }
}
