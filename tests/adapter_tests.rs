#[cfg(test)]
mod adapter_tests {
    use serde_json::{json, Value};
    use std::sync::Arc;
    use table_cache::{CacheError, TableCache};
    use tempfile::TempDir;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_set_get_remove_round_trip() {
        let _ = env_logger::try_init();
        let cache = TableCache::in_memory();

        cache
            .set_item("a", json!({"x": 1}))
            .await
            .expect("set_item failed");
        assert_eq!(cache.get_item("a").await.unwrap(), json!({"x": 1}));

        assert_eq!(
            cache.get_item_or("b", json!("none")).await.unwrap(),
            json!("none")
        );

        cache.remove_item("a").await.expect("remove_item failed");
        assert_eq!(
            cache.get_item_or("a", json!("gone")).await.unwrap(),
            json!("gone")
        );
    }

    #[tokio::test]
    async fn test_clear_removes_every_entry() {
        let _ = env_logger::try_init();
        let cache = TableCache::in_memory();

        cache.set_item("a", json!({"x": 1})).await.unwrap();
        cache.set_item("b", json!([1, 2, 3])).await.unwrap();
        cache.set_item("c", json!("text")).await.unwrap();

        cache.clear().await.expect("clear failed");

        for key in ["a", "b", "c"] {
            assert_eq!(
                cache.get_item_or(key, json!("gone")).await.unwrap(),
                json!("gone")
            );
        }
        assert_eq!(cache.entry_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cache_survives_reopen() {
        let _ = env_logger::try_init();
        let temp_dir = TempDir::new().unwrap();
        let store_path = temp_dir.path().join("table_cache.db");

        {
            let cache = TableCache::new(store_path.clone());
            cache
                .set_item("fee_rates", json!({"fast": 12, "average": 7}))
                .await
                .unwrap();
        }

        let reopened = TableCache::new(store_path);
        assert_eq!(
            reopened.get_item("fee_rates").await.unwrap(),
            json!({"fast": 12, "average": 7})
        );
    }

    #[tokio::test]
    async fn test_mixed_value_types_round_trip() {
        let _ = env_logger::try_init();
        let cache = TableCache::in_memory();

        let values = vec![
            ("object", json!({"x": 1, "nested": {"y": [1, 2]}})),
            ("array", json!([1, "two", 3.5, null])),
            ("string", json!("plain")),
            ("number", json!(42.5)),
            ("bool", json!(true)),
        ];

        for (key, value) in &values {
            cache.set_item(key, value.clone()).await.unwrap();
        }
        for (key, value) in &values {
            assert_eq!(&cache.get_item(key).await.unwrap(), value);
        }
    }

    #[tokio::test]
    async fn test_failed_open_rejects_first_call_only() {
        let _ = env_logger::try_init();
        let temp_dir = TempDir::new().unwrap();

        // A plain file where the store directory should go makes the
        // open fail deterministically.
        let blocker = temp_dir.path().join("blocker");
        std::fs::write(&blocker, b"occupied").unwrap();

        let cache = TableCache::new(blocker.join("table_cache.db"));

        let err = cache.set_item("k", json!(1)).await.unwrap_err();
        assert!(matches!(err, CacheError::StoreOpen(_)));

        // Later calls resolve benignly instead of erroring
        assert_eq!(
            cache.get_item_or("k", json!("fallback")).await.unwrap(),
            json!("fallback")
        );
        assert_eq!(cache.get_item("k").await.unwrap(), Value::Null);
        assert!(cache.set_item("k", json!(2)).await.is_ok());
        assert!(cache.remove_item("k").await.is_ok());
        assert!(cache.clear().await.is_ok());

        // The observability surface keeps reporting the failure
        assert!(cache.health_check().await.is_err());
    }

    #[tokio::test]
    async fn test_concurrent_first_callers_share_one_open() {
        let _ = env_logger::try_init();
        let temp_dir = TempDir::new().unwrap();
        let cache = Arc::new(TableCache::new(temp_dir.path().join("table_cache.db")));

        let mut handles = Vec::new();
        for i in 0..10 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                cache.set_item(&format!("key-{}", i), json!(i)).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().expect("set_item failed");
        }

        assert_eq!(cache.entry_count().await.unwrap(), 10);
        for i in 0..10 {
            assert_eq!(
                cache.get_item(&format!("key-{}", i)).await.unwrap(),
                json!(i)
            );
        }
    }

    #[tokio::test]
    async fn test_inspection_surface() {
        let _ = env_logger::try_init();
        let cache = TableCache::in_memory();
        tokio_test::assert_ok!(cache.health_check().await);

        cache.set_item("b", json!([1, 2])).await.unwrap();
        cache.set_item("a", json!("text")).await.unwrap();

        assert_eq!(
            cache.keys().await.unwrap(),
            vec!["a".to_string(), "b".to_string()]
        );
        assert_eq!(cache.entry_count().await.unwrap(), 2);

        let entry = cache.entry("b").await.unwrap().expect("entry missing");
        assert_eq!(entry.key, "b");
        assert_eq!(entry.value, json!([1, 2]));

        assert!(cache.last_updated("a").await.unwrap().is_some());
        assert!(cache.last_updated("zzz").await.unwrap().is_none());
        assert!(cache.entry("zzz").await.unwrap().is_none());

        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.entries, 2);
        assert!(stats.last_updated.is_some());
    }
}
