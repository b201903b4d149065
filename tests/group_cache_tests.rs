//! Integration Tests for Group Caches
//!
//! Exercises the cache contract through the public API on the in-memory backend.

use std::sync::Arc;

use group_cache::cache::{Cache, GroupCache};
use group_cache::client::StoreClient;
use group_cache::config::Config;
use group_cache::store::MemoryStore;

// == Helper Functions ==

fn shared_client() -> Arc<StoreClient> {
    Arc::new(StoreClient::new(Arc::new(MemoryStore::new()), &Config::default()))
}

// == Contract Tests ==

#[tokio::test]
async fn test_roundtrip_and_tombstone() {
    let cache = GroupCache::with_client("Mapper", shared_client());

    cache.put_object("user:1", &vec![1, 2, 3]).await.unwrap();
    assert_eq!(
        cache.get_object::<_, Vec<i32>>("user:1").await.unwrap(),
        Some(vec![1, 2, 3])
    );

    let removed: Option<Vec<i32>> = cache.remove_object("user:1").await.unwrap();
    assert_eq!(removed, Some(vec![1, 2, 3]));
    assert_eq!(cache.get_object::<_, Vec<i32>>("user:1").await.unwrap(), None);
}

#[tokio::test]
async fn test_clear_is_isolated_between_groups() {
    let client = shared_client();
    let users = GroupCache::with_client("UserMapper", Arc::clone(&client));
    let orders = GroupCache::with_client("OrderMapper", client);

    for i in 0..10 {
        users.put_object(&format!("user {}", i), &i).await.unwrap();
        orders.put_object(&format!("order {}", i), &i).await.unwrap();
    }

    users.clear().await.unwrap();

    for i in 0..10 {
        assert_eq!(users.get_object::<_, i32>(&format!("user {}", i)).await.unwrap(), None);
        assert_eq!(
            orders.get_object::<_, i32>(&format!("order {}", i)).await.unwrap(),
            Some(i)
        );
    }
}

#[tokio::test]
async fn test_clear_is_idempotent() {
    let cache = GroupCache::with_client("Mapper", shared_client());
    cache.put_object("k", "v").await.unwrap();

    cache.clear().await.unwrap();
    cache.clear().await.unwrap();

    assert!(cache.members().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_clear_never_used_group() {
    let cache = GroupCache::with_client("Untouched", shared_client());

    cache.clear().await.unwrap();

    assert!(cache.members().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_put_after_clear_is_tracked() {
    let cache = GroupCache::with_client("Mapper", shared_client());
    cache.put_object("a", "1").await.unwrap();
    cache.clear().await.unwrap();

    cache.put_object("b", "2").await.unwrap();

    assert_eq!(cache.members().await.unwrap().len(), 1);
    cache.clear().await.unwrap();
    assert_eq!(cache.get_object::<_, String>("b").await.unwrap(), None);
}

#[tokio::test]
async fn test_oversized_key() {
    let cache = GroupCache::with_client("Mapper", shared_client());
    let key = "x".repeat(1024);

    cache.put_object(&key, "long").await.unwrap();

    assert_eq!(
        cache.get_object::<_, String>(&key).await.unwrap().as_deref(),
        Some("long")
    );
    assert!(cache
        .members()
        .await
        .unwrap()
        .iter()
        .all(|member| member.len() <= 250));
}

#[tokio::test]
async fn test_compressed_values_roundtrip() {
    let config = Config {
        compression: true,
        ..Config::default()
    };
    let client = Arc::new(StoreClient::new(Arc::new(MemoryStore::new()), &config));
    let cache = GroupCache::with_client("Mapper", client);
    let value = "repeated ".repeat(500);

    cache.put_object("big", &value).await.unwrap();

    assert_eq!(cache.get_object::<_, String>("big").await.unwrap(), Some(value));
}

// == Concurrency Tests ==

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_writers_all_tracked() {
    let client = shared_client();
    let mut writers = Vec::new();

    for writer in 0..20 {
        let cache = GroupCache::with_client("Mapper", Arc::clone(&client));
        writers.push(tokio::spawn(async move {
            for i in 0..100 {
                let key = format!("{}-{}", writer, i);
                cache.put_object(&key, &i).await.unwrap();
            }
        }));
    }
    for writer in writers {
        writer.await.unwrap();
    }

    let cache = GroupCache::with_client("Mapper", client);
    assert_eq!(cache.members().await.unwrap().len(), 2000);

    cache.clear().await.unwrap();
    for writer in 0..20 {
        for i in 0..100 {
            let key = format!("{}-{}", writer, i);
            assert_eq!(cache.get_object::<_, i32>(&key).await.unwrap(), None);
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_clear_racing_writers_leaves_no_untracked_entries() {
    let client = shared_client();
    let cache = GroupCache::with_client("Mapper", Arc::clone(&client));

    let writer = {
        let cache = cache.clone();
        tokio::spawn(async move {
            for i in 0..200 {
                cache.put_object(&i, &i).await.unwrap();
            }
        })
    };
    for _ in 0..10 {
        cache.clear().await.unwrap();
        tokio::task::yield_now().await;
    }
    writer.await.unwrap();

    // Every entry still readable must still be listed, so a final clear evicts it
    let members = cache.members().await.unwrap();
    for i in 0..200 {
        if cache.get_object::<_, i32>(&i).await.unwrap().is_some() {
            assert!(members.contains(&client.keys().to_store_key(&i)));
        }
    }
    cache.clear().await.unwrap();
    for i in 0..200 {
        assert_eq!(cache.get_object::<_, i32>(&i).await.unwrap(), None);
    }
}
