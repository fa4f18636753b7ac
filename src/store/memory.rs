//! In-memory subscription store.
//!
//! Not durable: all records are lost on restart. Used by tests and by
//! development runs (`storage = "memory"`).

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeSet, HashMap};
use tokio::sync::RwLock;

use super::{StoreResult, SubscriptionRecord, SubscriptionStore};
use crate::notifications::push::PushSubscription;

/// `HashMap` behind a `tokio::sync::RwLock`.
#[derive(Debug, Default)]
pub struct MemorySubscriptionStore {
    records: RwLock<HashMap<String, SubscriptionRecord>>,
}

impl MemorySubscriptionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubscriptionStore for MemorySubscriptionStore {
    async fn upsert(&self, identity: &str, subscription: PushSubscription) -> StoreResult<()> {
        let record = SubscriptionRecord {
            identity: identity.to_string(),
            subscription,
            updated_at: Utc::now(),
        };
        self.records.write().await.insert(identity.to_string(), record);
        Ok(())
    }

    async fn find_many(&self, identities: &BTreeSet<String>) -> StoreResult<Vec<SubscriptionRecord>> {
        let records = self.records.read().await;
        Ok(identities
            .iter()
            .filter_map(|identity| records.get(identity).cloned())
            .collect())
    }

    async fn get(&self, identity: &str) -> StoreResult<Option<SubscriptionRecord>> {
        Ok(self.records.read().await.get(identity).cloned())
    }

    async fn delete(&self, identity: &str) -> StoreResult<()> {
        self.records.write().await.remove(identity);
        Ok(())
    }

    async fn delete_if_endpoint(&self, identity: &str, endpoint: &str) -> StoreResult<bool> {
        let mut records = self.records.write().await;
        if records
            .get(identity)
            .is_some_and(|record| record.subscription.endpoint == endpoint)
        {
            records.remove(identity);
            return Ok(true);
        }
        Ok(false)
    }

    async fn len(&self) -> StoreResult<usize> {
        Ok(self.records.read().await.len())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn sub(n: u32) -> PushSubscription {
        PushSubscription::new(format!("https://push.example.com/{n}"), format!("key{n}"), format!("auth{n}"))
    }

    #[tokio::test]
    async fn test_upsert_replaces_existing_record() {
        let store = MemorySubscriptionStore::new();
        store.upsert("s1", sub(1)).await.expect("upsert");
        store.upsert("s1", sub(2)).await.expect("upsert");

        assert_eq!(store.len().await.expect("len"), 1);
        let record = store.get("s1").await.expect("get").expect("record exists");
        assert_eq!(record.subscription, sub(2));
    }

    #[tokio::test]
    async fn test_find_many_skips_missing_identities() {
        let store = MemorySubscriptionStore::new();
        store.upsert("a", sub(1)).await.expect("upsert");
        store.upsert("b", sub(2)).await.expect("upsert");

        let wanted: BTreeSet<String> = ["a", "c"].iter().map(|s| (*s).to_string()).collect();
        let found = store.find_many(&wanted).await.expect("find");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].identity, "a");
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = MemorySubscriptionStore::new();
        store.upsert("a", sub(1)).await.expect("upsert");
        store.delete("a").await.expect("delete");
        store.delete("a").await.expect("second delete");
        store.delete("never-existed").await.expect("delete missing");
        assert!(store.is_empty().await.expect("is_empty"));
    }

    #[tokio::test]
    async fn test_delete_if_endpoint_keeps_newer_subscription() {
        let store = MemorySubscriptionStore::new();
        store.upsert("a", sub(2)).await.expect("upsert");

        assert!(!store
            .delete_if_endpoint("a", "https://push.example.com/1")
            .await
            .expect("delete"));
        assert!(store.get("a").await.expect("get").is_some());

        assert!(store
            .delete_if_endpoint("a", "https://push.example.com/2")
            .await
            .expect("delete"));
        assert!(store.get("a").await.expect("get").is_none());
        assert!(!store.delete_if_endpoint("a", "https://push.example.com/2").await.expect("delete"));
    }

    #[tokio::test]
    async fn test_concurrent_upserts_for_distinct_identities() {
        let store = Arc::new(MemorySubscriptionStore::new());
        let mut handles = Vec::new();
        for n in 0..32 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.upsert(&format!("s{n}"), sub(n)).await
            }));
        }
        for handle in handles {
            handle.await.expect("join").expect("upsert");
        }
        assert_eq!(store.len().await.expect("len"), 32);
    }
}
