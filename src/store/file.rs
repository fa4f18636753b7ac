//! File-backed subscription store.
//!
//! Keeps every record in memory and rewrites `subscriptions.json` in the
//! data directory after each mutation, while still holding the write lock.
//! A failed write rolls the in-memory map back so memory and disk agree.
//!
//! # Storage structure
//!
//! ```text
//! <data_dir>/
//!     subscriptions.json     # { "<identity>": SubscriptionRecord, ... }  (mode 0600)
//! ```

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use tokio::sync::RwLock;

use super::snapshot::SnapshotFile;
use super::{StoreError, StoreResult, SubscriptionRecord, SubscriptionStore};
use crate::constants;
use crate::notifications::push::PushSubscription;

/// Subscription store persisted as a JSON snapshot.
#[derive(Debug)]
pub struct FileSubscriptionStore {
    file: SnapshotFile,
    records: RwLock<HashMap<String, SubscriptionRecord>>,
}

impl FileSubscriptionStore {
    /// Open (or start) the store in `data_dir`.
    ///
    /// Fails if an existing snapshot cannot be read or parsed; an unreadable
    /// store must not silently start empty and overwrite it.
    pub fn open(data_dir: &Path) -> Result<Self> {
        let file = SnapshotFile::new(data_dir.join(constants::SUBSCRIPTIONS_FILE));
        let records: HashMap<String, SubscriptionRecord> = file.load()?;
        log::info!(
            "[Store] Loaded {} push subscription(s) from {:?}",
            records.len(),
            file.path()
        );
        Ok(Self {
            file,
            records: RwLock::new(records),
        })
    }
}

fn unavailable(err: &anyhow::Error) -> StoreError {
    StoreError::Unavailable(format!("{err:#}"))
}

#[async_trait]
impl SubscriptionStore for FileSubscriptionStore {
    async fn upsert(&self, identity: &str, subscription: PushSubscription) -> StoreResult<()> {
        let record = SubscriptionRecord {
            identity: identity.to_string(),
            subscription,
            updated_at: Utc::now(),
        };

        let mut records = self.records.write().await;
        let previous = records.insert(identity.to_string(), record);

        if let Err(e) = self.file.save(&*records).await {
            match previous {
                Some(previous) => records.insert(identity.to_string(), previous),
                None => records.remove(identity),
            };
            log::error!("[Store] Failed to persist subscription: {e:#}");
            return Err(unavailable(&e));
        }
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
        let mut records = self.records.write().await;
        let Some(previous) = records.remove(identity) else {
            return Ok(());
        };

        if let Err(e) = self.file.save(&*records).await {
            records.insert(identity.to_string(), previous);
            log::error!("[Store] Failed to persist subscription removal: {e:#}");
            return Err(unavailable(&e));
        }
        Ok(())
    }

    async fn delete_if_endpoint(&self, identity: &str, endpoint: &str) -> StoreResult<bool> {
        let mut records = self.records.write().await;
        let still_current = records
            .get(identity)
            .is_some_and(|record| record.subscription.endpoint == endpoint);
        if !still_current {
            return Ok(false);
        }
        let Some(previous) = records.remove(identity) else {
            return Ok(false);
        };

        if let Err(e) = self.file.save(&*records).await {
            records.insert(identity.to_string(), previous);
            log::error!("[Store] Failed to persist subscription removal: {e:#}");
            return Err(unavailable(&e));
        }
        Ok(true)
    }

    async fn len(&self) -> StoreResult<usize> {
        Ok(self.records.read().await.len())
    }

    fn backend_name(&self) -> &'static str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sub(n: u32) -> PushSubscription {
        PushSubscription::new(format!("https://push.example.com/{n}"), format!("key{n}"), format!("auth{n}"))
    }

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let dir = tempfile::TempDir::new().expect("tempdir");

        let store = FileSubscriptionStore::open(dir.path()).expect("open");
        store.upsert("s1", sub(1)).await.expect("upsert");
        store.upsert("s2", sub(2)).await.expect("upsert");
        store.delete("s2").await.expect("delete");
        drop(store);

        let reopened = FileSubscriptionStore::open(dir.path()).expect("reopen");
        assert_eq!(reopened.len().await.expect("len"), 1);
        let record = reopened.get("s1").await.expect("get").expect("s1 persisted");
        assert_eq!(record.subscription, sub(1));
        assert!(reopened.get("s2").await.expect("get").is_none());
    }

    #[tokio::test]
    async fn test_upsert_replaces_on_disk() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let store = FileSubscriptionStore::open(dir.path()).expect("open");
        store.upsert("s1", sub(1)).await.expect("upsert");
        store.upsert("s1", sub(9)).await.expect("upsert");

        let reopened = FileSubscriptionStore::open(dir.path()).expect("reopen");
        let record = reopened.get("s1").await.expect("get").expect("record");
        assert_eq!(record.subscription, sub(9));
    }

    #[tokio::test]
    async fn test_delete_missing_does_not_touch_disk() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let store = FileSubscriptionStore::open(dir.path()).expect("open");
        store.delete("ghost").await.expect("delete");
        assert!(!dir.path().join(constants::SUBSCRIPTIONS_FILE).exists());
    }

    #[tokio::test]
    async fn test_interleaved_writes_for_one_identity_stay_consistent() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let store = std::sync::Arc::new(FileSubscriptionStore::open(dir.path()).expect("open"));

        let mut handles = Vec::new();
        for n in 0..24u32 {
            let store = std::sync::Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                if n % 3 == 2 {
                    store.delete("s1").await
                } else {
                    store.upsert("s1", sub(n)).await
                }
            }));
        }
        for handle in handles {
            handle.await.expect("join").expect("write");
        }

        let in_memory = store.get("s1").await.expect("get");
        let written: Vec<PushSubscription> = (0..24).filter(|n| n % 3 != 2).map(sub).collect();
        if let Some(record) = &in_memory {
            assert!(written.contains(&record.subscription));
        }
        assert!(store.len().await.expect("len") <= 1);

        let reopened = FileSubscriptionStore::open(dir.path()).expect("reopen");
        let on_disk = reopened.get("s1").await.expect("get");
        assert_eq!(
            on_disk.map(|record| record.subscription),
            in_memory.map(|record| record.subscription)
        );
    }

    #[tokio::test]
    async fn test_descriptor_members_survive_reopen() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let submitted: PushSubscription = serde_json::from_value(serde_json::json!({
            "endpoint": "https://push.example.com/1",
            "expirationTime": null,
            "keys": {"p256dh": "k", "auth": "a"}
        }))
        .expect("descriptor");

        let store = FileSubscriptionStore::open(dir.path()).expect("open");
        store.upsert("s1", submitted.clone()).await.expect("upsert");
        drop(store);

        let reopened = FileSubscriptionStore::open(dir.path()).expect("reopen");
        let record = reopened.get("s1").await.expect("get").expect("record");
        assert_eq!(record.subscription, submitted);
        assert!(record.subscription.extra.contains_key("expirationTime"));
    }

    #[test]
    fn test_open_rejects_corrupt_snapshot() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        std::fs::write(dir.path().join(constants::SUBSCRIPTIONS_FILE), "[[[").expect("write");
        assert!(FileSubscriptionStore::open(dir.path()).is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_write_rolls_back() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::TempDir::new().expect("tempdir");
        let data_dir = dir.path().join("data");
        std::fs::create_dir_all(&data_dir).expect("mkdir");
        let store = FileSubscriptionStore::open(&data_dir).expect("open");
        store.upsert("s1", sub(1)).await.expect("upsert");

        std::fs::set_permissions(&data_dir, std::fs::Permissions::from_mode(0o500)).expect("chmod");
        let canary = data_dir.join("canary");
        let writable = std::fs::write(&canary, b"x").is_ok();
        if writable {
            // Running as root: permissions are not enforced, nothing to test.
            let _ = std::fs::remove_file(&canary);
            std::fs::set_permissions(&data_dir, std::fs::Permissions::from_mode(0o700)).expect("chmod");
            return;
        }

        let result = store.upsert("s1", sub(2)).await;
        std::fs::set_permissions(&data_dir, std::fs::Permissions::from_mode(0o700)).expect("chmod");

        assert!(matches!(result, Err(StoreError::Unavailable(_))));
        let record = store.get("s1").await.expect("get").expect("record kept");
        assert_eq!(record.subscription, sub(1));
    }
}
