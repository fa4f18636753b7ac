//! Subscription record storage.
//!
//! Maps a client identity to at most one push subscription. Two engines
//! implement [`SubscriptionStore`]:
//!
//! - [`memory::MemorySubscriptionStore`] - process-local, lost on restart
//! - [`file::FileSubscriptionStore`] - same map, snapshotted to a JSON file
//!   on every mutation
//!
//! Both serialize writes behind a single `tokio::sync::RwLock`, so concurrent
//! upserts/deletes for the same identity never tear; the last writer wins.

pub mod file;
pub mod memory;
pub(crate) mod snapshot;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

use crate::notifications::push::PushSubscription;

/// One identity's push subscription.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    /// Client identity (unique key).
    pub identity: String,
    /// Subscription exactly as the client submitted it.
    pub subscription: PushSubscription,
    /// When this record was last written.
    pub updated_at: DateTime<Utc>,
}

/// Storage failure.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store could not be read or written.
    #[error("subscription store unavailable: {0}")]
    Unavailable(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Durable identity → subscription mapping.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Create or replace the record for `identity`.
    async fn upsert(&self, identity: &str, subscription: PushSubscription) -> StoreResult<()>;

    /// Records for the given identities; identities without a record are skipped.
    async fn find_many(&self, identities: &BTreeSet<String>) -> StoreResult<Vec<SubscriptionRecord>>;

    /// Record for a single identity.
    async fn get(&self, identity: &str) -> StoreResult<Option<SubscriptionRecord>>;

    /// Remove the record for `identity`. Removing a missing record succeeds.
    async fn delete(&self, identity: &str) -> StoreResult<()>;

    /// Remove the record for `identity` only while it still points at
    /// `endpoint`. Returns whether a record was removed.
    ///
    /// A client that re-subscribed after the lookup keeps its new record.
    async fn delete_if_endpoint(&self, identity: &str, endpoint: &str) -> StoreResult<bool>;

    /// Number of stored records.
    async fn len(&self) -> StoreResult<usize>;

    /// Whether the store holds no records.
    async fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len().await? == 0)
    }

    /// Engine name for logs.
    fn backend_name(&self) -> &'static str;
}
