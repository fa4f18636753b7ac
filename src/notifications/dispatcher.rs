//! Batched notification delivery.
//!
//! Resolves target identities to stored subscriptions, sends one shared
//! payload to each, and prunes subscriptions the push service reports gone.
//!
//! # Flow
//!
//! ```text
//! NotificationRequest (targets, title, body, url?)
//!     ↓ validate (no I/O)
//! SubscriptionStore::find_many(targets)        → empty ⇒ NoSubscribers
//!     ↓ serialize payload once
//! PushTransport::send × N   (concurrent, isolated)
//!     ↓
//! Delivered ⇒ succeeded
//! Gone      ⇒ failed + delete record if its endpoint is unchanged (best-effort)
//! Transient ⇒ failed, record kept
//! ```

// Rust guideline compliant 2026-02

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;

use super::push::{DeliveryResult, PushTransport};
use crate::short_id;
use crate::store::{StoreError, SubscriptionRecord, SubscriptionStore};

/// A notification addressed to a set of identities.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NotificationRequest {
    /// Target identities.
    pub targets: BTreeSet<String>,
    /// Notification title.
    pub title: String,
    /// Notification body text.
    pub body: String,
    /// Optional deep link opened when the notification is clicked.
    pub url: Option<String>,
}

impl NotificationRequest {
    /// Build a request without a deep link.
    ///
    /// Targets are trimmed the same way `/subscribe` trims the identity it
    /// stores; blank targets are dropped.
    pub fn new<I, S>(targets: I, title: impl Into<String>, body: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            targets: targets
                .into_iter()
                .map(Into::<String>::into)
                .map(|target| target.trim().to_string())
                .filter(|target| !target.is_empty())
                .collect(),
            title: title.into(),
            body: body.into(),
            url: None,
        }
    }

    /// Attach a deep link.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    fn validate(&self) -> Result<(), DispatchError> {
        if self.targets.is_empty() || self.targets.iter().all(|t| t.trim().is_empty()) {
            return Err(DispatchError::InvalidRequest(
                "at least one target identity is required".to_string(),
            ));
        }
        if self.title.trim().is_empty() {
            return Err(DispatchError::InvalidRequest("title is required".to_string()));
        }
        if self.body.trim().is_empty() {
            return Err(DispatchError::InvalidRequest("body is required".to_string()));
        }
        Ok(())
    }
}

/// JSON payload delivered to every recipient.
///
/// The agent reads `{title, body, url?}` from the push event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    /// Notification title.
    pub title: String,
    /// Notification body text.
    pub body: String,
    /// Optional deep link.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Aggregate result of one dispatch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryOutcome {
    /// Deliveries the push service accepted.
    pub succeeded: usize,
    /// Deliveries that failed, gone or transient.
    pub failed: usize,
    /// Records removed because their endpoint is gone.
    pub pruned: usize,
}

impl DeliveryOutcome {
    /// Total delivery attempts; always the number of resolved records.
    pub fn attempted(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// Request-level dispatch failure.
///
/// Per-recipient delivery failures never show up here; they are counted in
/// [`DeliveryOutcome::failed`].
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Caller input was missing or malformed.
    #[error("invalid notification request: {0}")]
    InvalidRequest(String),
    /// None of the targets has a subscription.
    #[error("no subscriptions found for the requested identities")]
    NoSubscribers,
    /// The subscription store could not be read.
    #[error(transparent)]
    Storage(#[from] StoreError),
}

/// What happened to one recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttemptOutcome {
    Succeeded,
    Failed,
    FailedAndPruned,
}

/// Sends notifications to stored subscriptions.
#[derive(Clone)]
pub struct PushDispatcher {
    store: Arc<dyn SubscriptionStore>,
    transport: Arc<dyn PushTransport>,
}

impl std::fmt::Debug for PushDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushDispatcher")
            .field("store", &self.store.backend_name())
            .finish_non_exhaustive()
    }
}

impl PushDispatcher {
    /// Create a dispatcher over `store`, delivering through `transport`.
    pub fn new(store: Arc<dyn SubscriptionStore>, transport: Arc<dyn PushTransport>) -> Self {
        Self { store, transport }
    }

    /// Deliver `request` to every target that has a subscription.
    pub async fn dispatch(&self, request: &NotificationRequest) -> Result<DeliveryOutcome, DispatchError> {
        request.validate()?;

        let records = self.store.find_many(&request.targets).await?;
        if records.is_empty() {
            log::info!(
                "[Dispatch] None of {} target(s) has a subscription",
                request.targets.len()
            );
            return Err(DispatchError::NoSubscribers);
        }

        let payload = NotificationPayload {
            title: request.title.clone(),
            body: request.body.clone(),
            url: request.url.clone(),
        };
        let payload = serde_json::to_vec(&payload)
            .map_err(|e| DispatchError::InvalidRequest(format!("payload is not serializable: {e}")))?;

        log::info!(
            "[Dispatch] Sending to {} of {} target(s)",
            records.len(),
            request.targets.len()
        );

        let attempts = records.iter().map(|record| self.deliver(record, &payload));
        let outcome = join_all(attempts)
            .await
            .into_iter()
            .fold(DeliveryOutcome::default(), |mut acc, attempt| {
                match attempt {
                    AttemptOutcome::Succeeded => acc.succeeded += 1,
                    AttemptOutcome::Failed => acc.failed += 1,
                    AttemptOutcome::FailedAndPruned => {
                        acc.failed += 1;
                        acc.pruned += 1;
                    }
                }
                acc
            });

        log::info!(
            "[Dispatch] Notifications sent: {}, failed: {}, pruned: {}",
            outcome.succeeded,
            outcome.failed,
            outcome.pruned
        );
        Ok(outcome)
    }

    /// One isolated attempt; never fails the batch.
    async fn deliver(&self, record: &SubscriptionRecord, payload: &[u8]) -> AttemptOutcome {
        let who = short_id(&record.identity);
        match self.transport.send(&record.subscription, payload).await {
            DeliveryResult::Delivered => {
                log::debug!("[Dispatch] Notification sent to {who}");
                AttemptOutcome::Succeeded
            }
            DeliveryResult::Gone => {
                log::info!("[Dispatch] Subscription for {who} is gone, removing it");
                match self
                    .store
                    .delete_if_endpoint(&record.identity, &record.subscription.endpoint)
                    .await
                {
                    Ok(true) => AttemptOutcome::FailedAndPruned,
                    Ok(false) => {
                        log::debug!("[Dispatch] {who} re-subscribed meanwhile, keeping the new record");
                        AttemptOutcome::Failed
                    }
                    Err(e) => {
                        log::warn!("[Dispatch] Failed to remove expired subscription for {who}: {e}");
                        AttemptOutcome::Failed
                    }
                }
            }
            DeliveryResult::TransientError(detail) => {
                log::warn!("[Dispatch] Push to {who} failed: {detail}");
                AttemptOutcome::Failed
            }
        }
    }
}
