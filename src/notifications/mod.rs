//! Web push notification infrastructure.
//!
//! Holds the VAPID key pair, the push transport, and the dispatcher that
//! fans a notification out to every subscribed target.
//!
//! # Architecture
//!
//! ```text
//! POST /sendNotification
//!     ↓
//! PushDispatcher resolves identities → subscriptions
//!     ↓
//! WebPushTransport sends web push (RFC 8030) to each browser push service
//!     ↓
//! Push service delivers to the client's background worker
//!     ↓
//! Worker shows a notification (see `agent`)
//! ```
//!
//! # VAPID Keys
//!
//! A single P-256 ECDSA key pair (RFC 8292) is loaded from configuration at
//! startup. The public key is served at `/vapidPublicKey` so browsers can
//! subscribe; the private key never leaves the process.
//!
//! # Push Subscriptions
//!
//! Clients post their push subscription (endpoint + keys) to `/subscribe`.
//! The server stores one per identity and removes it when the push service
//! answers 404/410 Gone.

// Rust guideline compliant 2026-02

pub mod dispatcher;
pub mod push;
pub mod vapid;

pub use dispatcher::{DeliveryOutcome, DispatchError, NotificationRequest, PushDispatcher};
pub use push::{DeliveryResult, PushSubscription, PushTransport, WebPushTransport};
pub use vapid::VapidKeyPair;
