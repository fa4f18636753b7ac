//! Campus Push - targeted web push notifications for student devices.
//!
//! This crate provides the push subscription lifecycle and the notification
//! delivery pipeline: capturing a client's push endpoint, storing it per
//! identity, and delivering VAPID-signed web push messages in batches with
//! pruning of dead subscriptions.
//!
//! # Architecture
//!
//! - **Store** - identity → push subscription records (memory or JSON file)
//! - **Notifications** - VAPID keys, web push transport, batch dispatcher
//! - **Identity** - student registration and login tokens
//! - **Server** - axum HTTP surface
//! - **Agent** - client-side subscription agent (background worker logic)
//!
//! # Modules
//!
//! - [`store`] - Subscription record storage
//! - [`notifications`] - VAPID, delivery, dispatch
//! - [`identity`] - Registration, credential checks, tokens
//! - [`server`] - HTTP routes and application state
//! - [`agent`] - Client-side subscription agent
//! - [`config`] - Configuration loading

pub mod agent;
pub mod config;
pub mod constants;
pub mod env;
pub mod identity;
pub mod notifications;
pub mod server;
pub mod store;

// Re-export commonly used types
pub use config::Config;
pub use notifications::{
    DeliveryOutcome, DeliveryResult, DispatchError, NotificationRequest, PushDispatcher,
    PushSubscription, PushTransport, VapidKeyPair, WebPushTransport,
};
pub use store::{SubscriptionRecord, SubscriptionStore};

/// Shorten an identity or endpoint for log output.
pub(crate) fn short_id(value: &str) -> &str {
    match value.char_indices().nth(constants::LOG_ID_PREFIX_LEN) {
        Some((idx, _)) => &value[..idx],
        None => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_id_truncates_on_char_boundary() {
        assert_eq!(short_id("student-123456"), "student-");
        assert_eq!(short_id("abc"), "abc");
        assert_eq!(short_id("ééééééééé"), "éééééééé");
    }
}
