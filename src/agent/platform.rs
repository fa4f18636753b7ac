//! Host push facilities.
//!
//! The agent never talks to a browser directly. Worker registration, the
//! push manager, notification display and window management sit behind
//! [`PushPlatform`] so the subscription state machine runs the same under a
//! real host and under test fakes.

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::AgentError;
use crate::notifications::PushSubscription;

/// Host-reported failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct PlatformError(pub String);

/// Handle to a registered background worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerRegistration {
    /// Scope the worker controls.
    pub scope: String,
}

/// Options for creating a push subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeOptions {
    /// Every push must produce a visible notification.
    pub user_visible_only: bool,
    /// Decoded VAPID public key (65-byte uncompressed point).
    pub application_server_key: Vec<u8>,
}

/// Data attached to a shown notification, read back on click.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationData {
    /// Page to open on click; the site root when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// A notification ready for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationSpec {
    /// Heading line.
    pub title: String,
    /// Body text.
    pub body: String,
    /// Icon image URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Monochrome badge image URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge: Option<String>,
    /// Vibration pattern in milliseconds (on, off, on, ...).
    pub vibrate: Vec<u32>,
    /// Carried through to the click handler.
    pub data: NotificationData,
}

/// A shown notification the user clicked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickedNotification {
    /// Host identifier of the notification.
    pub id: String,
    /// Data attached when the notification was shown.
    pub data: NotificationData,
}

/// Push facilities of the hosting environment.
#[async_trait]
pub trait PushPlatform: Send + Sync {
    /// Register the background worker script.
    async fn register_worker(&self, script_url: &str) -> Result<WorkerRegistration, PlatformError>;

    /// Current push subscription of `registration`, if any.
    async fn get_subscription(
        &self,
        registration: &WorkerRegistration,
    ) -> Result<Option<PushSubscription>, PlatformError>;

    /// Create a push subscription.
    async fn subscribe(
        &self,
        registration: &WorkerRegistration,
        options: &SubscribeOptions,
    ) -> Result<PushSubscription, PlatformError>;

    /// Remove the push subscription. Returns whether one existed.
    async fn unsubscribe(&self, registration: &WorkerRegistration) -> Result<bool, PlatformError>;

    /// Display a notification.
    async fn show_notification(&self, notification: &NotificationSpec) -> Result<(), PlatformError>;

    /// Dismiss a displayed notification.
    async fn close_notification(&self, id: &str) -> Result<(), PlatformError>;

    /// Focus a window already showing `url`, or open a new one.
    async fn open_window(&self, url: &str) -> Result<(), PlatformError>;
}

/// Decode a VAPID public key as served by `/vapidPublicKey`.
///
/// Accepts base64url or standard base64, with or without padding.
pub fn decode_application_server_key(key: &str) -> Result<Vec<u8>, AgentError> {
    let normalized: String = key
        .trim()
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect();
    if normalized.is_empty() {
        return Err(AgentError::MissingServerKey);
    }
    URL_SAFE_NO_PAD
        .decode(normalized.as_bytes())
        .map_err(|e| AgentError::Server(format!("invalid application server key: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;

    #[test]
    fn test_decode_url_safe_and_standard_alphabets() {
        let raw: Vec<u8> = (0u8..=64).map(|b| b.wrapping_mul(37)).collect();
        let url_safe = URL_SAFE_NO_PAD.encode(&raw);
        let standard = STANDARD.encode(&raw);

        assert_eq!(decode_application_server_key(&url_safe).expect("url-safe"), raw);
        assert_eq!(decode_application_server_key(&standard).expect("standard"), raw);
        assert_eq!(
            decode_application_server_key(&format!("  {url_safe}==\n")).expect("padded"),
            raw
        );
    }

    #[test]
    fn test_decode_empty_key() {
        assert!(matches!(
            decode_application_server_key("  "),
            Err(AgentError::MissingServerKey)
        ));
        assert!(matches!(
            decode_application_server_key("not base64!"),
            Err(AgentError::Server(_))
        ));
    }
}
