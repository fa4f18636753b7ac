//! Web push message sending.
//!
//! Holds the browser subscription descriptor and the transport that sends
//! encrypted web push messages (RFC 8030 / RFC 8291) with VAPID
//! authentication (RFC 8292).

// Rust guideline compliant 2026-02

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

use super::vapid::VapidKeyPair;
use crate::constants;

const EXPIRATION_TIME: &str = "expirationTime";

/// Client-held keys from a browser push subscription.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionKeys {
    /// Browser's P-256 ECDH public key (base64url).
    pub p256dh: String,
    /// Shared auth secret (base64url).
    pub auth: String,
    /// Any further key material the browser sent, kept as submitted.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A browser's push subscription, in the shape `PushSubscription.toJSON()` emits.
///
/// Stored verbatim: what `/subscribe` receives is what delivery reads back.
/// Only `endpoint` and `keys` are interpreted; every other member
/// (`expirationTime`, including an explicit `null`) lives in `extra` untouched.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushSubscription {
    /// Push service endpoint URL.
    pub endpoint: String,
    /// Payload encryption keys.
    pub keys: SubscriptionKeys,
    /// Members beyond `endpoint` and `keys`, exactly as submitted.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PushSubscription {
    /// Build a descriptor with only an endpoint and keys.
    pub fn new(endpoint: impl Into<String>, p256dh: impl Into<String>, auth: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            keys: SubscriptionKeys {
                p256dh: p256dh.into(),
                auth: auth.into(),
                extra: Map::new(),
            },
            extra: Map::new(),
        }
    }

    /// Set `expirationTime` (ms since epoch, or `None` for an explicit `null`).
    #[must_use]
    pub fn with_expiration_time(mut self, expiration_ms: Option<u64>) -> Self {
        self.extra
            .insert(EXPIRATION_TIME.to_string(), expiration_ms.map_or(Value::Null, Value::from));
        self
    }

    /// Expiry announced by the push service (ms since epoch), if any.
    pub fn expiration_time(&self) -> Option<u64> {
        self.extra.get(EXPIRATION_TIME).and_then(Value::as_u64)
    }

    /// Check the descriptor is usable for delivery.
    ///
    /// The endpoint must be an absolute http(s) URL and both keys non-empty.
    pub fn validate(&self) -> Result<(), String> {
        let url = reqwest::Url::parse(&self.endpoint)
            .map_err(|e| format!("subscription endpoint is not a URL: {e}"))?;
        if !matches!(url.scheme(), "https" | "http") {
            return Err(format!(
                "subscription endpoint must be http(s), got {}",
                url.scheme()
            ));
        }
        if self.keys.p256dh.trim().is_empty() || self.keys.auth.trim().is_empty() {
            return Err("subscription keys p256dh and auth are required".to_string());
        }
        Ok(())
    }
}

/// Outcome of one delivery attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeliveryResult {
    /// The push service accepted the message.
    Delivered,
    /// The push service reports the subscription no longer exists (404/410).
    Gone,
    /// Anything else; the subscription may still be valid.
    TransientError(String),
}

/// Sends one push message to one subscription.
///
/// Implementations classify every outcome into a [`DeliveryResult`] and never
/// return an error, so the dispatcher's branching stays exhaustive.
#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Deliver `payload` to `subscription`.
    async fn send(&self, subscription: &PushSubscription, payload: &[u8]) -> DeliveryResult;
}

/// Production transport: `web-push` for encryption and signing, `reqwest` for HTTP.
///
/// Reuses one `reqwest::Client` across deliveries for connection pooling.
#[derive(Debug, Clone)]
pub struct WebPushTransport {
    client: reqwest::Client,
    vapid: Arc<VapidKeyPair>,
    subject: String,
}

impl WebPushTransport {
    /// Create a transport signing with `vapid` and announcing `subject`
    /// (a `mailto:` or `https:` contact URI) in the VAPID claims.
    pub fn new(vapid: Arc<VapidKeyPair>, subject: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(constants::HTTP_REQUEST_TIMEOUT)
            .build()?;
        Ok(Self::with_client(client, vapid, subject))
    }

    /// Create a transport with a pre-configured HTTP client.
    pub fn with_client(
        client: reqwest::Client,
        vapid: Arc<VapidKeyPair>,
        subject: impl Into<String>,
    ) -> Self {
        Self {
            client,
            vapid,
            subject: subject.into(),
        }
    }

    /// Build the encrypted, signed request for one subscription.
    fn build_request(
        &self,
        subscription: &PushSubscription,
        payload: &[u8],
    ) -> Result<reqwest::RequestBuilder, String> {
        use web_push::{ContentEncoding, SubscriptionInfo, VapidSignatureBuilder, WebPushMessageBuilder};

        let sub_info = SubscriptionInfo::new(
            &subscription.endpoint,
            &subscription.keys.p256dh,
            &subscription.keys.auth,
        );

        let mut sig_builder =
            VapidSignatureBuilder::from_base64(self.vapid.private_key_base64url(), &sub_info)
                .map_err(|e| format!("failed to build VAPID signature: {e}"))?;
        sig_builder.add_claim("sub", self.subject.as_str());
        let sig = sig_builder
            .build()
            .map_err(|e| format!("failed to sign VAPID JWT: {e}"))?;

        let mut builder = WebPushMessageBuilder::new(&sub_info);
        builder.set_payload(ContentEncoding::Aes128Gcm, payload);
        builder.set_vapid_signature(sig);
        builder.set_ttl(constants::PUSH_TTL_SECS);

        let message = builder
            .build()
            .map_err(|e| format!("failed to build web push message: {e}"))?;

        let mut request = self
            .client
            .post(message.endpoint.to_string())
            .header("TTL", message.ttl.to_string());

        if let Some(urgency) = message.urgency {
            request = request.header("Urgency", urgency.to_string());
        }

        if let Some(topic) = message.topic {
            request = request.header("Topic", topic);
        }

        if let Some(push_payload) = message.payload {
            request = request
                .header("Content-Encoding", push_payload.content_encoding.to_str())
                .header("Content-Type", "application/octet-stream");

            for (key, value) in &push_payload.crypto_headers {
                request = request.header(*key, value.as_str());
            }

            request = request.body(push_payload.content);
        }

        Ok(request)
    }
}

#[async_trait]
impl PushTransport for WebPushTransport {
    async fn send(&self, subscription: &PushSubscription, payload: &[u8]) -> DeliveryResult {
        let request = match self.build_request(subscription, payload) {
            Ok(request) => request,
            Err(detail) => return DeliveryResult::TransientError(detail),
        };

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return DeliveryResult::TransientError(format!("web push HTTP request failed: {e}")),
        };

        let status = response.status().as_u16();
        match status {
            200..=299 => DeliveryResult::Delivered,
            404 | 410 => {
                log::info!("[WebPush] Subscription expired (HTTP {status})");
                DeliveryResult::Gone
            }
            429 => {
                log::warn!("[WebPush] Rate limited (429)");
                DeliveryResult::TransientError("rate limited by push service (HTTP 429)".to_string())
            }
            _ => {
                let body = response.text().await.unwrap_or_default();
                DeliveryResult::TransientError(format!("web push send failed (HTTP {status}): {body}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_matches_browser_json() {
        let json = r#"{
            "endpoint": "https://fcm.googleapis.com/fcm/send/abc",
            "expirationTime": null,
            "keys": { "p256dh": "BPk", "auth": "q1w" }
        }"#;
        let sub: PushSubscription = serde_json::from_str(json).expect("parse browser JSON");
        assert_eq!(sub.endpoint, "https://fcm.googleapis.com/fcm/send/abc");
        assert_eq!(sub.keys.p256dh, "BPk");
        assert_eq!(sub.keys.auth, "q1w");
        assert_eq!(sub.expiration_time(), None);
    }

    #[test]
    fn test_descriptor_keeps_expiration_time() {
        let json = r#"{"endpoint":"https://push.example.com/1","expirationTime":1700000000000,"keys":{"p256dh":"k","auth":"a"}}"#;
        let sub: PushSubscription = serde_json::from_str(json).expect("parse");
        assert_eq!(sub.expiration_time(), Some(1_700_000_000_000));

        let reserialized = serde_json::to_value(&sub).expect("serialize");
        let original: serde_json::Value = serde_json::from_str(json).expect("parse value");
        assert_eq!(reserialized, original);
    }

    #[test]
    fn test_null_expiration_and_unknown_members_survive() {
        let original = serde_json::json!({
            "endpoint": "https://push.example.com/1",
            "expirationTime": null,
            "keys": {"p256dh": "k", "auth": "a", "vendor": "x"},
            "contentEncodings": ["aes128gcm"]
        });
        let sub: PushSubscription = serde_json::from_value(original.clone()).expect("parse");
        assert_eq!(serde_json::to_value(&sub).expect("serialize"), original);

        let built = PushSubscription::new("https://push.example.com/1", "k", "a").with_expiration_time(None);
        assert_eq!(
            serde_json::to_value(&built).expect("serialize"),
            serde_json::json!({
                "endpoint": "https://push.example.com/1",
                "expirationTime": null,
                "keys": {"p256dh": "k", "auth": "a"}
            })
        );
    }

    #[test]
    fn test_validate_accepts_https_endpoint() {
        let sub = PushSubscription::new("https://push.example.com/1", "key", "auth");
        assert!(sub.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_endpoint_and_keys() {
        assert!(PushSubscription::new("not a url", "key", "auth").validate().is_err());
        assert!(PushSubscription::new("ftp://push.example.com/1", "key", "auth")
            .validate()
            .is_err());
        assert!(PushSubscription::new("https://push.example.com/1", "", "auth")
            .validate()
            .is_err());
        assert!(PushSubscription::new("https://push.example.com/1", "key", " ")
            .validate()
            .is_err());
    }

    #[tokio::test]
    async fn test_send_with_malformed_keys_is_transient() {
        let transport = WebPushTransport::new(
            Arc::new(VapidKeyPair::generate()),
            constants::DEFAULT_VAPID_SUBJECT,
        )
        .expect("client");
        let sub = PushSubscription::new("https://push.example.com/1", "!!not-base64!!", "x");
        let result = transport.send(&sub, b"{}").await;
        assert!(matches!(result, DeliveryResult::TransientError(_)));
    }
}
