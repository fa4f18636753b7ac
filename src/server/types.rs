//! Request and response bodies.
//!
//! Request fields are optional at the serde level so a missing field is a
//! 400 with a readable message rather than a deserializer rejection. The
//! older client field names (`studentId`, `password`, `studentIds`,
//! `message`) are accepted as aliases.

use serde::{Deserialize, Serialize};

use crate::notifications::PushSubscription;

/// Body of every error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable reason.
    pub error: String,
}

/// Plain acknowledgement.
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    /// Human-readable status.
    pub message: String,
}

impl MessageResponse {
    /// Wrap `message`.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// `GET /vapidPublicKey` body: `{ publicKey }`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VapidPublicKeyResponse {
    /// Uncompressed P-256 point, base64url without padding.
    pub public_key: String,
}

/// One entry of `GET /students`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StudentEntry {
    /// Registered identity.
    pub identity: String,
}

/// Body of `/register` and `/login`.
#[derive(Debug, Default, Deserialize)]
pub struct CredentialsRequest {
    /// Identity (`studentId`).
    #[serde(default, alias = "studentId")]
    pub identity: Option<String>,
    /// Credential (`password`).
    #[serde(default, alias = "password")]
    pub credential: Option<String>,
}

/// `POST /login` success body.
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    /// Human-readable status.
    pub message: String,
    /// HS256 token, valid for one hour.
    pub token: String,
}

/// Body of `/subscribe`.
#[derive(Debug, Default, Deserialize)]
pub struct SubscribeRequest {
    /// Identity to file the subscription under (`studentId`).
    #[serde(default, alias = "studentId")]
    pub identity: Option<String>,
    /// Descriptor from `PushSubscription.toJSON()`.
    #[serde(default)]
    pub subscription: Option<PushSubscription>,
}

/// Body of `/unsubscribe`.
#[derive(Debug, Default, Deserialize)]
pub struct UnsubscribeRequest {
    /// Identity whose record is removed (`studentId`).
    #[serde(default, alias = "studentId")]
    pub identity: Option<String>,
}

/// Body of `/sendNotification`.
#[derive(Debug, Default, Deserialize)]
pub struct SendNotificationRequest {
    /// Target identities (`studentIds`).
    #[serde(default, alias = "studentIds")]
    pub identities: Option<Vec<String>>,
    /// Notification title.
    #[serde(default)]
    pub title: Option<String>,
    /// Notification body (`message`).
    #[serde(default, alias = "message")]
    pub body: Option<String>,
    /// Optional page opened on click.
    #[serde(default)]
    pub url: Option<String>,
}

/// `POST /sendNotification` success body.
#[derive(Debug, Serialize, Deserialize)]
pub struct SendNotificationResponse {
    /// `"Notifications sent: X, Failed notifications: Y"`.
    pub message: String,
    /// Deliveries the push service accepted.
    pub succeeded: usize,
    /// Deliveries that failed, gone or transient.
    pub failed: usize,
    /// Records removed because their endpoint is gone.
    pub pruned: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_field_names_are_accepted() {
        let creds: CredentialsRequest =
            serde_json::from_str(r#"{"studentId": "s1", "password": "pw"}"#).expect("parse");
        assert_eq!(creds.identity.as_deref(), Some("s1"));
        assert_eq!(creds.credential.as_deref(), Some("pw"));

        let send: SendNotificationRequest =
            serde_json::from_str(r#"{"studentIds": ["a"], "title": "t", "message": "m"}"#)
                .expect("parse");
        assert_eq!(send.identities, Some(vec!["a".to_string()]));
        assert_eq!(send.body.as_deref(), Some("m"));
    }

    #[test]
    fn test_missing_fields_deserialize_as_none() {
        let sub: SubscribeRequest = serde_json::from_str("{}").expect("parse");
        assert!(sub.identity.is_none());
        assert!(sub.subscription.is_none());
    }

    #[test]
    fn test_public_key_response_is_camel_case() {
        let json = serde_json::to_value(VapidPublicKeyResponse {
            public_key: "BPk".to_string(),
        })
        .expect("serialize");
        assert_eq!(json, serde_json::json!({"publicKey": "BPk"}));
    }
}
