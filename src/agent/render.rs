//! Push payload → notification.

use serde::Deserialize;

use super::platform::{NotificationData, NotificationSpec};
use crate::constants;

/// Payload as sent by the dispatcher. `message` is the older name of `body`.
#[derive(Debug, Deserialize)]
struct PushMessage {
    title: Option<String>,
    #[serde(alias = "message")]
    body: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

/// How notifications look on this host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationStyle {
    /// Icon image URL.
    pub icon: Option<String>,
    /// Badge image URL.
    pub badge: Option<String>,
    /// Vibration pattern in milliseconds.
    pub vibrate: Vec<u32>,
}

impl Default for NotificationStyle {
    fn default() -> Self {
        Self {
            icon: Some(constants::DEFAULT_NOTIFICATION_ICON.to_string()),
            badge: Some(constants::DEFAULT_NOTIFICATION_ICON.to_string()),
            vibrate: constants::NOTIFICATION_VIBRATE_PATTERN.to_vec(),
        }
    }
}

/// Build the notification for a push payload.
///
/// Returns `None` (after logging) for an empty payload, invalid JSON, or a
/// payload without a title or body.
pub fn render(data: Option<&[u8]>, style: &NotificationStyle) -> Option<NotificationSpec> {
    let Some(data) = data.filter(|d| !d.is_empty()) else {
        log::debug!("[Agent] Push event without data, ignoring");
        return None;
    };

    let message: PushMessage = match serde_json::from_slice(data) {
        Ok(message) => message,
        Err(e) => {
            log::warn!("[Agent] Push payload is not valid JSON, ignoring: {e}");
            return None;
        }
    };

    let (Some(title), Some(body)) = (message.title, message.body) else {
        log::warn!("[Agent] Push payload missing title or body, ignoring");
        return None;
    };

    Some(NotificationSpec {
        title,
        body,
        icon: style.icon.clone(),
        badge: style.badge.clone(),
        vibrate: style.vibrate.clone(),
        data: NotificationData { url: message.url },
    })
}

/// Where a click on a notification with `data` should go.
pub fn click_target(data: &NotificationData) -> &str {
    data.url
        .as_deref()
        .filter(|url| !url.is_empty())
        .unwrap_or(constants::DEFAULT_NOTIFICATION_URL)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_full_payload() {
        let spec = render(
            Some(br#"{"title":"Exam","body":"Room 4","url":"/exams/4"}"#),
            &NotificationStyle::default(),
        )
        .expect("rendered");
        assert_eq!(spec.title, "Exam");
        assert_eq!(spec.body, "Room 4");
        assert_eq!(spec.vibrate, vec![200, 100, 200]);
        assert_eq!(spec.icon.as_deref(), Some("/logo.webp"));
        assert_eq!(spec.data.url.as_deref(), Some("/exams/4"));
    }

    #[test]
    fn test_render_accepts_message_alias() {
        let spec = render(Some(br#"{"title":"T","message":"M"}"#), &NotificationStyle::default())
            .expect("rendered");
        assert_eq!(spec.body, "M");
        assert!(spec.data.url.is_none());
    }

    #[test]
    fn test_render_ignores_bad_payloads() {
        let style = NotificationStyle::default();
        assert!(render(None, &style).is_none());
        assert!(render(Some(b""), &style).is_none());
        assert!(render(Some(b"not json"), &style).is_none());
        assert!(render(Some(br#"{"title":"only title"}"#), &style).is_none());
        assert!(render(Some(br#"["array"]"#), &style).is_none());
    }

    #[test]
    fn test_click_target_defaults_to_root() {
        assert_eq!(click_target(&NotificationData::default()), "/");
        assert_eq!(
            click_target(&NotificationData {
                url: Some(String::new())
            }),
            "/"
        );
        assert_eq!(
            click_target(&NotificationData {
                url: Some("/grades".into())
            }),
            "/grades"
        );
    }
}
