//! Shared test fixtures.

#![allow(dead_code)]

use async_trait::async_trait;
use campus_push::{DeliveryResult, PushSubscription, PushTransport};
use std::collections::HashMap;
use std::sync::Mutex;

/// Transport that answers from a per-endpoint script (default: delivered)
/// and records every attempt.
#[derive(Default)]
pub struct RecordingTransport {
    script: HashMap<String, DeliveryResult>,
    attempts: Mutex<Vec<(String, Vec<u8>)>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `result` for deliveries to `endpoint`.
    pub fn answer(mut self, endpoint: &str, result: DeliveryResult) -> Self {
        self.script.insert(endpoint.to_string(), result);
        self
    }

    /// Endpoints attempted, in order.
    pub fn endpoints(&self) -> Vec<String> {
        self.attempts
            .lock()
            .unwrap()
            .iter()
            .map(|(endpoint, _)| endpoint.clone())
            .collect()
    }

    /// Payloads sent, in order.
    pub fn payloads(&self) -> Vec<Vec<u8>> {
        self.attempts
            .lock()
            .unwrap()
            .iter()
            .map(|(_, payload)| payload.clone())
            .collect()
    }
}

#[async_trait]
impl PushTransport for RecordingTransport {
    async fn send(&self, subscription: &PushSubscription, payload: &[u8]) -> DeliveryResult {
        self.attempts
            .lock()
            .unwrap()
            .push((subscription.endpoint.clone(), payload.to_vec()));
        self.script
            .get(&subscription.endpoint)
            .cloned()
            .unwrap_or(DeliveryResult::Delivered)
    }
}

/// Subscription whose endpoint ends in `name`.
pub fn subscription(name: &str) -> PushSubscription {
    PushSubscription::new(
        format!("https://push.example.com/{name}"),
        format!("p256dh-{name}"),
        format!("auth-{name}"),
    )
}

pub fn endpoint(name: &str) -> String {
    format!("https://push.example.com/{name}")
}

pub async fn read_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}
