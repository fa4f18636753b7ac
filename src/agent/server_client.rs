//! Agent → server calls.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::constants;
use crate::notifications::PushSubscription;

/// The three server calls the agent makes.
#[async_trait]
pub trait SubscriptionServer: Send + Sync {
    /// `GET /vapidPublicKey`.
    async fn vapid_public_key(&self) -> Result<String>;

    /// `POST /subscribe` with the subscription exactly as the platform produced it.
    async fn subscribe(&self, identity: &str, subscription: &PushSubscription) -> Result<()>;

    /// `POST /unsubscribe`.
    async fn unsubscribe(&self, identity: &str) -> Result<()>;
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublicKeyBody {
    public_key: String,
}

#[derive(Serialize)]
struct SubscribeBody<'a> {
    identity: &'a str,
    subscription: &'a PushSubscription,
}

#[derive(Serialize)]
struct UnsubscribeBody<'a> {
    identity: &'a str,
}

/// [`SubscriptionServer`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpSubscriptionServer {
    client: Client,
    server_url: String,
}

impl HttpSubscriptionServer {
    /// Client for the server at `server_url` (no trailing slash needed).
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(server_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(constants::HTTP_REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self::with_client(client, server_url))
    }

    /// Client with a pre-configured HTTP client.
    pub fn with_client(client: Client, server_url: impl Into<String>) -> Self {
        let server_url = server_url.into().trim_end_matches('/').to_string();
        Self { client, server_url }
    }

    async fn post_json<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<()> {
        let url = format!("{}{}", self.server_url, path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("POST {path} failed"))?;

        if !response.status().is_success() {
            anyhow::bail!("POST {} returned {}", path, response.status());
        }
        Ok(())
    }
}

#[async_trait]
impl SubscriptionServer for HttpSubscriptionServer {
    async fn vapid_public_key(&self) -> Result<String> {
        let url = format!("{}/vapidPublicKey", self.server_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("GET /vapidPublicKey failed")?;

        if !response.status().is_success() {
            anyhow::bail!("GET /vapidPublicKey returned {}", response.status());
        }
        let body: PublicKeyBody = response
            .json()
            .await
            .context("Malformed /vapidPublicKey response")?;
        Ok(body.public_key)
    }

    async fn subscribe(&self, identity: &str, subscription: &PushSubscription) -> Result<()> {
        self.post_json(
            "/subscribe",
            &SubscribeBody {
                identity,
                subscription,
            },
        )
        .await
    }

    async fn unsubscribe(&self, identity: &str) -> Result<()> {
        self.post_json("/unsubscribe", &UnsubscribeBody { identity }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetches_public_key() {
        let mock = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/vapidPublicKey"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"publicKey": "BKey"})),
            )
            .mount(&mock)
            .await;

        let server = HttpSubscriptionServer::new(format!("{}/", mock.uri())).expect("client");
        assert_eq!(server.vapid_public_key().await.expect("key"), "BKey");
    }

    #[tokio::test]
    async fn test_subscribe_posts_identity_and_descriptor() {
        let mock = MockServer::start().await;
        let subscription = PushSubscription::new("https://push.example/abc", "p256dh", "auth");
        Mock::given(method("POST"))
            .and(path("/subscribe"))
            .and(body_json(serde_json::json!({
                "identity": "s1",
                "subscription": {
                    "endpoint": "https://push.example/abc",
                    "keys": {"p256dh": "p256dh", "auth": "auth"}
                }
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock)
            .await;

        let server = HttpSubscriptionServer::new(mock.uri()).expect("client");
        server.subscribe("s1", &subscription).await.expect("subscribe");
    }

    #[tokio::test]
    async fn test_error_status_is_an_error() {
        let mock = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/unsubscribe"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock)
            .await;

        let server = HttpSubscriptionServer::new(mock.uri()).expect("client");
        assert!(server.unsubscribe("s1").await.is_err());
    }
}
