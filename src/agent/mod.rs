//! Client-side subscription agent.
//!
//! Runs in the background worker context. It owns the push registration,
//! learns the active identity from the foreground, keeps the server's record
//! of this device's subscription current, and turns incoming pushes into
//! notifications.
//!
//! # Lifecycle
//!
//! ```text
//! Unknown ──start()──▶ NotSupported          (registration failed)
//!                  └─▶ Unsubscribed ◀──┐
//!                          │ subscribe()│ unsubscribe()
//!                          ▼            │
//!                      Subscribed ──────┘
//! ```
//!
//! The subscribed state is never cached: [`SubscriptionAgent::status`] asks
//! the platform every time.

pub mod identity;
pub mod platform;
pub mod render;
pub mod server_client;

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

use crate::constants;
use identity::BackgroundPort;
use platform::{ClickedNotification, PushPlatform, SubscribeOptions, WorkerRegistration};
use render::NotificationStyle;
use server_client::SubscriptionServer;

/// Subscription state as last observed on the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionStatus {
    /// `start()` has not run yet.
    Unknown,
    /// The host cannot register a push worker.
    NotSupported,
    /// Registered, no push subscription.
    Unsubscribed,
    /// Registered with a push subscription.
    Subscribed,
}

/// What `subscribe()` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeOutcome {
    /// An existing platform subscription was re-sent to the server.
    Refreshed,
    /// A new platform subscription was created and sent.
    Created,
}

/// Agent operation failure.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Worker registration failed at `start()`.
    #[error("push is not supported on this platform")]
    NotSupported,
    /// Neither a pushed nor a pulled identity is available.
    #[error("no identity is known; log in first")]
    NoIdentity,
    /// `/vapidPublicKey` answered with an empty key.
    #[error("server did not provide an application server key")]
    MissingServerKey,
    /// The host rejected a push manager or notification call.
    #[error("platform error: {0}")]
    Platform(String),
    /// A server call failed.
    #[error("server error: {0}")]
    Server(String),
}

impl From<platform::PlatformError> for AgentError {
    fn from(err: platform::PlatformError) -> Self {
        Self::Platform(err.0)
    }
}

/// Agent settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentOptions {
    /// Script registered as the background worker.
    pub worker_script_url: String,
    /// Look of rendered notifications.
    pub style: NotificationStyle,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            worker_script_url: constants::WORKER_SCRIPT_URL.to_string(),
            style: NotificationStyle::default(),
        }
    }
}

#[derive(Debug, Clone)]
enum Registration {
    NotStarted,
    Unsupported,
    Registered(WorkerRegistration),
}

/// Background-context subscription agent.
pub struct SubscriptionAgent {
    platform: Arc<dyn PushPlatform>,
    server: Arc<dyn SubscriptionServer>,
    identity: Mutex<BackgroundPort>,
    registration: RwLock<Registration>,
    options: AgentOptions,
}

impl std::fmt::Debug for SubscriptionAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionAgent")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl SubscriptionAgent {
    /// Agent with the default worker script and notification style.
    pub fn new(
        platform: Arc<dyn PushPlatform>,
        server: Arc<dyn SubscriptionServer>,
        identity: BackgroundPort,
    ) -> Self {
        Self::with_options(platform, server, identity, AgentOptions::default())
    }

    /// Agent with explicit options.
    pub fn with_options(
        platform: Arc<dyn PushPlatform>,
        server: Arc<dyn SubscriptionServer>,
        identity: BackgroundPort,
        options: AgentOptions,
    ) -> Self {
        Self {
            platform,
            server,
            identity: Mutex::new(identity),
            registration: RwLock::new(Registration::NotStarted),
            options,
        }
    }

    /// Register the background worker.
    ///
    /// A failed registration leaves the agent in `NotSupported`; it is
    /// logged, not returned.
    pub async fn start(&self) -> SubscriptionStatus {
        let registration = match self
            .platform
            .register_worker(&self.options.worker_script_url)
            .await
        {
            Ok(registration) => {
                log::info!("[Agent] Worker registered for scope {}", registration.scope);
                Registration::Registered(registration)
            }
            Err(e) => {
                log::warn!("[Agent] Worker registration failed, push unavailable: {e}");
                Registration::Unsupported
            }
        };
        *self.registration.write().await = registration;
        self.status().await
    }

    /// Current status, queried from the platform on every call.
    pub async fn status(&self) -> SubscriptionStatus {
        let registration = match &*self.registration.read().await {
            Registration::NotStarted => return SubscriptionStatus::Unknown,
            Registration::Unsupported => return SubscriptionStatus::NotSupported,
            Registration::Registered(registration) => registration.clone(),
        };
        match self.platform.get_subscription(&registration).await {
            Ok(Some(_)) => SubscriptionStatus::Subscribed,
            Ok(None) => SubscriptionStatus::Unsubscribed,
            Err(e) => {
                log::warn!("[Agent] Could not query push subscription: {e}");
                SubscriptionStatus::NotSupported
            }
        }
    }

    async fn registration(&self) -> Result<WorkerRegistration, AgentError> {
        match &*self.registration.read().await {
            Registration::Registered(registration) => Ok(registration.clone()),
            Registration::NotStarted | Registration::Unsupported => Err(AgentError::NotSupported),
        }
    }

    async fn identity(&self) -> Result<String, AgentError> {
        self.identity
            .lock()
            .await
            .current_identity()
            .await
            .ok_or(AgentError::NoIdentity)
    }

    /// Make sure this device is subscribed and the server knows it.
    ///
    /// An existing platform subscription is re-sent unchanged; otherwise a
    /// new one is created with the server's VAPID key.
    pub async fn subscribe(&self) -> Result<SubscribeOutcome, AgentError> {
        let registration = self.registration().await?;
        let identity = self.identity().await?;

        if let Some(existing) = self.platform.get_subscription(&registration).await? {
            self.submit(&identity, &existing).await?;
            log::info!("[Agent] Existing subscription refreshed for {}", crate::short_id(&identity));
            return Ok(SubscribeOutcome::Refreshed);
        }

        let key = self
            .server
            .vapid_public_key()
            .await
            .map_err(|e| AgentError::Server(format!("{e:#}")))?;
        let application_server_key = platform::decode_application_server_key(&key)?;

        let options = SubscribeOptions {
            user_visible_only: true,
            application_server_key,
        };
        let subscription = self.platform.subscribe(&registration, &options).await?;
        self.submit(&identity, &subscription).await?;
        log::info!("[Agent] Subscribed {}", crate::short_id(&identity));
        Ok(SubscribeOutcome::Created)
    }

    async fn submit(
        &self,
        identity: &str,
        subscription: &crate::notifications::PushSubscription,
    ) -> Result<(), AgentError> {
        self.server
            .subscribe(identity, subscription)
            .await
            .map_err(|e| AgentError::Server(format!("{e:#}")))
    }

    /// Drop the platform subscription and the server's record.
    ///
    /// Returns whether a platform subscription existed.
    pub async fn unsubscribe(&self) -> Result<bool, AgentError> {
        let registration = self.registration().await?;
        let identity = self.identity().await?;

        let existed = self.platform.unsubscribe(&registration).await?;
        self.server
            .unsubscribe(&identity)
            .await
            .map_err(|e| AgentError::Server(format!("{e:#}")))?;
        log::info!("[Agent] Unsubscribed {}", crate::short_id(&identity));
        Ok(existed)
    }

    /// Show a notification for an incoming push. Bad payloads are ignored.
    pub async fn handle_push(&self, data: Option<&[u8]>) {
        let Some(notification) = render::render(data, &self.options.style) else {
            return;
        };
        if let Err(e) = self.platform.show_notification(&notification).await {
            log::warn!("[Agent] Failed to show notification: {e}");
        }
    }

    /// Close the clicked notification and open its deep link.
    pub async fn handle_notification_click(&self, notification: &ClickedNotification) {
        if let Err(e) = self.platform.close_notification(&notification.id).await {
            log::debug!("[Agent] Failed to close notification {}: {e}", notification.id);
        }
        let target = render::click_target(&notification.data);
        if let Err(e) = self.platform.open_window(target).await {
            log::warn!("[Agent] Failed to open {target}: {e}");
        }
    }
}
