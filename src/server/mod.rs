//! HTTP surface.
//!
//! Serves the VAPID public key, identity registration/login, subscription
//! upsert/removal, and the notification trigger. All routes accept and
//! return JSON; CORS is open to every origin.
//!
//! ```text
//! GET  /vapidPublicKey     -> { publicKey }
//! GET  /students           -> [{ identity }]
//! POST /register           { identity, credential }
//! POST /login              { identity, credential } -> { message, token }
//! POST /subscribe          { identity, subscription }
//! POST /unsubscribe        { identity }
//! POST /sendNotification   { identities, title, body, url? }
//! ```

pub mod error;
pub mod routes;
pub mod types;

use anyhow::{Context, Result};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use crate::config::{Config, StorageKind};
use crate::identity::token::TokenIssuer;
use crate::identity::{IdentityStore, LocalIdentityStore};
use crate::notifications::{PushDispatcher, PushTransport, VapidKeyPair, WebPushTransport};
use crate::store::file::FileSubscriptionStore;
use crate::store::memory::MemorySubscriptionStore;
use crate::store::SubscriptionStore;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Server key pair; only the public half is served.
    pub vapid: Arc<VapidKeyPair>,
    /// Identity → subscription records.
    pub store: Arc<dyn SubscriptionStore>,
    /// Registered identities and credentials.
    pub identities: Arc<dyn IdentityStore>,
    /// Delivery pipeline over `store`.
    pub dispatcher: PushDispatcher,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("vapid", &self.vapid)
            .field("store", &self.store.backend_name())
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Wire the dispatcher over `store` and `transport`.
    pub fn new(
        vapid: Arc<VapidKeyPair>,
        store: Arc<dyn SubscriptionStore>,
        identities: Arc<dyn IdentityStore>,
        transport: Arc<dyn PushTransport>,
    ) -> Self {
        let dispatcher = PushDispatcher::new(Arc::clone(&store), transport);
        Self {
            vapid,
            store,
            identities,
            dispatcher,
        }
    }

    /// Build production state from configuration.
    ///
    /// Fails if the VAPID keys are missing or invalid, or a persisted store
    /// cannot be read.
    pub fn from_config(config: &Config) -> Result<Self> {
        let vapid = Arc::new(config.vapid_keys()?);
        let tokens = TokenIssuer::new(&config.token_secret());

        let (store, identities): (Arc<dyn SubscriptionStore>, Arc<dyn IdentityStore>) =
            match config.storage {
                StorageKind::Memory => (
                    Arc::new(MemorySubscriptionStore::new()),
                    Arc::new(LocalIdentityStore::in_memory(tokens)),
                ),
                StorageKind::File => (
                    Arc::new(FileSubscriptionStore::open(&config.data_dir)?),
                    Arc::new(LocalIdentityStore::open(&config.data_dir, tokens)?),
                ),
            };

        let transport = Arc::new(WebPushTransport::new(
            Arc::clone(&vapid),
            config.vapid_subject.clone(),
        )?);

        Ok(Self::new(vapid, store, identities, transport))
    }
}

/// Router with every route and permissive CORS.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/vapidPublicKey", get(routes::vapid_public_key))
        .route("/students", get(routes::list_students))
        .route("/register", post(routes::register))
        .route("/login", post(routes::login))
        .route("/subscribe", post(routes::subscribe))
        .route("/unsubscribe", post(routes::unsubscribe))
        .route("/sendNotification", post(routes::send_notification))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Run the server until SIGINT/SIGTERM.
pub async fn serve(config: &Config) -> Result<()> {
    let state = AppState::from_config(config)?;

    let records = state.store.len().await.unwrap_or(0);
    log::info!(
        "[Server] Using {} storage with {} subscription(s)",
        state.store.backend_name(),
        records
    );
    log::warn!("[Server] /sendNotification and /students are unauthenticated; restrict access at the network edge");

    let app = build_router(state);
    let address = format!("{}:{}", config.bind_address, config.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    log::info!("[Server] Listening on http://{address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    log::info!("[Server] Shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => log::info!("[Server] Received Ctrl+C, shutting down"),
            Err(e) => {
                log::warn!("[Server] Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                log::info!("[Server] Received terminate signal, shutting down");
            }
            Err(e) => {
                log::warn!("[Server] Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
