//! Student identities: registration, credential checks, login tokens.
//!
//! This is a thin collaborator of the push pipeline. Identities are the keys
//! subscriptions are stored under; nothing here decides who may send.

pub mod credentials;
pub mod token;

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::constants;
use crate::store::snapshot::SnapshotFile;
use credentials::StoredCredential;
use token::TokenIssuer;

/// Identity operation failure.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// Identity or credential missing.
    #[error("identity and credential are required")]
    InvalidRequest,
    /// The identity is already registered.
    #[error("identity is already registered")]
    AlreadyRegistered,
    /// Unknown identity or wrong credential.
    #[error("invalid credentials")]
    InvalidCredentials,
    /// Backing store failure.
    #[error("identity store unavailable: {0}")]
    Storage(String),
    /// Token signing failure.
    #[error("failed to issue token: {0}")]
    Token(String),
}

/// Registration and login.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Register `identity` with `credential`.
    async fn register(&self, identity: &str, credential: &str) -> Result<(), IdentityError>;

    /// Check `credential` and issue a login token.
    async fn verify(&self, identity: &str, credential: &str) -> Result<String, IdentityError>;

    /// All registered identities, sorted.
    async fn list(&self) -> Result<Vec<String>, IdentityError>;
}

/// Identity store kept in memory, optionally snapshotted to `identities.json`.
#[derive(Debug)]
pub struct LocalIdentityStore {
    credentials: RwLock<HashMap<String, StoredCredential>>,
    file: Option<SnapshotFile>,
    tokens: TokenIssuer,
}

impl LocalIdentityStore {
    /// Non-durable store.
    pub fn in_memory(tokens: TokenIssuer) -> Self {
        Self {
            credentials: RwLock::new(HashMap::new()),
            file: None,
            tokens,
        }
    }

    /// Store persisted in `data_dir`.
    pub fn open(data_dir: &Path, tokens: TokenIssuer) -> Result<Self> {
        let file = SnapshotFile::new(data_dir.join(constants::IDENTITIES_FILE));
        let credentials: HashMap<String, StoredCredential> = file.load()?;
        log::info!("[Identity] Loaded {} identit(ies) from {:?}", credentials.len(), file.path());
        Ok(Self {
            credentials: RwLock::new(credentials),
            file: Some(file),
            tokens,
        })
    }
}

fn require(identity: &str, credential: &str) -> Result<(), IdentityError> {
    if identity.trim().is_empty() || credential.is_empty() {
        return Err(IdentityError::InvalidRequest);
    }
    Ok(())
}

#[async_trait]
impl IdentityStore for LocalIdentityStore {
    async fn register(&self, identity: &str, credential: &str) -> Result<(), IdentityError> {
        require(identity, credential)?;

        let mut credentials = self.credentials.write().await;
        if credentials.contains_key(identity) {
            return Err(IdentityError::AlreadyRegistered);
        }
        credentials.insert(identity.to_string(), StoredCredential::new(credential));

        if let Some(file) = &self.file {
            if let Err(e) = file.save(&*credentials).await {
                credentials.remove(identity);
                log::error!("[Identity] Failed to persist registration: {e:#}");
                return Err(IdentityError::Storage(format!("{e:#}")));
            }
        }
        log::info!("[Identity] Registered {}", crate::short_id(identity));
        Ok(())
    }

    async fn verify(&self, identity: &str, credential: &str) -> Result<String, IdentityError> {
        require(identity, credential)?;

        let matches = self
            .credentials
            .read()
            .await
            .get(identity)
            .is_some_and(|stored| stored.matches(credential));
        if !matches {
            return Err(IdentityError::InvalidCredentials);
        }

        self.tokens
            .issue(identity)
            .map_err(|e| IdentityError::Token(format!("{e:#}")))
    }

    async fn list(&self) -> Result<Vec<String>, IdentityError> {
        let mut identities: Vec<String> = self.credentials.read().await.keys().cloned().collect();
        identities.sort();
        Ok(identities)
    }
}
