//! Identity hand-off between the foreground and the background worker.
//!
//! The foreground knows who is logged in; the worker needs that identity to
//! tag its `/subscribe` call. The foreground pushes `StoreIdentity` whenever
//! the identity changes, and the worker can pull it with `GetIdentity` when
//! it started after (or restarted since) the last push.
//!
//! ```text
//! ForegroundPort ──StoreIdentity/ClearIdentity──▶ BackgroundPort
//! ForegroundPort ◀──GetIdentity{reply}────────── BackgroundPort
//!                ──IdentityReply (oneshot)──────▶
//! ```

use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};

use crate::constants;

/// Foreground → background notices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityMessage {
    /// The active identity is now `identity`.
    StoreIdentity {
        /// Logged-in identity.
        identity: String,
    },
    /// Nobody is logged in any more.
    ClearIdentity,
}

/// Background → foreground request.
#[derive(Debug)]
pub enum IdentityRequest {
    /// Ask for the current identity; answered on `reply`.
    GetIdentity {
        /// Where the foreground sends its answer.
        reply: oneshot::Sender<IdentityReply>,
    },
}

/// Answer to [`IdentityRequest::GetIdentity`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityReply {
    /// Identity the foreground knows, `None` when logged out.
    pub identity: Option<String>,
}

/// Create a linked foreground/background pair.
pub fn channel() -> (ForegroundPort, BackgroundPort) {
    let (notice_tx, notice_rx) = mpsc::unbounded_channel();
    let (request_tx, request_rx) = mpsc::channel(constants::IDENTITY_REQUEST_QUEUE);

    let foreground = ForegroundPort {
        current: Arc::new(Mutex::new(None)),
        to_background: notice_tx,
        requests: Arc::new(tokio::sync::Mutex::new(request_rx)),
    };
    let background = BackgroundPort {
        cached: None,
        from_foreground: notice_rx,
        to_foreground: request_tx,
    };
    (foreground, background)
}

/// Foreground side. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ForegroundPort {
    current: Arc<Mutex<Option<String>>>,
    to_background: mpsc::UnboundedSender<IdentityMessage>,
    requests: Arc<tokio::sync::Mutex<mpsc::Receiver<IdentityRequest>>>,
}

impl ForegroundPort {
    /// Record the logged-in identity and tell the worker.
    pub fn set_identity(&self, identity: impl Into<String>) {
        let identity = identity.into();
        self.replace(Some(identity.clone()));
        self.notify(IdentityMessage::StoreIdentity { identity });
    }

    /// Forget the identity (logout) and tell the worker.
    pub fn clear_identity(&self) {
        self.replace(None);
        self.notify(IdentityMessage::ClearIdentity);
    }

    /// Identity as the foreground currently knows it.
    pub fn identity(&self) -> Option<String> {
        match self.current.lock() {
            Ok(current) => current.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Answer `GetIdentity` requests until the worker side is dropped.
    pub async fn serve(&self) {
        let mut requests = self.requests.lock().await;
        while let Some(IdentityRequest::GetIdentity { reply }) = requests.recv().await {
            let identity = self.identity();
            log::debug!("[Agent] Answering identity request (known: {})", identity.is_some());
            if reply.send(IdentityReply { identity }).is_err() {
                log::debug!("[Agent] Identity requester went away before the reply");
            }
        }
    }

    fn replace(&self, identity: Option<String>) {
        match self.current.lock() {
            Ok(mut current) => *current = identity,
            Err(poisoned) => *poisoned.into_inner() = identity,
        }
    }

    fn notify(&self, message: IdentityMessage) {
        if self.to_background.send(message).is_err() {
            log::debug!("[Agent] Worker is not listening; identity will be pulled on demand");
        }
    }
}

/// Worker side.
#[derive(Debug)]
pub struct BackgroundPort {
    cached: Option<String>,
    from_foreground: mpsc::UnboundedReceiver<IdentityMessage>,
    to_foreground: mpsc::Sender<IdentityRequest>,
}

impl BackgroundPort {
    /// The active identity, or `None` if nobody is logged in.
    ///
    /// Applies pushed notices first; asks the foreground only when nothing
    /// is known locally. A foreground that is gone or does not answer in
    /// time yields `None`.
    pub async fn current_identity(&mut self) -> Option<String> {
        self.drain_notices();
        if let Some(identity) = &self.cached {
            return Some(identity.clone());
        }

        let identity = self.request_identity().await;
        if identity.is_some() {
            self.cached.clone_from(&identity);
        }
        identity
    }

    fn drain_notices(&mut self) {
        while let Ok(message) = self.from_foreground.try_recv() {
            match message {
                IdentityMessage::StoreIdentity { identity } => {
                    log::debug!("[Agent] Identity stored: {}", crate::short_id(&identity));
                    self.cached = Some(identity);
                }
                IdentityMessage::ClearIdentity => {
                    log::debug!("[Agent] Identity cleared");
                    self.cached = None;
                }
            }
        }
    }

    async fn request_identity(&self) -> Option<String> {
        let (reply_tx, reply_rx) = oneshot::channel();
        match self
            .to_foreground
            .try_send(IdentityRequest::GetIdentity { reply: reply_tx })
        {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                log::debug!("[Agent] Identity requests are piling up unanswered; no identity");
                return None;
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                log::debug!("[Agent] Foreground is gone; no identity");
                return None;
            }
        }

        match tokio::time::timeout(constants::IDENTITY_REQUEST_TIMEOUT, reply_rx).await {
            Ok(Ok(IdentityReply { identity })) => identity,
            Ok(Err(_)) => {
                log::debug!("[Agent] Foreground dropped the identity request");
                None
            }
            Err(_) => {
                log::debug!("[Agent] Foreground did not answer the identity request");
                None
            }
        }
    }
}
