//! Application-wide constants for campus-push.
//!
//! Centralizes magic numbers so they are discoverable in one place.
//!
//! # Categories
//!
//! - **Timeouts**: Network timeouts
//! - **Web Push**: Delivery parameters
//! - **Server**: Listening defaults and persisted file names
//! - **Agent**: Client-side worker and notification rendering

use std::time::Duration;

// ============================================================================
// Timeouts
// ============================================================================

/// HTTP client request timeout.
///
/// Applies to each push service delivery and to agent → server calls.
/// There is no dispatch-level timeout; a batch is bounded by this value
/// per attempt.
pub const HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// How long the background worker waits for the foreground to answer an
/// identity request before treating the identity as unknown.
pub const IDENTITY_REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// Identity requests that may wait for a foreground that is not serving.
pub const IDENTITY_REQUEST_QUEUE: usize = 4;

/// Lifetime of login tokens issued by `/login`.
pub const TOKEN_TTL: Duration = Duration::from_secs(60 * 60);

// ============================================================================
// Web Push
// ============================================================================

/// How long the push service should hold an undelivered message (seconds).
pub const PUSH_TTL_SECS: u32 = 86_400;

/// VAPID `sub` claim used when none is configured.
pub const DEFAULT_VAPID_SUBJECT: &str = "mailto:admin@example.com";

// ============================================================================
// Server
// ============================================================================

/// Default listening port.
pub const DEFAULT_PORT: u16 = 3500;

/// Default bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";

/// File holding persisted subscription records (file storage engine).
pub const SUBSCRIPTIONS_FILE: &str = "subscriptions.json";

/// File holding registered identities (file storage engine).
pub const IDENTITIES_FILE: &str = "identities.json";

// ============================================================================
// Agent
// ============================================================================

/// Script the agent registers as the background push worker.
pub const WORKER_SCRIPT_URL: &str = "/service-worker.js";

/// Icon and badge shown on rendered notifications.
pub const DEFAULT_NOTIFICATION_ICON: &str = "/logo.webp";

/// Deep link opened when a clicked notification carries no URL.
pub const DEFAULT_NOTIFICATION_URL: &str = "/";

/// Vibration pattern for rendered notifications (ms on/off/on).
pub const NOTIFICATION_VIBRATE_PATTERN: [u32; 3] = [200, 100, 200];

/// Number of characters of an identity or endpoint shown in logs.
pub const LOG_ID_PREFIX_LEN: usize = 8;
