//! VAPID key pair for Web Push (RFC 8292).
//!
//! One P-256 ECDSA key pair per process, loaded from configuration at startup
//! and shared read-only. The public half is handed to browsers as the
//! `applicationServerKey`; the private half only ever reaches the push
//! transport, which signs the per-request VAPID JWT with it.

// Rust guideline compliant 2026-02

use anyhow::{Context, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64URL, Engine};
use p256::ecdsa::{SigningKey, VerifyingKey};
use p256::elliptic_curve::rand_core::OsRng;

/// Length of an uncompressed SEC1 P-256 point (0x04 || x || y).
const PUBLIC_KEY_LEN: usize = 65;

/// Length of a raw P-256 private scalar.
const PRIVATE_KEY_LEN: usize = 32;

/// VAPID key pair used to sign outbound push messages.
///
/// The private key is the raw 32-byte P-256 scalar (base64url, no padding);
/// the public key is the uncompressed SEC1 point (65 bytes). This is the
/// format `web-push` (both the npm module and the Rust crate) reads, so keys
/// generated by either tool can be dropped into the environment unchanged.
///
/// We keep the raw scalar (not SEC1 or PKCS8 DER) because
/// `VapidSignatureBuilder::from_base64()` expects exactly this encoding.
pub struct VapidKeyPair {
    public_key_b64: String,
    private_key_b64: String,
}

impl std::fmt::Debug for VapidKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VapidKeyPair")
            .field("public_key_b64", &self.public_key_b64)
            .field("private_key_b64", &"<redacted>")
            .finish()
    }
}

impl VapidKeyPair {
    /// Generate a fresh VAPID key pair.
    pub fn generate() -> Self {
        let signing_key = SigningKey::random(&mut OsRng);
        Self::from_signing_key(&signing_key)
    }

    fn from_signing_key(signing_key: &SigningKey) -> Self {
        let public_bytes = signing_key.verifying_key().to_encoded_point(false);
        Self {
            public_key_b64: BASE64URL.encode(public_bytes.as_bytes()),
            private_key_b64: BASE64URL.encode(signing_key.to_bytes().as_slice()),
        }
    }

    /// Reconstruct from configured base64url strings.
    ///
    /// Trailing `=` padding is tolerated. Validates the public key format, the
    /// private scalar, and that the two halves belong together.
    pub fn from_base64url(public_key_b64: &str, private_key_b64: &str) -> Result<Self> {
        let public_key_b64 = public_key_b64.trim().trim_end_matches('=');
        let private_key_b64 = private_key_b64.trim().trim_end_matches('=');

        let pub_bytes = BASE64URL
            .decode(public_key_b64)
            .context("Invalid base64url for VAPID public key")?;
        anyhow::ensure!(
            pub_bytes.len() == PUBLIC_KEY_LEN && pub_bytes[0] == 0x04,
            "VAPID public key must be 65-byte uncompressed P-256 point"
        );
        let verifying_key = VerifyingKey::from_sec1_bytes(&pub_bytes)
            .context("VAPID public key is not a point on P-256")?;

        let priv_bytes = BASE64URL
            .decode(private_key_b64)
            .context("Invalid base64url for VAPID private key")?;
        anyhow::ensure!(
            priv_bytes.len() == PRIVATE_KEY_LEN,
            "VAPID private key must be 32-byte P-256 scalar, got {} bytes",
            priv_bytes.len()
        );
        let signing_key = SigningKey::from_bytes(priv_bytes.as_slice().into())
            .context("VAPID private key is not a valid P-256 scalar")?;

        anyhow::ensure!(
            signing_key.verifying_key() == &verifying_key,
            "VAPID public key does not match the private key"
        );

        Ok(Self {
            public_key_b64: public_key_b64.to_string(),
            private_key_b64: private_key_b64.to_string(),
        })
    }

    /// Base64url-encoded uncompressed public key, as served to browsers.
    pub fn public_key_base64url(&self) -> &str {
        &self.public_key_b64
    }

    /// Base64url-encoded raw private scalar.
    ///
    /// Crate-private: only the push transport signs with it.
    pub(crate) fn private_key_base64url(&self) -> &str {
        &self.private_key_b64
    }

    /// Both halves for the `generate-vapid-keys` command output.
    pub fn export_base64url(&self) -> (&str, &str) {
        (&self.public_key_b64, &self.private_key_b64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_vapid_keys() {
        let keys = VapidKeyPair::generate();

        let pub_bytes = BASE64URL
            .decode(keys.public_key_base64url())
            .expect("decode public key");
        assert_eq!(pub_bytes.len(), 65, "uncompressed P-256 public key is 65 bytes");
        assert_eq!(pub_bytes[0], 0x04, "uncompressed point starts with 0x04");

        let priv_bytes = BASE64URL
            .decode(keys.private_key_base64url())
            .expect("decode private key");
        assert_eq!(priv_bytes.len(), 32, "raw P-256 scalar is 32 bytes");
    }

    #[test]
    fn test_from_base64url_roundtrip() {
        let keys = VapidKeyPair::generate();
        let (public, private) = keys.export_base64url();
        let reconstructed =
            VapidKeyPair::from_base64url(public, private).expect("should reconstruct");

        assert_eq!(keys.public_key_base64url(), reconstructed.public_key_base64url());
        assert_eq!(keys.private_key_base64url(), reconstructed.private_key_base64url());
    }

    #[test]
    fn test_from_base64url_tolerates_padding() {
        let keys = VapidKeyPair::generate();
        let padded_public = format!("{}=", keys.public_key_base64url());
        let reconstructed =
            VapidKeyPair::from_base64url(&padded_public, keys.private_key_base64url())
                .expect("padding is stripped");
        assert_eq!(keys.public_key_base64url(), reconstructed.public_key_base64url());
    }

    #[test]
    fn test_from_base64url_rejects_invalid() {
        assert!(VapidKeyPair::from_base64url("not-valid-key", "also-bad").is_err());
        assert!(VapidKeyPair::from_base64url("", "").is_err());
    }

    #[test]
    fn test_from_base64url_rejects_mismatched_halves() {
        let a = VapidKeyPair::generate();
        let b = VapidKeyPair::generate();
        let err = VapidKeyPair::from_base64url(a.public_key_base64url(), b.private_key_base64url())
            .expect_err("halves from different pairs");
        assert!(err.to_string().contains("does not match"));
    }

    #[test]
    fn test_debug_redacts_private_key() {
        let keys = VapidKeyPair::generate();
        let debug = format!("{keys:?}");
        assert!(!debug.contains(keys.private_key_base64url()));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_vapid_key_works_with_web_push_from_base64() {
        use web_push::{SubscriptionInfo, VapidSignatureBuilder};

        let keys = VapidKeyPair::generate();
        let sub = SubscriptionInfo::new(
            "https://push.example.com/test",
            "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA",
            "AAAAAAAAAAAAAAAAAAAAAA",
        );
        let builder = VapidSignatureBuilder::from_base64(keys.private_key_base64url(), &sub);
        assert!(builder.is_ok(), "from_base64 should accept our raw key scalar");
    }
}
