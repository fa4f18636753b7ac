//! Salted credential digests.
//!
//! Credentials are never stored in the clear: each registration gets a fresh
//! 16-byte salt and the store keeps `SHA-256(salt || credential)`.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

const SALT_LEN: usize = 16;

/// Stored form of a credential.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCredential {
    /// Base64 salt.
    salt: String,
    /// Base64 SHA-256 digest of salt || credential.
    digest: String,
}

impl StoredCredential {
    /// Hash `credential` with a fresh random salt.
    pub fn new(credential: &str) -> Self {
        let mut salt = [0u8; SALT_LEN];
        rand::rng().fill_bytes(&mut salt);
        Self {
            salt: BASE64.encode(salt),
            digest: BASE64.encode(digest(&salt, credential)),
        }
    }

    /// Whether `credential` matches this digest.
    pub fn matches(&self, credential: &str) -> bool {
        let (Ok(salt), Ok(expected)) = (BASE64.decode(&self.salt), BASE64.decode(&self.digest)) else {
            return false;
        };
        bool::from(digest(&salt, credential).ct_eq(&expected))
    }
}

fn digest(salt: &[u8], credential: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(credential.as_bytes());
    hasher.finalize().to_vec()
}
