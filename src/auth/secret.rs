//! Keys derived from the server secret.
//!
//! File passwords must stay recoverable by their owner, so they are encrypted
//! at rest with AES-256-GCM instead of being hashed. The stored form is
//! `base64(nonce || ciphertext)`.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use sha2::{Digest, Sha256, Sha512};

use crate::{DropgateError, Result};

const NONCE_LEN: usize = 12;

/// Derive a 32-byte key for a purpose label.
fn derive_key(secret: &str, label: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(label.as_bytes());
    hasher.update([0u8]);
    hasher.update(secret.as_bytes());
    hasher.finalize().into()
}

/// Derive the 64 bytes of master key material used to sign cookies.
pub fn cookie_key_material(secret: &str) -> [u8; 64] {
    let mut hasher = Sha512::new();
    hasher.update(b"dropgate-cookie-v1");
    hasher.update([0u8]);
    hasher.update(secret.as_bytes());
    hasher.finalize().into()
}

/// Reversible encryption for owner-recoverable file passwords.
#[derive(Clone)]
pub struct SecretBox {
    key: [u8; 32],
}

impl std::fmt::Debug for SecretBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretBox").finish_non_exhaustive()
    }
}

impl SecretBox {
    /// Build a box from the server secret.
    pub fn from_secret(secret: &str) -> Self {
        Self {
            key: derive_key(secret, "dropgate-file-password-v1"),
        }
    }

    fn cipher(&self) -> Result<Aes256Gcm> {
        Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| DropgateError::Crypto(format!("failed to create cipher: {e}")))
    }

    /// Encrypt a plaintext into its stored form.
    pub fn seal(&self, plaintext: &str) -> Result<String> {
        let cipher = self.cipher()?;
        let nonce_bytes: [u8; NONCE_LEN] = rand::random();
        let nonce = Nonce::from(nonce_bytes);

        let ciphertext = cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| DropgateError::Crypto(format!("encryption failed: {e}")))?;

        let mut out = nonce_bytes.to_vec();
        out.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(out))
    }

    /// Decrypt a stored value back to the plaintext.
    pub fn open(&self, sealed: &str) -> Result<String> {
        let raw = STANDARD
            .decode(sealed)
            .map_err(|e| DropgateError::Crypto(format!("invalid encoding: {e}")))?;
        if raw.len() < NONCE_LEN {
            return Err(DropgateError::Crypto("ciphertext too short".to_string()));
        }

        let (nonce_bytes, ciphertext) = raw.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);
        let plaintext = self
            .cipher()?
            .decrypt(nonce, ciphertext)
            .map_err(|e| DropgateError::Crypto(format!("decryption failed: {e}")))?;

        String::from_utf8(plaintext)
            .map_err(|e| DropgateError::Crypto(format!("invalid plaintext: {e}")))
    }

    /// Check a submitted password against the stored form.
    ///
    /// Any decryption failure counts as a mismatch.
    pub fn matches(&self, sealed: &str, submitted: &str) -> bool {
        match self.open(sealed) {
            Ok(plain) => constant_time_eq(plain.as_bytes(), submitted.as_bytes()),
            Err(e) => {
                tracing::warn!(error = %e, "Stored file password could not be decrypted");
                false
            }
        }
    }
}

/// Compare two byte strings without short-circuiting on the first mismatch.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Hex-encoded SHA-256 of the given parts, separated by NUL bytes.
pub fn fingerprint(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "an-adequately-long-server-secret-value";

    #[test]
    fn test_seal_and_open() {
        let sb = SecretBox::from_secret(SECRET);
        let sealed = sb.seal("hunter2").unwrap();
        assert_ne!(sealed, "hunter2");
        assert_eq!(sb.open(&sealed).unwrap(), "hunter2");
    }

    #[test]
    fn test_seal_uses_fresh_nonce() {
        let sb = SecretBox::from_secret(SECRET);
        assert_ne!(sb.seal("same").unwrap(), sb.seal("same").unwrap());
    }

    #[test]
    fn test_open_with_other_secret_fails() {
        let sealed = SecretBox::from_secret(SECRET).seal("hunter2").unwrap();
        let other = SecretBox::from_secret("a-completely-different-server-secret");
        assert!(matches!(other.open(&sealed), Err(DropgateError::Crypto(_))));
        assert!(!other.matches(&sealed, "hunter2"));
    }

    #[test]
    fn test_open_garbage() {
        let sb = SecretBox::from_secret(SECRET);
        assert!(sb.open("not base64!").is_err());
        assert!(sb.open("AAAA").is_err());
    }

    #[test]
    fn test_matches() {
        let sb = SecretBox::from_secret(SECRET);
        let sealed = sb.seal("open sesame").unwrap();
        assert!(sb.matches(&sealed, "open sesame"));
        assert!(!sb.matches(&sealed, "open sesam"));
        assert!(!sb.matches(&sealed, ""));
    }

    #[test]
    fn test_debug_hides_key() {
        let rendered = format!("{:?}", SecretBox::from_secret(SECRET));
        assert_eq!(rendered, "SecretBox { .. }");
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let a = fingerprint(&["file1", "x"]);
        assert_eq!(a.len(), 64);
        assert_eq!(a, fingerprint(&["file1", "x"]));
        assert_ne!(a, fingerprint(&["file1x", ""]));
    }

    #[test]
    fn test_cookie_key_material_differs_per_secret() {
        assert_ne!(
            cookie_key_material(SECRET),
            cookie_key_material("another-secret-another-secret-!!")
        );
    }
}
