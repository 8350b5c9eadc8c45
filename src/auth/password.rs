//! Argon2id hashing for system users and download accounts.
//!
//! File passwords are never hashed here: owners must be able to read them
//! back, so they are sealed with [`crate::auth::SecretBox`] instead.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand_core::OsRng;
use thiserror::Error;

/// Minimum password length, in characters.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum password length, in characters.
pub const MAX_PASSWORD_LENGTH: usize = 128;

// Argon2id cost: 64 MiB, 3 passes, 4 lanes.
const MEMORY_KIB: u32 = 64 * 1024;
const ITERATIONS: u32 = 3;
const LANES: u32 = 4;

/// Password-related errors.
#[derive(Error, Debug)]
pub enum PasswordError {
    #[error("password must be at least {MIN_PASSWORD_LENGTH} characters")]
    TooShort,

    #[error("password must be at most {MAX_PASSWORD_LENGTH} characters")]
    TooLong,

    #[error("password hashing failed: {0}")]
    HashError(String),

    /// The stored value is not a PHC string.
    #[error("invalid password hash format")]
    InvalidHash,

    #[error("password verification failed")]
    VerificationFailed,
}

fn hasher() -> Result<Argon2<'static>, PasswordError> {
    let params = Params::new(MEMORY_KIB, ITERATIONS, LANES, None)
        .map_err(|e| PasswordError::HashError(e.to_string()))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Hash a password into a PHC string carrying its salt and cost.
///
/// ```
/// let hash = dropgate::hash_password("correct horse").unwrap();
/// assert!(hash.starts_with("$argon2id$"));
/// ```
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    validate_password(password)?;

    let salt = SaltString::generate(&mut OsRng);
    hasher()?
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError::HashError(e.to_string()))
}

/// Check a password against a stored PHC string.
///
/// The cost is read from the hash, so older hashes keep verifying after the
/// constants above change.
pub fn verify_password(password: &str, hash: &str) -> Result<(), PasswordError> {
    let parsed = PasswordHash::new(hash).map_err(|_| PasswordError::InvalidHash)?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| PasswordError::VerificationFailed)
}

/// Enforce the length bounds.
pub fn validate_password(password: &str) -> Result<(), PasswordError> {
    match password.chars().count() {
        n if n < MIN_PASSWORD_LENGTH => Err(PasswordError::TooShort),
        n if n > MAX_PASSWORD_LENGTH => Err(PasswordError::TooLong),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("recipient-pass").unwrap();
        assert!(hash.starts_with("$argon2id$v=19$"));
        assert!(hash.contains("m=65536,t=3,p=4"));

        assert!(verify_password("recipient-pass", &hash).is_ok());
        assert!(matches!(
            verify_password("recipient-PASS", &hash),
            Err(PasswordError::VerificationFailed)
        ));
    }

    #[test]
    fn test_salts_differ() {
        assert_ne!(
            hash_password("same-password").unwrap(),
            hash_password("same-password").unwrap()
        );
    }

    #[test]
    fn test_unusable_hash_never_verifies() {
        // Anonymized download accounts store a marker instead of a hash.
        assert!(matches!(
            verify_password("anything", "!disabled-1234"),
            Err(PasswordError::InvalidHash)
        ));
    }

    #[test]
    fn test_length_bounds() {
        assert!(matches!(validate_password("short"), Err(PasswordError::TooShort)));
        assert!(validate_password("12345678").is_ok());
        assert!(validate_password(&"a".repeat(128)).is_ok());
        assert!(matches!(
            validate_password(&"a".repeat(129)),
            Err(PasswordError::TooLong)
        ));
        assert!(matches!(hash_password("short"), Err(PasswordError::TooShort)));
    }

    #[test]
    fn test_length_counts_characters() {
        // Seven characters, fourteen bytes.
        assert!(matches!(validate_password("ääääääa"), Err(PasswordError::TooShort)));

        let hash = hash_password("pässwörd-ü123").unwrap();
        assert!(verify_password("pässwörd-ü123", &hash).is_ok());
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            PasswordError::TooShort.to_string(),
            "password must be at least 8 characters"
        );
        assert_eq!(
            PasswordError::TooLong.to_string(),
            "password must be at most 128 characters"
        );
    }
}
