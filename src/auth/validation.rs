//! Input validation for download-account sign-up and system usernames.

use thiserror::Error;

/// Maximum display name length (characters).
pub const MAX_NAME_LENGTH: usize = 100;

/// Maximum email length.
pub const MAX_EMAIL_LENGTH: usize = 254;

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Name is empty.
    #[error("name cannot be empty")]
    NameEmpty,

    /// Name is too long.
    #[error("name must be at most {MAX_NAME_LENGTH} characters")]
    NameTooLong,

    /// Name contains control characters.
    #[error("name contains invalid characters")]
    NameInvalidChars,

    /// Email is empty.
    #[error("email cannot be empty")]
    EmailEmpty,

    /// Email is too long.
    #[error("email must be at most {MAX_EMAIL_LENGTH} characters")]
    EmailTooLong,

    /// Email format is invalid.
    #[error("invalid email format")]
    EmailInvalidFormat,
}

/// Validate a display name.
///
/// Requirements:
/// - Not empty after trimming
/// - At most 100 characters
/// - No control characters
pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::NameEmpty);
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(ValidationError::NameTooLong);
    }
    if name.chars().any(|c| c.is_control()) {
        return Err(ValidationError::NameInvalidChars);
    }
    Ok(())
}

/// Validate an email address.
///
/// The check is deliberately loose: one `@`, a non-empty local part, and a
/// dotted domain without empty labels or whitespace.
///
/// # Examples
///
/// ```
/// use dropgate::auth::validation::validate_email;
///
/// assert!(validate_email("user@example.com").is_ok());
/// assert!(validate_email("invalid").is_err());
/// ```
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if email.is_empty() {
        return Err(ValidationError::EmailEmpty);
    }
    if email.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::EmailTooLong);
    }
    if email.chars().any(|c| c.is_whitespace()) {
        return Err(ValidationError::EmailInvalidFormat);
    }

    let Some((local, domain)) = email.split_once('@') else {
        return Err(ValidationError::EmailInvalidFormat);
    };
    if local.is_empty() || domain.contains('@') || !domain.contains('.') {
        return Err(ValidationError::EmailInvalidFormat);
    }
    if domain.split('.').any(|p| p.is_empty()) {
        return Err(ValidationError::EmailInvalidFormat);
    }

    Ok(())
}

/// Normalize an email for storage and lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
