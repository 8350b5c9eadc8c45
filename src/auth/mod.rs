//! Authentication module for Dropgate.
//!
//! This module provides password hashing, system user registration, input
//! validation and the keys derived from the server secret.

mod password;
mod registration;
mod secret;
pub mod validation;

pub use password::{hash_password, validate_password, verify_password, PasswordError};
pub use registration::{bootstrap_admin, register_with_role};
pub use secret::{constant_time_eq, cookie_key_material, fingerprint, SecretBox};
pub use validation::ValidationError;
